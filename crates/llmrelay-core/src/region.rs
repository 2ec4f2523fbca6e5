//! AWS region → Bedrock cross-region inference prefix.
//!
//! Cross-region inference profiles are addressed as `<prefix>.<model-id>`,
//! where the prefix is the geography of the caller's region.

/// Geographies with a Bedrock inference-profile prefix.
pub const REGION_PREFIXES: [&str; 7] = ["us", "eu", "ap", "ca", "sa", "me", "af"];

/// Prefix used when the region's geography is not recognized.
pub const DEFAULT_REGION_PREFIX: &str = "us";

/// Map a region such as `eu-west-1` to its routing prefix (`eu`).
///
/// The leading segment (text before the first `-`) is returned when it is one
/// of [`REGION_PREFIXES`]; anything else falls back to
/// [`DEFAULT_REGION_PREFIX`].
pub fn regional_prefix(region: &str) -> &'static str {
    let leading = region.split('-').next().unwrap_or_default();
    REGION_PREFIXES
        .iter()
        .find(|prefix| **prefix == leading)
        .copied()
        .unwrap_or(DEFAULT_REGION_PREFIX)
}
