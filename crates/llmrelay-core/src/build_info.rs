//! Build metadata embedded by `build.rs`, shown by `llmrelay --version` and
//! logged once at CLI startup.

/// Short git commit hash, or `unknown` outside a checkout.
pub const GIT_HASH: &str = env!("LLMRELAY_GIT_HASH");

/// Build time as Unix epoch seconds.
pub const BUILD_TIMESTAMP: &str = env!("LLMRELAY_BUILD_TIMESTAMP");

/// Cargo profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("LLMRELAY_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `"0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}

/// Long form for `--version` output, including the build time.
pub fn long_version() -> String {
    format!("{}\nbuilt at: {BUILD_TIMESTAMP}", version_string())
}
