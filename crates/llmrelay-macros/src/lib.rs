#![deny(unsafe_code)]

//! Derive macros for credential-bearing types in llmrelay.
//!
//! - `#[derive(Redact)]`: `Debug` that prints `[REDACTED]` for marked fields
//! - `#[derive(SecureZeroize)]`: zeroize fields on `Drop`

extern crate proc_macro;

mod redact;
mod secure_zeroize;

use proc_macro::TokenStream;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, DeriveInput, Field, Token};

/// Derive macro for redacting sensitive fields in Debug output.
///
/// Fields annotated with `#[redact]` display as `[REDACTED]`. Fields of type
/// `Option<_>` keep their presence visible: `None` stays `None`, `Some(_)`
/// becomes `Some("[REDACTED]")`.
///
/// # Example
///
/// ```ignore
/// use llmrelay_macros::Redact;
///
/// #[derive(Redact)]
/// struct CloudCredentials {
///     pub access_key_id: String,
///     #[redact]
///     pub secret_access_key: String,
/// }
/// ```
#[proc_macro_derive(Redact, attributes(redact))]
pub fn derive_redact(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    redact::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive macro for clearing credential memory on drop.
///
/// Generates a `Drop` implementation that calls `zeroize()` on every field
/// not marked `#[no_zeroize]`. The consuming crate must depend on `zeroize`.
///
/// # Example
///
/// ```ignore
/// use llmrelay_macros::SecureZeroize;
///
/// #[derive(SecureZeroize)]
/// struct CloudCredentials {
///     #[no_zeroize]
///     pub region: String,
///     pub secret_access_key: String,
/// }
/// ```
#[proc_macro_derive(SecureZeroize, attributes(no_zeroize))]
pub fn derive_secure_zeroize(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    secure_zeroize::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Return the named fields of a struct, or a spanned error naming the derive.
pub(crate) fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> syn::Result<&'a Punctuated<Field, Token![,]>> {
    match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                &input.ident,
                format!("{derive} only supports structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

/// Whether a field carries the given marker attribute.
pub(crate) fn has_marker(field: &Field, marker: &str) -> bool {
    field.attrs.iter().any(|a| a.path().is_ident(marker))
}
