//! Implementation of `#[derive(Redact)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result, Type};

use crate::{has_marker, named_fields};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let fields = named_fields(&input, "Redact")?;

    let mut field_debug = Vec::with_capacity(fields.len());
    for f in fields {
        let Some(field_name) = f.ident.as_ref() else {
            continue;
        };
        let field_name_str = field_name.to_string();

        let tokens = if !has_marker(f, "redact") {
            quote! { .field(#field_name_str, &self.#field_name) }
        } else if is_option(&f.ty) {
            quote! {
                .field(
                    #field_name_str,
                    &self.#field_name.as_ref().map(|_| "[REDACTED]"),
                )
            }
        } else {
            quote! { .field(#field_name_str, &"[REDACTED]") }
        };
        field_debug.push(tokens);
    }

    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::std::fmt::Debug for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(#name_str)
                    #(#field_debug)*
                    .finish()
            }
        }
    })
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}
