//! Implementation of `#[derive(SecureZeroize)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::{has_marker, named_fields};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let fields = named_fields(&input, "SecureZeroize")?;

    let zeroize_calls = fields
        .iter()
        .filter(|f| !has_marker(f, "no_zeroize"))
        .filter_map(|f| f.ident.as_ref())
        .map(|field_name| {
            quote! {
                ::zeroize::Zeroize::zeroize(&mut self.#field_name);
            }
        });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::std::ops::Drop for #name #ty_generics #where_clause {
            fn drop(&mut self) {
                #(#zeroize_calls)*
            }
        }
    })
}
