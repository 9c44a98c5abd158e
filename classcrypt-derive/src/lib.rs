//! Derive macros for `classcrypt`.
//!
//! `#[derive(Classified)]` turns per-field `#[classified(Level)]` attributes
//! into a `classcrypt::record::ClassifiedRecord` implementation, so the set of
//! encrypted fields is fixed at compile time instead of discovered at runtime.

#![warn(clippy::pedantic, clippy::nursery)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident};

/// Derive macro for classified records.
///
/// Supported field types are `String` and `Option<String>`. Fields without
/// the attribute are left untouched.
///
/// # Example
///
/// ```rust,ignore
/// use classcrypt_derive::Classified;
///
/// #[derive(Classified)]
/// struct SensitiveData {
///     id: u64,
///     #[classified(Critical)]
///     highly_confidential: String,
///     #[classified(Baseline)]
///     baseline_data: Option<String>,
/// }
/// ```
#[proc_macro_derive(Classified, attributes(classified))]
pub fn derive_classified(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input).unwrap_or_else(syn::Error::into_compile_error).into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Classified can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Classified requires named fields",
        ));
    };

    let mut idents: Vec<&Ident> = Vec::new();
    let mut levels: Vec<Ident> = Vec::new();

    for field in &fields.named {
        let mut level = None;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("classified")) {
            if level.is_some() {
                return Err(syn::Error::new_spanned(attr, "duplicate #[classified] attribute"));
            }
            level = Some(attr.parse_args::<Ident>()?);
        }
        if let (Some(level), Some(ident)) = (level, field.ident.as_ref()) {
            idents.push(ident);
            levels.push(level);
        }
    }

    let names: Vec<String> = idents.iter().map(ToString::to_string).collect();
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::classcrypt::record::ClassifiedRecord
            for #name #ty_generics #where_clause
        {
            const FIELDS: &'static [::classcrypt::record::FieldSpec] = &[
                #(
                    ::classcrypt::record::FieldSpec {
                        name: #names,
                        classification: ::classcrypt::Classification::#levels,
                    },
                )*
            ];

            #[allow(unused_variables)]
            fn seal(
                &mut self,
                engine: &::classcrypt::Engine,
            ) -> ::core::result::Result<(), ::classcrypt::Error> {
                #(
                    ::classcrypt::record::FieldValue::seal_with(
                        &mut self.#idents,
                        engine,
                        ::classcrypt::Classification::#levels,
                    )?;
                )*
                ::core::result::Result::Ok(())
            }

            #[allow(unused_variables)]
            fn open(
                &mut self,
                engine: &::classcrypt::Engine,
                state: ::classcrypt::state::SecurityState,
            ) -> ::core::result::Result<(), ::classcrypt::Error> {
                #(
                    ::classcrypt::record::FieldValue::open_with(
                        &mut self.#idents,
                        engine,
                        ::classcrypt::Classification::#levels,
                        state,
                    )?;
                )*
                ::core::result::Result::Ok(())
            }
        }
    })
}
