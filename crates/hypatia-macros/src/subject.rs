//! Expansion of `#[derive(Subject)]`.

use crate::parse::{external_name, field_ident, named_fields, FieldAttrs};
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

/// Generates the `Subject` implementation.
pub fn expand_subject(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut kind_arms = Vec::new();
    let mut value_arms = Vec::new();

    for field in named_fields(input, "Subject")? {
        let attrs = FieldAttrs::parse(field, "subject", true)?;
        if attrs.skip {
            continue;
        }

        let ident = field_ident(field)?;
        let ty = &field.ty;
        let key = external_name(field, &attrs)?;

        if attrs.nested {
            kind_arms.push(quote! {
                #key => <#ty as ::hypatia_core::Subject>::field_kind(rest),
            });
            value_arms.push(quote! {
                #key => ::hypatia_core::Subject::field_value(&self.#ident, rest),
            });
        } else {
            kind_arms.push(quote! {
                #key if rest.is_empty() => {
                    ::core::option::Option::Some(<#ty as ::hypatia_core::SubjectField>::KIND)
                }
            });
            value_arms.push(quote! {
                #key if rest.is_empty() => ::hypatia_core::SubjectField::subject_value(&self.#ident),
            });
        }
    }

    Ok(quote! {
        impl #impl_generics ::hypatia_core::Subject for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn field_kind(
                path: &[::hypatia_core::Segment],
            ) -> ::core::option::Option<::hypatia_core::FieldKind> {
                match path.split_first() {
                    ::core::option::Option::Some((::hypatia_core::Segment::Field(head), rest)) => {
                        match head.as_str() {
                            #(#kind_arms)*
                            _ => ::core::option::Option::None,
                        }
                    }
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn field_value(
                &self,
                path: &[::hypatia_core::Segment],
            ) -> ::hypatia_core::FieldValue<'_> {
                match path.split_first() {
                    ::core::option::Option::Some((::hypatia_core::Segment::Field(head), rest)) => {
                        match head.as_str() {
                            #(#value_arms)*
                            _ => ::hypatia_core::FieldValue::Absent,
                        }
                    }
                    _ => ::hypatia_core::FieldValue::Absent,
                }
            }
        }
    })
}
