//! Expansion of `#[derive(ParamTarget)]`.

use crate::parse::{external_name, field_ident, named_fields, FieldAttrs};
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

/// Generates the `ParamTarget` implementation.
pub fn expand_param_target(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut arms = Vec::new();
    let mut names = Vec::new();

    for field in named_fields(input, "ParamTarget")? {
        let attrs = FieldAttrs::parse(field, "param", false)?;
        if attrs.skip {
            continue;
        }

        let ident = field_ident(field)?;
        let key = external_name(field, &attrs)?;

        arms.push(quote! {
            #key => ::hypatia_core::BindParam::bind_param(&mut self.#ident, params, key),
        });
        names.push(key);
    }

    Ok(quote! {
        impl #impl_generics ::hypatia_core::ParamTarget for #name #ty_generics #where_clause {
            fn bind_field(
                &mut self,
                field: &str,
                params: &::hypatia_core::WsParams,
                key: &str,
            ) -> ::core::result::Result<(), ::hypatia_core::BindError> {
                match field {
                    #(#arms)*
                    _ => ::core::result::Result::Err(
                        ::hypatia_core::BindError::NoSuchField(field.to_string()),
                    ),
                }
            }

            fn param_fields() -> &'static [&'static str] {
                &[#(#names),*]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_expand_param_target() {
        let input: DeriveInput = parse_quote! {
            struct Query {
                #[param(rename = "q")]
                text: String,
                limit: Option<u32>,
                #[param(skip)]
                internal: Vec<u8>,
            }
        };
        let output = expand_param_target(&input).unwrap().to_string();
        assert!(output.contains("\"q\""));
        assert!(output.contains("\"limit\""));
        assert!(!output.contains("\"internal\""));
    }

    #[test]
    fn test_expand_param_target_rejects_nested() {
        let input: DeriveInput = parse_quote! {
            struct Query {
                #[param(nested)]
                inner: Inner,
            }
        };
        assert!(expand_param_target(&input).is_err());
    }
}
