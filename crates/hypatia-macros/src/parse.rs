//! Parsing of derive input and field attributes.

use syn::{spanned::Spanned, Data, DeriveInput, Field, Fields, Ident, LitStr};

/// How a field takes part in validation or binding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FieldAttrs {
    /// The field is excluded.
    pub skip: bool,
    /// The field's type is itself a subject.
    pub nested: bool,
    /// The externally visible name, if different from the field name.
    pub rename: Option<String>,
}

impl FieldAttrs {
    /// Parses the attributes named `attr` on `field`.
    ///
    /// `nested` is only accepted when `allow_nested` is set.
    pub fn parse(field: &Field, attr: &str, allow_nested: bool) -> syn::Result<Self> {
        let mut attrs = Self::default();

        for a in field.attrs.iter().filter(|a| a.path().is_ident(attr)) {
            a.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    attrs.skip = true;
                    Ok(())
                } else if allow_nested && meta.path.is_ident("nested") {
                    attrs.nested = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let name: LitStr = meta.value()?.parse()?;
                    attrs.rename = Some(name.value());
                    Ok(())
                } else {
                    Err(meta.error(format!("unknown {attr} attribute")))
                }
            })?;
        }

        if attrs.skip && attrs.nested {
            return Err(syn::Error::new(
                field.span(),
                "a field cannot be both skipped and nested",
            ));
        }

        Ok(attrs)
    }
}

/// Returns the named fields of a struct, rejecting enums, unions and tuple structs.
pub fn named_fields<'a>(input: &'a DeriveInput, derive: &str) -> syn::Result<Vec<&'a Field>> {
    match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => Ok(named.named.iter().collect()),
            _ => Err(syn::Error::new(
                input.ident.span(),
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new(
            input.ident.span(),
            format!("{derive} can only be derived for structs"),
        )),
    }
}

/// Returns the identifier of a named field.
pub fn field_ident(field: &Field) -> syn::Result<&Ident> {
    field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new(field.span(), "expected a named field"))
}

/// Returns the externally visible name of a field.
pub fn external_name(field: &Field, attrs: &FieldAttrs) -> syn::Result<String> {
    match &attrs.rename {
        Some(name) => Ok(name.clone()),
        None => Ok(field_ident(field)?.to_string().trim_start_matches("r#").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn first_field(input: &DeriveInput) -> &Field {
        named_fields(input, "Subject").unwrap()[0]
    }

    #[test]
    fn test_parse_nested_and_rename() {
        let input: DeriveInput = parse_quote! {
            struct S {
                #[subject(nested, rename = "Artist")]
                artist: Artist,
            }
        };
        let attrs = FieldAttrs::parse(first_field(&input), "subject", true).unwrap();
        assert!(attrs.nested);
        assert_eq!(attrs.rename.as_deref(), Some("Artist"));
        assert_eq!(external_name(first_field(&input), &attrs).unwrap(), "Artist");
    }

    #[test]
    fn test_nested_rejected_for_params() {
        let input: DeriveInput = parse_quote! {
            struct S {
                #[param(nested)]
                artist: Artist,
            }
        };
        assert!(FieldAttrs::parse(first_field(&input), "param", false).is_err());
    }

    #[test]
    fn test_skip_and_nested_conflict() {
        let input: DeriveInput = parse_quote! {
            struct S {
                #[subject(skip, nested)]
                artist: Artist,
            }
        };
        assert!(FieldAttrs::parse(first_field(&input), "subject", true).is_err());
    }

    #[test]
    fn test_other_attributes_ignored() {
        let input: DeriveInput = parse_quote! {
            struct S {
                #[serde(default)]
                name: String,
            }
        };
        let attrs = FieldAttrs::parse(first_field(&input), "subject", true).unwrap();
        assert_eq!(attrs, FieldAttrs::default());
    }

    #[test]
    fn test_raw_identifier_name() {
        let input: DeriveInput = parse_quote! {
            struct S {
                r#type: String,
            }
        };
        let field = first_field(&input);
        let attrs = FieldAttrs::parse(field, "subject", true).unwrap();
        assert_eq!(external_name(field, &attrs).unwrap(), "type");
    }

    #[test]
    fn test_tuple_struct_rejected() {
        let input: DeriveInput = parse_quote! { struct S(u8); };
        assert!(named_fields(&input, "Subject").is_err());
    }
}
