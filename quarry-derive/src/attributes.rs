//! Attribute parsing utilities

use syn::{Attribute, Field, LitStr};

/// Options from `#[projection(...)]` on the struct
#[derive(Default)]
pub struct StructOptions {
    pub accessors: bool,
    pub no_default: bool,
    pub constructor: Option<syn::Ident>,
}

pub fn parse_struct_options(attrs: &[Attribute]) -> syn::Result<StructOptions> {
    let mut options = StructOptions::default();
    for attr in attrs {
        if !attr.path().is_ident("projection") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("accessors") {
                options.accessors = true;
                Ok(())
            } else if meta.path.is_ident("no_default") {
                options.no_default = true;
                Ok(())
            } else if meta.path.is_ident("constructor") {
                let name: LitStr = meta.value()?.parse()?;
                options.constructor = Some(name.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `accessors`, `no_default` or `constructor = \"...\"`"))
            }
        })?;
    }
    if options.no_default && !options.accessors {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "`no_default` only applies together with `accessors`",
        ));
    }
    Ok(options)
}

/// Label a field binds from: `rename` if given, else the field name
pub fn field_label(field: &Field) -> syn::Result<String> {
    let mut label = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("projection") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                label = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `rename = \"...\"`"))
            }
        })?;
    }
    match label {
        Some(label) => Ok(label),
        None => field
            .ident
            .as_ref()
            .map(|i| i.to_string().trim_start_matches("r#").to_string())
            .ok_or_else(|| syn::Error::new_spanned(field, "unnamed field")),
    }
}
