//! Derive macro for `Projection`

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::attributes;

pub fn derive_projection(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(syn::DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Projection can only be derived for structs with named fields",
            ))
        }
    };

    let options = attributes::parse_struct_options(&input.attrs)?;

    let mut idents = Vec::new();
    let mut types = Vec::new();
    let mut labels = Vec::new();
    for field in fields {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "unnamed field"))?;
        idents.push(ident);
        types.push(field.ty.clone());
        labels.push(attributes::field_label(field)?);
    }

    let field_target = quote! {
        impl #impl_generics ::quarry::projection::FieldTarget for #struct_name #ty_generics #where_clause {
            const FIELDS: &'static [&'static str] = &[#(#labels),*];

            fn from_fields(
                source: &mut ::quarry::projection::FieldSource,
            ) -> ::std::result::Result<Self, ::quarry::QueryError> {
                ::std::result::Result::Ok(Self {
                    #(#idents: source.take::<#types>(#labels)?,)*
                })
            }
        }
    };

    let accessor_target = if options.accessors {
        let setters: Vec<syn::Ident> = idents.iter().map(|i| format_ident!("set_{}", i)).collect();
        let instantiate = if options.no_default {
            quote! { ::std::option::Option::None }
        } else {
            quote! { ::std::option::Option::Some(<Self as ::std::default::Default>::default()) }
        };
        quote! {
            impl #impl_generics ::quarry::projection::AccessorTarget for #struct_name #ty_generics #where_clause {
                fn instantiate() -> ::std::option::Option<Self> {
                    #instantiate
                }

                fn set_property(
                    &mut self,
                    name: &str,
                    value: ::quarry::Value,
                ) -> ::std::result::Result<bool, ::quarry::QueryError> {
                    match name {
                        #(#labels => {
                            self.#setters(<#types as ::quarry::value::FromValue>::from_value(value)?);
                            ::std::result::Result::Ok(true)
                        })*
                        _ => ::std::result::Result::Ok(false),
                    }
                }
            }
        }
    } else {
        TokenStream2::new()
    };

    let constructor_target = match &options.constructor {
        Some(constructor) => {
            let arity = idents.len();
            let target = struct_name.to_string();
            quote! {
                impl #impl_generics ::quarry::projection::ConstructorTarget for #struct_name #ty_generics #where_clause {
                    const PARAMETERS: &'static [::std::option::Option<::quarry::value::AttrType>] = &[
                        #(<#types as ::quarry::value::FromValue>::ATTR_TYPE),*
                    ];

                    fn construct(
                        values: ::std::vec::Vec<::quarry::Value>,
                    ) -> ::std::result::Result<Self, ::quarry::QueryError> {
                        if values.len() != #arity {
                            return ::std::result::Result::Err(::quarry::QueryError::Conversion(
                                ::std::format!("{} expects {} columns, row has {}", #target, #arity, values.len()),
                            ));
                        }
                        let mut values = values.into_iter();
                        ::std::result::Result::Ok(Self::#constructor(
                            #(<#types as ::quarry::value::FromValue>::from_value(
                                values.next().unwrap_or(::quarry::Value::Null),
                            )?),*
                        ))
                    }
                }
            }
        }
        None => TokenStream2::new(),
    };

    Ok(quote! {
        #field_target
        #accessor_target
        #constructor_target
    })
}
