//! Procedural macros for Quarry
//!
//! This crate provides the `Projection` derive, which binds query rows into
//! plain structs at compile time.

mod attributes;
mod projection;

use proc_macro::TokenStream;

/// Derive macro for `Projection` - generates row binding for a DTO struct
///
/// Always generates `quarry::projection::FieldTarget`: each field takes the
/// value whose label equals the field name (or `rename`).
///
/// Struct attributes:
/// - `#[projection(accessors)]`: also generate `AccessorTarget`. The struct is
///   built with `Default::default()` and each label is routed to a
///   `set_<field>` method the struct must provide.
/// - `#[projection(accessors, no_default)]`: the generated `AccessorTarget`
///   reports that the type cannot be default-constructed.
/// - `#[projection(constructor = "new")]`: also generate `ConstructorTarget`,
///   passing columns positionally to `Self::new` in field order.
///
/// Field attributes:
/// - `#[projection(rename = "label")]`: bind from a differently named label.
///
/// # Example
///
/// ```ignore
/// use quarry::Projection;
///
/// #[derive(Projection)]
/// struct MemberDto {
///     username: String,
///     #[projection(rename = "age")]
///     years: Option<i32>,
/// }
/// ```
#[proc_macro_derive(Projection, attributes(projection))]
pub fn derive_projection(input: TokenStream) -> TokenStream {
    projection::derive_projection(input)
}
