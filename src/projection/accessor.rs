//! Accessor-based binding

use crate::error::QueryError;
use crate::value::Value;

/// Record that is default-constructed and then populated property by property
///
/// `instantiate` returns `None` for types that have no default constructor;
/// binding such a type fails with [`QueryError::NoDefaultConstructor`].
/// `set_property` returns `false` for labels the type has no property for.
pub trait AccessorTarget: Sized {
    fn instantiate() -> Option<Self>;

    fn set_property(&mut self, name: &str, value: Value) -> Result<bool, QueryError>;
}
