//! `FromValue` maps column values back to Rust types.
//!
//! The reverse direction uses plain `From<T> for Value` impls in `types`.
//! `Option<T>` is the only shape that tolerates null and missing columns;
//! every other target reports a [`QueryError::Conversion`].

use super::types::{AttrType, Value};
use crate::error::QueryError;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Conversion from a column value into a Rust type
pub trait FromValue: Sized {
    /// Attribute type this target accepts, or `None` when it takes anything
    const ATTR_TYPE: Option<AttrType> = None;

    /// Convert a present column value (which may be null)
    fn from_value(value: Value) -> Result<Self, QueryError>;

    /// Value used when the column is missing from the row entirely
    ///
    /// Projection targets hit this for fields no label matched.
    fn from_absent() -> Result<Self, QueryError> {
        Self::from_value(Value::Null)
    }
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T, QueryError> {
    Err(QueryError::Conversion(format!(
        "cannot convert {} value `{}` to {}",
        value.type_name(),
        value,
        expected
    )))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, QueryError> {
        Ok(value)
    }
}

impl FromValue for String {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::String);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::String(s) => Ok(s),
            other => mismatch("String", &other),
        }
    }
}

impl FromValue for i64 {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::Integer);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Int(i) => Ok(i),
            other => mismatch("i64", &other),
        }
    }
}

impl FromValue for i32 {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::Integer);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Int(i) => i32::try_from(i)
                .map_err(|_| QueryError::Conversion(format!("integer {i} out of range for i32"))),
            other => mismatch("i32", &other),
        }
    }
}

impl FromValue for u64 {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::Integer);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Int(i) => u64::try_from(i)
                .map_err(|_| QueryError::Conversion(format!("integer {i} out of range for u64"))),
            other => mismatch("u64", &other),
        }
    }
}

impl FromValue for bool {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::Boolean);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for f64 {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::Decimal);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value.as_f64() {
            Some(f) => Ok(f),
            None => mismatch("f64", &value),
        }
    }
}

impl FromValue for Decimal {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::Decimal);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(i) => Ok(Decimal::from(i)),
            Value::Double(f) => Decimal::from_f64_retain(f).ok_or_else(|| {
                QueryError::Conversion(format!("double {f} is not a finite decimal"))
            }),
            other => mismatch("Decimal", &other),
        }
    }
}

impl FromValue for NaiveDateTime {
    const ATTR_TYPE: Option<AttrType> = Some(AttrType::Temporal);

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Temporal(t) => Ok(t),
            other => mismatch("NaiveDateTime", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const ATTR_TYPE: Option<AttrType> = T::ATTR_TYPE;

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_absent() -> Result<Self, QueryError> {
        Ok(None)
    }
}
