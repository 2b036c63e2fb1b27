//! Row decoding trait.

use crate::error::QueryError;
use crate::value::{FromValue, Row};

/// Trait for types that can be created from a result row
///
/// Implemented for [`Row`] itself and for tuples of [`FromValue`] types,
/// which decode positionally; tuple projections use the latter:
///
/// ```
/// use quarry::query::FromRow;
/// use quarry::value::{Row, Value};
///
/// let row = Row::from_pairs([("username", Value::from("member1")), ("age", Value::Int(10))]);
/// let (name, age): (String, i32) = FromRow::from_row(&row).unwrap();
/// assert_eq!((name.as_str(), age), ("member1", 10));
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, QueryError>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, QueryError> {
        Ok(row.clone())
    }
}

macro_rules! tuple_from_row {
    ($len:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self, QueryError> {
                if row.len() != $len {
                    return Err(QueryError::Conversion(format!(
                        "expected {} columns, row has {}",
                        $len,
                        row.len()
                    )));
                }
                Ok(($(row.try_get_at::<$name>($idx)?,)+))
            }
        }
    };
}

tuple_from_row!(1 => A: 0);
tuple_from_row!(2 => A: 0, B: 1);
tuple_from_row!(3 => A: 0, B: 1, C: 2);
tuple_from_row!(4 => A: 0, B: 1, C: 2, D: 3);
tuple_from_row!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_from_row!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
