//! Field-direct binding

use crate::error::QueryError;
use crate::value::{FromValue, Row, Value};

/// Record whose fields are filled straight from row labels
///
/// Usually derived with `#[derive(Projection)]`. No setter logic runs:
/// each field takes the value whose label equals the field name.
pub trait FieldTarget: Sized {
    /// Field names in declaration order
    const FIELDS: &'static [&'static str];

    fn from_fields(source: &mut FieldSource) -> Result<Self, QueryError>;
}

/// One row being consumed field by field
///
/// A field with no matching label is recorded as unbound and receives
/// [`FromValue::from_absent`], which is `None` for `Option` fields.
#[derive(Debug)]
pub struct FieldSource {
    columns: Vec<String>,
    values: Vec<Option<Value>>,
    unbound: Vec<&'static str>,
}

impl FieldSource {
    pub fn new(row: Row) -> Self {
        let columns = row.columns().to_vec();
        let values = row.into_values().into_iter().map(Some).collect();
        Self {
            columns,
            values,
            unbound: Vec::new(),
        }
    }

    /// Move the value labelled `field` out of the row
    pub fn take<T: FromValue>(&mut self, field: &'static str) -> Result<T, QueryError> {
        let slot = self
            .columns
            .iter()
            .position(|c| c == field)
            .and_then(|i| self.values.get_mut(i))
            .and_then(Option::take);
        match slot {
            Some(value) => T::from_value(value).map_err(|e| match e {
                QueryError::Conversion(msg) => {
                    QueryError::Conversion(format!("field {field}: {msg}"))
                }
                other => other,
            }),
            None => {
                self.unbound.push(field);
                T::from_absent()
            }
        }
    }

    /// Fields that found no matching label
    pub fn unbound(&self) -> &[&'static str] {
        &self.unbound
    }

    /// Labels no field consumed
    pub fn unused(&self) -> Vec<&str> {
        self.columns
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| v.is_some())
            .map(|(c, _)| c.as_str())
            .collect()
    }
}
