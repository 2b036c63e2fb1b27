//! Result rows
//!
//! A `Row` is an ordered set of labelled values. Rows produced for entity
//! projections label root attributes by attribute name and fetch-joined
//! attributes as `relationship.attribute`.

use super::convert::FromValue;
use super::types::Value;
use crate::error::QueryError;
use std::sync::Arc;

/// One result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row labelling `values` by position
    ///
    /// Columns without a value read as null; values past the last column
    /// are dropped.
    pub fn new(columns: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    /// Convenience constructor from label/value pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self::new(columns.into(), values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a position
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value under a label
    pub fn get_named(&self, label: &str) -> Option<&Value> {
        self.position(label).and_then(|i| self.values.get(i))
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    /// Typed access by label; a missing label goes through `FromValue::from_absent`
    pub fn try_get<T: FromValue>(&self, label: &str) -> Result<T, QueryError> {
        match self.get_named(label) {
            Some(v) => T::from_value(v.clone()),
            None => T::from_absent(),
        }
    }

    /// Typed access by position
    pub fn try_get_at<T: FromValue>(&self, index: usize) -> Result<T, QueryError> {
        match self.get(index) {
            Some(v) => T::from_value(v.clone()),
            None => T::from_absent(),
        }
    }

    /// Whether a fetch join populated the given relationship's columns
    pub fn is_loaded(&self, relationship: &str) -> bool {
        let prefix = format!("{relationship}.");
        self.columns.iter().any(|c| c.starts_with(&prefix))
    }

    /// Sub-row holding the columns of a fetched relationship, prefix stripped
    pub fn related(&self, relationship: &str) -> Option<Row> {
        let prefix = format!("{relationship}.");
        let pairs: Vec<(String, Value)> = self
            .columns
            .iter()
            .zip(&self.values)
            .filter_map(|(c, v)| c.strip_prefix(&prefix).map(|c| (c.to_string(), v.clone())))
            .collect();
        if pairs.is_empty() {
            return None;
        }
        Some(Row::from_pairs(pairs))
    }

    /// JSON object keyed by label, for diagnostics and logging
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| {
                let json = match v {
                    Value::Null => serde_json::Value::Null,
                    Value::Bool(b) => serde_json::Value::Bool(*b),
                    Value::Int(i) => serde_json::Value::from(*i),
                    Value::Double(d) => serde_json::Value::from(*d),
                    Value::Decimal(d) => serde_json::Value::String(d.to_string()),
                    Value::String(s) => serde_json::Value::String(s.clone()),
                    Value::Temporal(_) => serde_json::Value::String(v.to_string()),
                };
                (c.clone(), json)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}
