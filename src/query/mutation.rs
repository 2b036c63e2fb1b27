//! Bulk UPDATE and DELETE specifications
//!
//! Bulk mutations act directly on stored records matching a predicate. They
//! bypass any caller-side object cache, so previously materialized rows are
//! stale afterwards and must be re-fetched.

use super::join::Source;
use super::validate;
use crate::error::QueryError;
use crate::expr::{EntityPath, Expr, Operand};
use crate::predicate::Condition;

/// `attribute = value` in an update
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub(crate) attribute: String,
    pub(crate) value: Expr,
}

impl Assignment {
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> &Expr {
        &self.value
    }
}

/// Validated bulk mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MutationSpec {
    Update {
        target: Source,
        assignments: Vec<Assignment>,
        predicate: Condition,
    },
    Delete {
        target: Source,
        predicate: Condition,
    },
}

impl MutationSpec {
    pub fn target(&self) -> &Source {
        match self {
            MutationSpec::Update { target, .. } | MutationSpec::Delete { target, .. } => target,
        }
    }

    pub fn predicate(&self) -> &Condition {
        match self {
            MutationSpec::Update { predicate, .. } | MutationSpec::Delete { predicate, .. } => {
                predicate
            }
        }
    }

    /// `"update"` or `"delete"`, used for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            MutationSpec::Update { .. } => "update",
            MutationSpec::Delete { .. } => "delete",
        }
    }
}

/// Bulk update builder
///
/// # Example
///
/// ```
/// use quarry::metadata::{AttrType, Catalog, EntityDef};
/// use quarry::query::Update;
///
/// let catalog = Catalog::builder()
///     .entity(
///         EntityDef::builder("Member")
///             .attribute("username", AttrType::String)
///             .attribute("age", AttrType::Integer)
///             .build(),
///     )
///     .build()
///     .unwrap();
/// let m = catalog.path("Member", "m").unwrap();
/// let age = m.attr("age").unwrap();
///
/// let update = Update::table(&m)
///     .set(&age, age.add(1))
///     .unwrap()
///     .build()
///     .unwrap();
/// assert_eq!(update.kind(), "update");
/// ```
#[derive(Debug, Clone)]
pub struct Update {
    target: Source,
    assignments: Vec<Assignment>,
    predicate: Condition,
}

impl Update {
    pub fn table(path: &EntityPath) -> Self {
        Self {
            target: Source {
                entity: path.entity().clone(),
                alias: path.alias().to_string(),
            },
            assignments: Vec::new(),
            predicate: Condition::absent(),
        }
    }

    /// Assign a new value to one attribute of the target
    ///
    /// The value may reference the record's current attributes, as in
    /// `age = age + 1`.
    pub fn set(mut self, attribute: &Expr, value: impl Operand) -> Result<Self, QueryError> {
        let column = match attribute.column() {
            Some(col) if col.alias == self.target.alias => col,
            _ => {
                return Err(QueryError::unknown_attribute(
                    self.target.entity.name(),
                    &attribute.label(),
                ))
            }
        };
        let value = value.into_expr();
        validate::check_expr(&value)?;
        validate::check_expr_scope(&value, &[self.target.alias.as_str()])?;
        if value.contains_aggregate() {
            return Err(QueryError::InvalidAggregationSpec(format!(
                "aggregate in assignment to {}",
                column.attribute
            )));
        }
        if let Some(found) = value.static_type() {
            if !column.ty.comparable_with(found) {
                return Err(QueryError::type_mismatch(column.ty.name(), found.name()));
            }
        } else if value == Expr::Literal(crate::value::Value::Null) && !column.nullable {
            return Err(QueryError::type_mismatch(
                format!("non-null {}", column.ty.name()),
                "null",
            ));
        }
        let attribute = column.attribute.clone();
        self.assignments.retain(|a| a.attribute != attribute);
        self.assignments.push(Assignment { attribute, value });
        Ok(self)
    }

    /// Restrict the update; repeated calls are combined with `and`
    pub fn filter(mut self, condition: Condition) -> Self {
        self.predicate = std::mem::take(&mut self.predicate).and(condition);
        self
    }

    pub fn build(self) -> Result<MutationSpec, QueryError> {
        if self.assignments.is_empty() {
            return Err(QueryError::EmptyUpdate(self.target.entity.name().to_string()));
        }
        check_mutation_predicate(&self.target, &self.predicate)?;
        Ok(MutationSpec::Update {
            target: self.target,
            assignments: self.assignments,
            predicate: self.predicate,
        })
    }
}

/// Bulk delete builder
#[derive(Debug, Clone)]
pub struct Delete {
    target: Source,
    predicate: Condition,
}

impl Delete {
    pub fn from(path: &EntityPath) -> Self {
        Self {
            target: Source {
                entity: path.entity().clone(),
                alias: path.alias().to_string(),
            },
            predicate: Condition::absent(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.predicate = std::mem::take(&mut self.predicate).and(condition);
        self
    }

    /// An absent predicate deletes every record of the entity
    pub fn build(self) -> Result<MutationSpec, QueryError> {
        check_mutation_predicate(&self.target, &self.predicate)?;
        Ok(MutationSpec::Delete {
            target: self.target,
            predicate: self.predicate,
        })
    }
}

/// Mutation filters may only read the target itself
fn check_mutation_predicate(target: &Source, predicate: &Condition) -> Result<(), QueryError> {
    if predicate.contains_aggregate() {
        return Err(QueryError::InvalidAggregationSpec(
            "aggregate functions are not allowed in mutation filters".to_string(),
        ));
    }
    validate::check_condition(predicate)?;
    validate::check_condition_scope(predicate, &[target.alias.as_str()])
}
