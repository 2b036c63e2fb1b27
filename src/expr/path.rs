//! Aliased entity paths.

use super::{ColumnRef, Expr};
use crate::error::QueryError;
use crate::metadata::{EntityDef, RelationshipDef};
use std::sync::Arc;

/// An entity under an alias, e.g. `Member m`
///
/// Paths are how queries name their sources and how attribute expressions are
/// minted. Two paths over the same entity with different aliases are distinct
/// sources, which is what self joins and correlated subqueries rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPath {
    entity: Arc<EntityDef>,
    alias: String,
}

impl EntityPath {
    pub(crate) fn new(entity: Arc<EntityDef>, alias: &str) -> Self {
        Self {
            entity,
            alias: alias.to_string(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn entity(&self) -> &Arc<EntityDef> {
        &self.entity
    }

    pub fn entity_name(&self) -> &str {
        self.entity.name()
    }

    /// Scalar attribute expression
    pub fn attr(&self, name: &str) -> Result<Expr, QueryError> {
        match self.entity.attribute(name) {
            Some(attr) => Ok(Expr::Column(ColumnRef {
                alias: self.alias.clone(),
                entity: self.entity.name().to_string(),
                attribute: attr.name.clone(),
                ty: attr.ty,
                nullable: attr.nullable,
            })),
            None if self.entity.relationship(name).is_some() => {
                Err(QueryError::InvalidJoin(format!(
                    "{}.{} is a relationship, join it to reach its attributes",
                    self.entity.name(),
                    name
                )))
            }
            None => Err(QueryError::unknown_attribute(self.entity.name(), name)),
        }
    }

    /// Primary key expression
    pub fn id(&self) -> Expr {
        let id = self.entity.id();
        let ty = self
            .entity
            .attribute(id)
            .map(|a| a.ty)
            .unwrap_or(crate::value::AttrType::Integer);
        Expr::Column(ColumnRef {
            alias: self.alias.clone(),
            entity: self.entity.name().to_string(),
            attribute: id.to_string(),
            ty,
            nullable: false,
        })
    }

    /// Every scalar attribute, in declaration order
    pub fn columns(&self) -> Vec<Expr> {
        self.entity
            .attributes()
            .iter()
            .map(|a| {
                Expr::Column(ColumnRef {
                    alias: self.alias.clone(),
                    entity: self.entity.name().to_string(),
                    attribute: a.name.clone(),
                    ty: a.ty,
                    nullable: a.nullable,
                })
            })
            .collect()
    }

    /// Relationship reference to pass to `Select::join`
    pub fn relation(&self, name: &str) -> Result<RelationRef, QueryError> {
        match self.entity.relationship(name) {
            Some(rel) => Ok(RelationRef {
                from_alias: self.alias.clone(),
                relationship: rel.clone(),
            }),
            None if self.entity.attribute(name).is_some() => Err(QueryError::InvalidJoin(format!(
                "{}.{} is not a relationship",
                self.entity.name(),
                name
            ))),
            None => Err(QueryError::unknown_attribute(self.entity.name(), name)),
        }
    }
}

/// A relationship navigated from an aliased source
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRef {
    pub(crate) from_alias: String,
    pub(crate) relationship: RelationshipDef,
}

impl RelationRef {
    pub fn from_alias(&self) -> &str {
        &self.from_alias
    }

    pub fn relationship(&self) -> &RelationshipDef {
        &self.relationship
    }
}
