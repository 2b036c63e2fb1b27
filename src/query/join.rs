//! Join clauses.

use crate::metadata::{EntityDef, RelationshipDef};
use crate::predicate::Condition;
use std::sync::Arc;

/// A query source: an entity under an alias
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub(crate) entity: Arc<EntityDef>,
    pub(crate) alias: String,
}

impl Source {
    pub fn entity(&self) -> &Arc<EntityDef> {
        &self.entity
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

/// How a joined source is linked to the rest of the query
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOn {
    /// Follows a declared relationship; `extra` is an optional `on` refinement
    Relation {
        from_alias: String,
        relationship: RelationshipDef,
        extra: Condition,
    },
    /// Ad hoc join between unrelated entities
    Adhoc(Condition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) target: Source,
    pub(crate) on: JoinOn,
    pub(crate) fetch: bool,
}

impl Join {
    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn target(&self) -> &Source {
        &self.target
    }

    pub fn on(&self) -> &JoinOn {
        &self.on
    }

    /// Fetch joins load the target's attributes into entity rows
    pub fn is_fetch(&self) -> bool {
        self.fetch
    }

    /// Relationship name for relationship joins
    pub fn relationship_name(&self) -> Option<&str> {
        match &self.on {
            JoinOn::Relation { relationship, .. } => Some(&relationship.name),
            JoinOn::Adhoc(_) => None,
        }
    }

    /// Additional condition beyond the relationship columns
    pub fn condition(&self) -> &Condition {
        match &self.on {
            JoinOn::Relation { extra, .. } => extra,
            JoinOn::Adhoc(cond) => cond,
        }
    }
}
