//! Entity metadata: entities, attributes, relationships and the catalog.

pub mod catalog;
pub mod entity;
pub mod relation;

pub use catalog::{AttributeDescriptor, Catalog, CatalogBuilder};
pub use entity::{AttributeDef, EntityBuilder, EntityDef};
pub use relation::{RelationType, RelationshipDef};

pub use crate::value::AttrType;
