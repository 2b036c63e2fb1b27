//! Entity catalog
//!
//! The catalog is the registry every query resolves names against. It is
//! assembled once through [`CatalogBuilder`], which cross-checks relationship
//! targets and foreign keys, and is immutable afterwards so it can be shared
//! freely across threads.

use super::entity::{AttributeDef, EntityDef};
use super::relation::{RelationType, RelationshipDef};
use crate::error::QueryError;
use crate::expr::EntityPath;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What an attribute path resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDescriptor {
    /// A scalar attribute, reported with the entity that owns it
    Scalar { entity: String, attribute: AttributeDef },
    /// A relationship attribute
    Relationship(RelationshipDef),
}

impl AttributeDescriptor {
    pub fn is_relationship(&self) -> bool {
        matches!(self, AttributeDescriptor::Relationship(_))
    }
}

/// Immutable registry of entity definitions
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: BTreeMap<String, Arc<EntityDef>>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Look up an entity by name
    pub fn entity(&self, name: &str) -> Result<&Arc<EntityDef>, QueryError> {
        self.entities
            .get(name)
            .ok_or_else(|| QueryError::UnknownEntity(name.to_string()))
    }

    /// All registered entities, ordered by name
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDef>> {
        self.entities.values()
    }

    /// Resolve an attribute path such as `"age"` or `"team.name"`
    ///
    /// Every segment but the last must be a relationship; the last may be a
    /// scalar attribute or a relationship.
    pub fn resolve(&self, entity: &str, path: &str) -> Result<AttributeDescriptor, QueryError> {
        let mut current = self.entity(entity)?;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let last = segments.peek().is_none();
            if let Some(rel) = current.relationship(segment) {
                if last {
                    return Ok(AttributeDescriptor::Relationship(rel.clone()));
                }
                current = self.entity(&rel.target)?;
                continue;
            }
            if let Some(attr) = current.attribute(segment) {
                if last {
                    return Ok(AttributeDescriptor::Scalar {
                        entity: current.name.clone(),
                        attribute: attr.clone(),
                    });
                }
                return Err(QueryError::InvalidJoin(format!(
                    "{}.{} is not a relationship",
                    current.name, segment
                )));
            }
            return Err(QueryError::unknown_attribute(&current.name, segment));
        }
        Err(QueryError::unknown_attribute(entity, path))
    }

    /// Relationships declared on an entity
    pub fn relationships_of(&self, entity: &str) -> Result<&[RelationshipDef], QueryError> {
        Ok(self.entity(entity)?.relationships())
    }

    /// Aliased path over an entity, the starting point of every query
    ///
    /// # Example
    ///
    /// ```
    /// use quarry::metadata::{AttrType, Catalog, EntityDef};
    ///
    /// let catalog = Catalog::builder()
    ///     .entity(EntityDef::builder("Member").attribute("age", AttrType::Integer).build())
    ///     .build()
    ///     .unwrap();
    /// let m = catalog.path("Member", "m").unwrap();
    /// assert_eq!(m.alias(), "m");
    /// assert!(m.attr("age").is_ok());
    /// assert!(m.attr("nickname").is_err());
    /// ```
    pub fn path(&self, entity: &str, alias: &str) -> Result<EntityPath, QueryError> {
        let def = self.entity(entity)?;
        Ok(EntityPath::new(def.clone(), alias))
    }

    pub fn into_shared(self) -> Arc<Catalog> {
        Arc::new(self)
    }
}

/// Collects entity definitions and validates them as a whole
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    entities: Vec<EntityDef>,
}

impl CatalogBuilder {
    /// Register an entity; a later definition with the same name replaces it
    pub fn entity(mut self, def: EntityDef) -> Self {
        if let Some(pos) = self.entities.iter().position(|e| e.name == def.name) {
            log::warn!("Entity {} registered twice, keeping the last definition", def.name);
            self.entities.remove(pos);
        }
        self.entities.push(def);
        self
    }

    /// Validate relationships and freeze the catalog
    pub fn build(self) -> Result<Catalog, QueryError> {
        let by_name: BTreeMap<&str, &EntityDef> =
            self.entities.iter().map(|e| (e.name.as_str(), e)).collect();

        let mut resolved: Vec<EntityDef> = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            let mut entity = entity.clone();
            for rel in &mut entity.relationships {
                let target = by_name
                    .get(rel.target.as_str())
                    .ok_or_else(|| QueryError::UnknownEntity(rel.target.clone()))?;
                let (from, to) = match &rel.rel_type {
                    RelationType::ManyToOne { foreign_key } => {
                        let fk = entity_attribute(&rel.source, &by_name, foreign_key)?;
                        (fk, target.id.clone())
                    }
                    RelationType::OneToMany { mapped_by } => {
                        let owner = target.relationship(mapped_by).ok_or_else(|| {
                            QueryError::unknown_attribute(&target.name, mapped_by)
                        })?;
                        let fk = match &owner.rel_type {
                            RelationType::ManyToOne { foreign_key }
                                if owner.target == rel.source =>
                            {
                                foreign_key.clone()
                            }
                            _ => {
                                return Err(QueryError::InvalidJoin(format!(
                                    "{}.{} is not a many-to-one back to {}",
                                    target.name, mapped_by, rel.source
                                )))
                            }
                        };
                        (id_of(&by_name, &rel.source), fk)
                    }
                };
                rel.from_column = from;
                rel.to_column = to;
            }
            resolved.push(entity);
        }

        let entities = resolved
            .into_iter()
            .map(|e| (e.name.clone(), Arc::new(e)))
            .collect();
        log::debug!("Catalog built");
        Ok(Catalog { entities })
    }
}

fn entity_attribute(
    entity: &str,
    by_name: &BTreeMap<&str, &EntityDef>,
    attribute: &str,
) -> Result<String, QueryError> {
    let def = by_name
        .get(entity)
        .ok_or_else(|| QueryError::UnknownEntity(entity.to_string()))?;
    def.attribute(attribute)
        .map(|a| a.name.clone())
        .ok_or_else(|| QueryError::unknown_attribute(entity, attribute))
}

fn id_of(by_name: &BTreeMap<&str, &EntityDef>, entity: &str) -> String {
    by_name
        .get(entity)
        .map(|e| e.id.clone())
        .unwrap_or_else(|| "id".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrType;

    fn catalog() -> Catalog {
        Catalog::builder()
            .entity(
                EntityDef::builder("Team")
                    .attribute("name", AttrType::String)
                    .one_to_many("members", "Member", "team")
                    .build(),
            )
            .entity(
                EntityDef::builder("Member")
                    .attribute("username", AttrType::String)
                    .attribute("age", AttrType::Integer)
                    .nullable_attribute("team_id", AttrType::Integer)
                    .many_to_one("team", "Team", "team_id")
                    .build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_scalar_and_dotted_paths() {
        let catalog = catalog();
        match catalog.resolve("Member", "age").unwrap() {
            AttributeDescriptor::Scalar { entity, attribute } => {
                assert_eq!(entity, "Member");
                assert_eq!(attribute.ty, AttrType::Integer);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
        match catalog.resolve("Member", "team.name").unwrap() {
            AttributeDescriptor::Scalar { entity, .. } => assert_eq!(entity, "Team"),
            other => panic!("unexpected descriptor: {other:?}"),
        }
        assert!(catalog.resolve("Member", "team").unwrap().is_relationship());
    }

    #[test]
    fn test_resolve_errors() {
        let catalog = catalog();
        assert!(matches!(
            catalog.resolve("Member", "nickname"),
            Err(QueryError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            catalog.resolve("Member", "age.value"),
            Err(QueryError::InvalidJoin(_))
        ));
        assert!(matches!(
            catalog.resolve("Ghost", "age"),
            Err(QueryError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_join_columns_resolved_for_both_sides() {
        let catalog = catalog();
        let team = catalog.entity("Member").unwrap().relationship("team").unwrap();
        assert_eq!(team.join_columns(), ("team_id", "id"));
        let members = catalog.entity("Team").unwrap().relationship("members").unwrap();
        assert_eq!(members.join_columns(), ("id", "team_id"));
        assert_eq!(catalog.relationships_of("Team").unwrap().len(), 1);
    }

    #[test]
    fn test_build_rejects_dangling_relationships() {
        let err = Catalog::builder()
            .entity(
                EntityDef::builder("Member")
                    .nullable_attribute("team_id", AttrType::Integer)
                    .many_to_one("team", "Team", "team_id")
                    .build(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownEntity(name) if name == "Team"));

        let err = Catalog::builder()
            .entity(EntityDef::builder("Team").build())
            .entity(
                EntityDef::builder("Member")
                    .many_to_one("team", "Team", "team_id")
                    .build(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownAttribute { .. }));
    }
}
