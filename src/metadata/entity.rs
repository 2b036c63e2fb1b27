//! Entity and attribute definitions.

use super::relation::{RelationType, RelationshipDef};
use crate::value::AttrType;

/// A scalar attribute of an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeDef {
    pub name: String,
    pub ty: AttrType,
    pub nullable: bool,
}

/// Static description of a persisted record type
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) id: String,
    pub(crate) attributes: Vec<AttributeDef>,
    pub(crate) relationships: Vec<RelationshipDef>,
}

impl EntityDef {
    /// Start describing an entity
    ///
    /// The table defaults to the lower-cased entity name and the primary key
    /// to an integer attribute called `id`.
    pub fn builder(name: &str) -> EntityBuilder {
        EntityBuilder {
            def: EntityDef {
                name: name.to_string(),
                table: name.to_lowercase(),
                id: "id".to_string(),
                attributes: Vec::new(),
                relationships: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key attribute name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Scalar attributes in declaration order (primary key first)
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationships(&self) -> &[RelationshipDef] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// Builder returned by [`EntityDef::builder`]
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    def: EntityDef,
}

impl EntityBuilder {
    pub fn table(mut self, table: &str) -> Self {
        self.def.table = table.to_string();
        self
    }

    /// Name the primary key attribute (integer, not nullable)
    pub fn id(mut self, name: &str) -> Self {
        self.def.id = name.to_string();
        self
    }

    /// Add a non-nullable attribute
    pub fn attribute(self, name: &str, ty: AttrType) -> Self {
        self.push_attribute(name, ty, false)
    }

    /// Add a nullable attribute
    pub fn nullable_attribute(self, name: &str, ty: AttrType) -> Self {
        self.push_attribute(name, ty, true)
    }

    fn push_attribute(mut self, name: &str, ty: AttrType, nullable: bool) -> Self {
        self.def.attributes.retain(|a| a.name != name);
        self.def.attributes.push(AttributeDef {
            name: name.to_string(),
            ty,
            nullable,
        });
        self
    }

    /// Owning relationship backed by the `foreign_key` attribute
    pub fn many_to_one(mut self, name: &str, target: &str, foreign_key: &str) -> Self {
        let rel = RelationshipDef::new(
            name,
            &self.def.name,
            target,
            RelationType::ManyToOne {
                foreign_key: foreign_key.to_string(),
            },
        );
        self.def.relationships.push(rel);
        self
    }

    /// Inverse relationship; `mapped_by` is the many-to-one on `target`
    pub fn one_to_many(mut self, name: &str, target: &str, mapped_by: &str) -> Self {
        let rel = RelationshipDef::new(
            name,
            &self.def.name,
            target,
            RelationType::OneToMany {
                mapped_by: mapped_by.to_string(),
            },
        );
        self.def.relationships.push(rel);
        self
    }

    pub fn build(mut self) -> EntityDef {
        let id = self.def.id.clone();
        if self.def.attribute(&id).is_none() {
            self.def.attributes.insert(
                0,
                AttributeDef {
                    name: id,
                    ty: AttrType::Integer,
                    nullable: false,
                },
            );
        }
        self.def
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_adds_primary_key_first() {
        let def = EntityDef::builder("Member")
            .attribute("username", AttrType::String)
            .build();
        assert_eq!(def.table(), "member");
        assert_eq!(def.attributes()[0].name, "id");
        assert_eq!(def.attributes()[1].name, "username");
    }

    #[test]
    fn test_redeclared_attribute_replaces_previous() {
        let def = EntityDef::builder("Member")
            .attribute("age", AttrType::String)
            .nullable_attribute("age", AttrType::Integer)
            .build();
        let age = def.attribute("age").unwrap();
        assert_eq!(age.ty, AttrType::Integer);
        assert!(age.nullable);
        assert_eq!(def.attributes().len(), 2);
    }
}
