//! Relationship metadata
//!
//! A relationship links a source entity to a target entity. Many-to-one
//! relationships own a foreign key attribute on the source; one-to-many
//! relationships are the inverse, non-owning view and point at the owning
//! side through `mapped_by`.

/// Kind of relationship between two entities
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationType {
    /// Owning side: `foreign_key` is an attribute of the source entity
    ManyToOne { foreign_key: String },
    /// Inverse side: `mapped_by` names the many-to-one relationship on the target
    OneToMany { mapped_by: String },
}

/// Defines a relationship between two entities
///
/// `from_column` and `to_column` are filled in when the catalog is built,
/// since the target's primary key is not known while the source entity is
/// still being described.
///
/// # Example
///
/// ```
/// use quarry::metadata::{AttrType, Catalog, EntityDef};
///
/// let catalog = Catalog::builder()
///     .entity(EntityDef::builder("Team").attribute("name", AttrType::String).build())
///     .entity(
///         EntityDef::builder("Member")
///             .attribute("username", AttrType::String)
///             .nullable_attribute("team_id", AttrType::Integer)
///             .many_to_one("team", "Team", "team_id")
///             .build(),
///     )
///     .build()
///     .unwrap();
///
/// let rel = catalog.entity("Member").unwrap().relationship("team").unwrap();
/// assert_eq!(rel.join_columns(), ("team_id", "id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipDef {
    /// Relationship attribute name on the source entity
    pub name: String,
    /// Source entity name
    pub source: String,
    /// Target entity name
    pub target: String,
    /// Relationship kind
    pub rel_type: RelationType,
    pub(crate) from_column: String,
    pub(crate) to_column: String,
}

impl RelationshipDef {
    pub(crate) fn new(name: &str, source: &str, target: &str, rel_type: RelationType) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            rel_type,
            from_column: String::new(),
            to_column: String::new(),
        }
    }

    /// Whether this side owns the foreign key
    pub fn is_owner(&self) -> bool {
        matches!(self.rel_type, RelationType::ManyToOne { .. })
    }

    /// Join columns as `(source column, target column)`
    ///
    /// For `Member.team` this is `("team_id", "id")`; for the inverse
    /// `Team.members` it is `("id", "team_id")`.
    pub fn join_columns(&self) -> (&str, &str) {
        (&self.from_column, &self.to_column)
    }
}
