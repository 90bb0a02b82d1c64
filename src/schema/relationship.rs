//! Relationship metadata.
//!
//! A relationship joins `this_id` on the owning table to `other_id` on
//! `other_table`. The other table is referenced by name and resolved through
//! the [`Schema`](crate::schema::Schema) on demand, which allows tables to
//! reference each other (or themselves). One-to-one pairs are modeled as
//! many-to-one on both sides, linked through `other_relationship`.

/// Cardinality of a relationship as seen from its owning table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// The owning row points at zero or one row of the other table
    ManyToOne,
    /// Many rows of the other table point at the owning row
    OneToMany,
}

/// A named relationship of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Name of the relationship, also the property holding the related entities
    pub name: String,
    /// Cardinality
    pub kind: RelationshipKind,
    /// Join column on the owning table
    pub this_id: String,
    /// Name of the related table
    pub other_table: String,
    /// Join column on the related table
    pub other_id: String,
    /// Name of the inverse relationship on the related table, if paired
    pub other_relationship: Option<String>,
    /// Declaration position inside the owning table, used to derive join aliases
    pub(crate) index: usize,
}

impl Relationship {
    /// Declare a many-to-one relationship
    pub fn many_to_one(
        name: impl Into<String>,
        this_id: impl Into<String>,
        other_table: impl Into<String>,
        other_id: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipKind::ManyToOne, name, this_id, other_table, other_id)
    }

    /// Declare a one-to-many relationship
    pub fn one_to_many(
        name: impl Into<String>,
        this_id: impl Into<String>,
        other_table: impl Into<String>,
        other_id: impl Into<String>,
    ) -> Self {
        Self::new(RelationshipKind::OneToMany, name, this_id, other_table, other_id)
    }

    fn new(
        kind: RelationshipKind,
        name: impl Into<String>,
        this_id: impl Into<String>,
        other_table: impl Into<String>,
        other_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            this_id: this_id.into(),
            other_table: other_table.into(),
            other_id: other_id.into(),
            other_relationship: None,
            index: 0,
        }
    }

    /// Pair this relationship with its inverse on the other table
    pub fn with_other_relationship(mut self, name: impl Into<String>) -> Self {
        self.other_relationship = Some(name.into());
        self
    }

    pub fn is_many_to_one(&self) -> bool {
        self.kind == RelationshipKind::ManyToOne
    }

    pub fn is_one_to_many(&self) -> bool {
        self.kind == RelationshipKind::OneToMany
    }

    /// Position of the relationship in its table's declaration order
    pub fn index(&self) -> usize {
        self.index
    }
}
