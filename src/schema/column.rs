//! Column metadata.

/// Selects which naming a flat object uses.
///
/// Instances are keyed by property names, database rows by column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Keys are property names of the domain object
    Instance,
    /// Keys are column names of the database row
    Row,
}

/// A column of a table and the property it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name in the database
    pub name: String,
    /// Property name on the domain object
    pub property: String,
    /// Part of the primary key
    pub primary_key: bool,
    /// Value is assigned by the database (e.g. a serial primary key)
    pub generated: bool,
}

impl Column {
    /// Create a plain column mapped to the given property
    pub fn new(name: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property: property.into(),
            primary_key: false,
            generated: false,
        }
    }

    /// Mark the column as part of the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the column as generated by the database
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// The key this column uses on the given side
    pub fn field(&self, side: Side) -> &str {
        match side {
            Side::Instance => &self.property,
            Side::Row => &self.name,
        }
    }
}
