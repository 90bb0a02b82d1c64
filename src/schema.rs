//! Schema model: tables, columns and relationships.
//!
//! A [`Schema`] is assembled once through [`SchemaBuilder`], checked for
//! integrity exactly once in [`SchemaBuilder::build`], and read-only from
//! then on. It is passed explicitly to every compiler and reconstructor call.
//!
//! # Example
//!
//! ```
//! use joinery::schema::{Column, Relationship, Schema, TableDefinition};
//!
//! let schema = Schema::builder()
//!     .table(
//!         TableDefinition::new("authors")
//!             .column(Column::new("id", "id").primary_key().generated())
//!             .column(Column::new("name", "name"))
//!             .relationship(
//!                 Relationship::one_to_many("posts", "id", "posts", "author_id")
//!                     .with_other_relationship("author"),
//!             ),
//!     )
//!     .table(
//!         TableDefinition::new("posts")
//!             .column(Column::new("id", "id").primary_key().generated())
//!             .column(Column::new("author_id", "authorId"))
//!             .relationship(
//!                 Relationship::many_to_one("author", "author_id", "authors", "id")
//!                     .with_other_relationship("posts"),
//!             ),
//!     )
//!     .build()?;
//!
//! assert_eq!(schema.get_table("posts")?.columns().len(), 2);
//! # Ok::<(), joinery::OrmError>(())
//! ```

mod column;
mod relationship;
mod table;

pub use column::{Column, Side};
pub use relationship::{Relationship, RelationshipKind};
pub use table::{Table, TableDefinition, TableHooks};

use std::collections::{BTreeMap, HashSet};

use crate::error::OrmError;

/// Collects table definitions before the integrity check
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: Vec<TableDefinition>,
}

impl SchemaBuilder {
    /// Register a table
    pub fn table(mut self, definition: TableDefinition) -> Self {
        self.tables.push(definition);
        self
    }

    /// Run the integrity check and freeze the schema.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::SchemaIntegrity` if a table is registered twice, a
    /// name is not a plain SQL identifier, a relationship references a table
    /// or column that does not exist, or a declared `other_relationship` does
    /// not exist or does not point back.
    pub fn build(self) -> Result<Schema, OrmError> {
        let mut tables = BTreeMap::new();
        for definition in self.tables {
            if tables.contains_key(&definition.name) {
                return Err(OrmError::SchemaIntegrity(format!(
                    "Table '{}' is registered more than once",
                    definition.name
                )));
            }
            let name = definition.name.clone();
            tables.insert(name, Table::from_definition(definition));
        }

        let schema = Schema { tables };
        schema.check()?;
        log::debug!("Schema built with {} tables", schema.tables.len());
        Ok(schema)
    }
}

/// Immutable, validated set of tables
#[derive(Debug, Clone)]
pub struct Schema {
    tables: BTreeMap<String, Table>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a table by name.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownTable` if the table is not registered.
    pub fn get_table(&self, name: &str) -> Result<&Table, OrmError> {
        self.tables
            .get(name)
            .ok_or_else(|| OrmError::UnknownTable(name.to_string()))
    }

    /// Look up a relationship of a table.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::UnknownTable` or `OrmError::UnknownRelationship`.
    pub fn get_relationship(&self, table: &str, name: &str) -> Result<&Relationship, OrmError> {
        self.get_table(table)?.get_relationship(name)
    }

    /// Resolve the table a relationship points to
    pub fn other_table(&self, relationship: &Relationship) -> Result<&Table, OrmError> {
        self.get_table(&relationship.other_table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    fn check(&self) -> Result<(), OrmError> {
        for table in self.tables.values() {
            check_identifier(table.name(), "table")?;

            let mut names = HashSet::new();
            for column in table.columns() {
                check_identifier(&column.name, "column")?;
                if !names.insert(column.name.as_str()) {
                    return Err(OrmError::SchemaIntegrity(format!(
                        "Column '{}' is declared more than once in table '{}'",
                        column.name,
                        table.name()
                    )));
                }
            }

            let mut properties = HashSet::new();
            for column in table.columns() {
                properties.insert(column.property.as_str());
            }

            let mut relationship_names = HashSet::new();
            for relationship in table.relationships() {
                if !relationship_names.insert(relationship.name.as_str()) {
                    return Err(OrmError::SchemaIntegrity(format!(
                        "Relationship '{}' is declared more than once in table '{}'",
                        relationship.name,
                        table.name()
                    )));
                }
                if relationship.name.starts_with('@')
                    || names.contains(relationship.name.as_str())
                    || properties.contains(relationship.name.as_str())
                {
                    return Err(OrmError::SchemaIntegrity(format!(
                        "Relationship name '{}' of table '{}' clashes with a column, property or directive",
                        relationship.name,
                        table.name()
                    )));
                }
                self.check_relationship(table, relationship)?;
            }
        }

        Ok(())
    }

    fn check_relationship(&self, table: &Table, relationship: &Relationship) -> Result<(), OrmError> {
        let location = format!("{}.{}", table.name(), relationship.name);

        if table.column(&relationship.this_id).is_none() {
            return Err(OrmError::SchemaIntegrity(format!(
                "Relationship '{location}' references column '{}' which does not exist",
                relationship.this_id
            )));
        }

        let other_table = self.tables.get(&relationship.other_table).ok_or_else(|| {
            OrmError::SchemaIntegrity(format!(
                "Relationship '{location}' references table '{}' which does not exist",
                relationship.other_table
            ))
        })?;

        if other_table.column(&relationship.other_id).is_none() {
            return Err(OrmError::SchemaIntegrity(format!(
                "Relationship '{location}' references column '{}.{}' which does not exist",
                other_table.name(),
                relationship.other_id
            )));
        }

        if let Some(other_name) = &relationship.other_relationship {
            let other = other_table.relationship(other_name).ok_or_else(|| {
                OrmError::SchemaIntegrity(format!(
                    "Relationship '{location}' names other relationship '{}.{other_name}' which does not exist",
                    other_table.name()
                ))
            })?;

            // One-to-one pairs are many-to-one on both sides, each with its own
            // join column, so only the table and the back-reference name are checked.
            let points_back = other.other_table == table.name()
                && other
                    .other_relationship
                    .as_deref()
                    .map_or(true, |name| name == relationship.name);
            if !points_back {
                return Err(OrmError::SchemaIntegrity(format!(
                    "Other relationship '{}.{other_name}' of '{location}' does not point back",
                    other_table.name()
                )));
            }
        }

        Ok(())
    }
}

// Names are written into SQL text unquoted.
fn check_identifier(name: &str, kind: &str) -> Result<(), OrmError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(OrmError::SchemaIntegrity(format!(
            "Invalid {kind} name '{name}': only letters, digits and underscores are allowed"
        )))
    }
}
