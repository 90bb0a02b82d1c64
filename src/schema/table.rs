//! Table metadata and the flat instance/row converters.

use std::fmt;
use std::sync::Arc;

use crate::error::OrmError;
use crate::schema::column::{Column, Side};
use crate::schema::relationship::Relationship;
use crate::value::Row;

/// Custom per-table value transformation.
///
/// Both hooks run after the generic column copy and may override any field
/// of the target object. The defaults leave the target untouched.
///
/// # Example
///
/// ```
/// use joinery::schema::TableHooks;
/// use joinery::value::Row;
///
/// struct Upper;
///
/// impl TableHooks for Upper {
///     fn instance_to_row(&self, instance: &Row, row: &mut Row) {
///         if let Some(name) = instance.get("name").and_then(|v| v.as_str()) {
///             row.insert("name".into(), name.to_uppercase().into());
///         }
///     }
/// }
/// ```
pub trait TableHooks: Send + Sync {
    /// Adjust `row` after the columns of `instance` were copied into it
    fn instance_to_row(&self, instance: &Row, row: &mut Row) {
        let _ = (instance, row);
    }

    /// Adjust `instance` after the columns of `row` were copied into it
    fn row_to_instance(&self, row: &Row, instance: &mut Row) {
        let _ = (row, instance);
    }
}

/// Registration input for one table
#[derive(Clone)]
pub struct TableDefinition {
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) hooks: Option<Arc<dyn TableHooks>>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            relationships: Vec::new(),
            hooks: None,
        }
    }

    /// Add a column; declaration order is preserved
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a relationship; its declaration position becomes its join index
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Attach custom instance/row transform hooks
    pub fn hooks(mut self, hooks: impl TableHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }
}

impl fmt::Debug for TableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDefinition")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("relationships", &self.relationships)
            .field("hooks", &if self.hooks.is_some() { "Some" } else { "None" })
            .finish()
    }
}

/// A registered table.
///
/// Immutable once the schema is built; the primary key sets are derived
/// from the column flags at registration.
#[derive(Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    relationships: Vec<Relationship>,
    hooks: Option<Arc<dyn TableHooks>>,
    primary_key: Vec<usize>,
    not_generated_primary_key: Vec<usize>,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("relationships", &self.relationships)
            .field("hooks", &if self.hooks.is_some() { "Some" } else { "None" })
            .finish()
    }
}

impl Table {
    pub(crate) fn from_definition(definition: TableDefinition) -> Self {
        let TableDefinition {
            name,
            columns,
            mut relationships,
            hooks,
        } = definition;

        for (index, relationship) in relationships.iter_mut().enumerate() {
            relationship.index = index;
        }

        let primary_key = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let not_generated_primary_key = primary_key
            .iter()
            .copied()
            .filter(|i| !columns[*i].generated)
            .collect();

        Self {
            name,
            columns,
            relationships,
            hooks,
            primary_key,
            not_generated_primary_key,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Position of a column in declaration order, used for select labels
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_by_property(&self, property: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// Column named `key`, falling back to the column mapped to property `key`
    pub fn resolve_column(&self, key: &str) -> Option<&Column> {
        self.column(key).or_else(|| self.column_by_property(key))
    }

    /// Look up a column by its key on the given side
    pub fn column_by_field(&self, field: &str, side: Side) -> Option<&Column> {
        match side {
            Side::Instance => self.column_by_property(field),
            Side::Row => self.column(field),
        }
    }

    /// Relationships in declaration order
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Look up a relationship, failing with `UnknownRelationship`
    pub fn get_relationship(&self, name: &str) -> Result<&Relationship, OrmError> {
        self.relationship(name)
            .ok_or_else(|| OrmError::UnknownRelationship {
                table: self.name.clone(),
                relationship: name.to_string(),
            })
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.primary_key.iter().map(|i| &self.columns[*i])
    }

    pub fn not_generated_primary_key(&self) -> impl Iterator<Item = &Column> {
        self.not_generated_primary_key.iter().map(|i| &self.columns[*i])
    }

    pub fn generated_primary_key(&self) -> impl Iterator<Item = &Column> {
        self.primary_key().filter(|c| c.generated)
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn has_hooks(&self) -> bool {
        self.hooks.is_some()
    }

    /// Copy every defined property of `instance` to its column, then run the
    /// `instance_to_row` hook.
    ///
    /// Relationship-valued properties are not touched here; graph conversion
    /// in [`crate::convert`] handles them.
    pub fn instance_to_row(&self, instance: &Row) -> Row {
        let mut row = Row::new();
        for column in &self.columns {
            if let Some(value) = instance.get(&column.property) {
                row.insert(column.name.clone(), value.clone());
            }
        }
        if let Some(hooks) = &self.hooks {
            hooks.instance_to_row(instance, &mut row);
        }
        row
    }

    /// Copy every present column of `row` to its property, then run the
    /// `row_to_instance` hook.
    pub fn row_to_instance(&self, row: &Row) -> Row {
        let mut instance = Row::new();
        for column in &self.columns {
            if let Some(value) = row.get(&column.name) {
                instance.insert(column.property.clone(), value.clone());
            }
        }
        if let Some(hooks) = &self.hooks {
            hooks.row_to_instance(row, &mut instance);
        }
        instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::relationship::RelationshipKind;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    struct Doubling;

    impl TableHooks for Doubling {
        fn instance_to_row(&self, instance: &Row, row: &mut Row) {
            if let Some(n) = instance.get("amount").and_then(|v| v.as_i64()) {
                row.insert("amount".into(), json!(n * 2));
            }
        }
    }

    fn table() -> Table {
        Table::from_definition(
            TableDefinition::new("items")
                .column(Column::new("id", "id").primary_key().generated())
                .column(Column::new("code", "code").primary_key())
                .column(Column::new("amount", "amount"))
                .column(Column::new("owner_id", "ownerId"))
                .relationship(Relationship::many_to_one("owner", "owner_id", "owners", "id"))
                .relationship(Relationship::one_to_many("parts", "id", "parts", "item_id")),
        )
    }

    #[test]
    fn test_derived_primary_key_sets() {
        let table = table();
        let pk: Vec<_> = table.primary_key().map(|c| c.name.as_str()).collect();
        assert_eq!(pk, vec!["id", "code"]);
        let not_generated: Vec<_> = table.not_generated_primary_key().map(|c| c.name.as_str()).collect();
        assert_eq!(not_generated, vec!["code"]);
        let generated: Vec<_> = table.generated_primary_key().map(|c| c.name.as_str()).collect();
        assert_eq!(generated, vec!["id"]);
    }

    #[test]
    fn test_relationship_indices_follow_declaration_order() {
        let table = table();
        assert_eq!(table.relationship("owner").map(|r| r.index()), Some(0));
        assert_eq!(table.relationship("parts").map(|r| r.index()), Some(1));
        assert_eq!(
            table.relationship("parts").map(|r| r.kind),
            Some(RelationshipKind::OneToMany)
        );
        assert!(matches!(
            table.get_relationship("missing"),
            Err(OrmError::UnknownRelationship { .. })
        ));
    }

    #[test]
    fn test_instance_to_row_is_partial() {
        let table = table();
        let converted = table.instance_to_row(&row(json!({"ownerId": 3, "unrelated": true})));
        assert_eq!(converted, row(json!({"owner_id": 3})));

        let back = table.row_to_instance(&row(json!({"owner_id": 3, "code": null})));
        assert_eq!(back, row(json!({"code": null, "ownerId": 3})));
    }

    #[test]
    fn test_hooks_run_after_column_copy() {
        let table = Table::from_definition(
            TableDefinition::new("ledger")
                .column(Column::new("amount", "amount"))
                .hooks(Doubling),
        );
        let converted = table.instance_to_row(&row(json!({"amount": 21})));
        assert_eq!(converted.get("amount"), Some(&json!(42)));
        // row_to_instance keeps the default hook
        let back = table.row_to_instance(&converted);
        assert_eq!(back.get("amount"), Some(&json!(42)));
    }
}
