//! Primary key predicates over flat rows and instances.

use crate::schema::{Side, Table};
use crate::value::{is_null_or_absent, Row};

/// Every primary key field is present and not null
pub fn is_primary_key_set(table: &Table, obj: &Row, side: Side) -> bool {
    table
        .primary_key()
        .all(|column| !is_null_or_absent(obj, column.field(side)))
}

/// Every not generated primary key field is present and not null
pub fn are_all_not_generated_primary_key_columns_set(table: &Table, obj: &Row, side: Side) -> bool {
    table
        .not_generated_primary_key()
        .all(|column| !is_null_or_absent(obj, column.field(side)))
}

/// Two objects represent the same entity.
///
/// Tables without a primary key never deduplicate. The key fields of `left`
/// must be present and every one must equal the field of `right`.
pub fn rows_represent_same_entity(table: &Table, left: &Row, right: &Row, side: Side) -> bool {
    if !table.has_primary_key() {
        return false;
    }

    table.primary_key().all(|column| {
        let field = column.field(side);
        match left.get(field) {
            Some(value) => right.get(field) == Some(value),
            None => false,
        }
    })
}

/// Keep only the primary key fields of an object
pub fn reduce_to_primary_key(table: &Table, obj: &Row, side: Side) -> Row {
    let mut reduced = Row::new();
    for column in table.primary_key() {
        let field = column.field(side);
        if let Some(value) = obj.get(field) {
            reduced.insert(field.to_string(), value.clone());
        }
    }
    reduced
}
