//! Fixture schema shared by the unit tests.
//!
//! Four tables: `table1` (generated `id`), `table2` (caller supplied string
//! `id`) and two many-to-many link tables with composite keys. Every table
//! shifts `column1` by one character and `column2` by one when converting
//! between instance and row.

use serde_json::Value;

use crate::schema::{Column, Relationship, Schema, TableDefinition, TableHooks};
use crate::value::Row;

/// Shifts `property1` by one character and `property2` by one on the way to
/// the row, and back on the way to the instance.
pub struct ShiftHooks;

impl TableHooks for ShiftHooks {
    fn instance_to_row(&self, instance: &Row, row: &mut Row) {
        if let Some(value) = instance.get("property1") {
            row.insert("column1".into(), shift_char(value, 1));
        }
        if let Some(value) = instance.get("property2") {
            row.insert("column2".into(), shift_number(value, 1));
        }
    }

    fn row_to_instance(&self, row: &Row, instance: &mut Row) {
        if let Some(value) = row.get("column1") {
            instance.insert("property1".into(), shift_char(value, -1));
        }
        if let Some(value) = row.get("column2") {
            instance.insert("property2".into(), shift_number(value, -1));
        }
    }
}

fn shift_char(value: &Value, by: i32) -> Value {
    let Some(s) = value.as_str() else {
        return value.clone();
    };
    let mut chars = s.chars();
    match chars.next().and_then(|c| char::from_u32((c as i32 + by) as u32)) {
        // only the first character survives, as in the fixture's origin
        Some(c) => Value::String(c.to_string()),
        None => value.clone(),
    }
}

fn shift_number(value: &Value, by: i64) -> Value {
    match value.as_i64() {
        Some(n) => Value::from(n + by),
        None => value.clone(),
    }
}

fn shared_columns(definition: TableDefinition) -> TableDefinition {
    definition
        .column(Column::new("column1", "property1"))
        .column(Column::new("column2", "property2"))
        .column(Column::new("column3", "property3"))
}

/// Build the fixture schema with the shifting hooks
pub fn test_schema() -> Schema {
    build(true)
}

/// Build the fixture schema without any hooks
pub fn plain_test_schema() -> Schema {
    build(false)
}

fn build(with_hooks: bool) -> Schema {
    let hooks = |definition: TableDefinition| {
        if with_hooks {
            definition.hooks(ShiftHooks)
        } else {
            definition
        }
    };

    let table1 = hooks(
        shared_columns(
            TableDefinition::new("table1").column(Column::new("id", "id").primary_key().generated()),
        )
        .column(Column::new("many_to_one_object1_id", "manyToOneObject1Id"))
        .column(Column::new("many_to_one_object2_id", "manyToOneObject2Id"))
        .column(Column::new("one_to_one_object1_id", "oneToOneObject1Id"))
        .column(Column::new("one_to_one_object2_id", "oneToOneObject2Id"))
        .column(Column::new(
            "one_to_many_object1_many_to_one_id",
            "oneToManyObject1ManyToOneId",
        ))
        .relationship(Relationship::many_to_one(
            "manyToOneObject1",
            "many_to_one_object1_id",
            "table1",
            "id",
        ))
        .relationship(Relationship::many_to_one(
            "manyToOneObject2",
            "many_to_one_object2_id",
            "table2",
            "id",
        ))
        .relationship(
            Relationship::many_to_one("oneToOneObject1", "one_to_one_object1_id", "table1", "id")
                .with_other_relationship("oneToOneObject1"),
        )
        .relationship(
            Relationship::many_to_one("oneToOneObject2", "one_to_one_object2_id", "table2", "id")
                .with_other_relationship("oneToOneObject1"),
        )
        .relationship(Relationship::one_to_many(
            "oneToManyObject1",
            "id",
            "table1",
            "one_to_many_object1_many_to_one_id",
        ))
        .relationship(Relationship::one_to_many(
            "oneToManyObject2",
            "id",
            "table2",
            "one_to_many_object2_many_to_one_id",
        ))
        .relationship(Relationship::many_to_one(
            "oneToManyObject1ManyToOne",
            "one_to_many_object1_many_to_one_id",
            "table1",
            "id",
        ))
        .relationship(Relationship::one_to_many(
            "manyToManyObject1",
            "id",
            "many_to_many_table1",
            "table1_id1",
        ))
        .relationship(Relationship::one_to_many(
            "manyToManyObject2",
            "id",
            "many_to_many_table2",
            "table1_id",
        )),
    );

    let table2 = hooks(
        shared_columns(TableDefinition::new("table2").column(Column::new("id", "id").primary_key()))
            .column(Column::new("one_to_one_object1_id", "oneToOneObject1Id"))
            .column(Column::new(
                "one_to_many_object2_many_to_one_id",
                "oneToManyObject2ManyToOneId",
            ))
            .relationship(
                Relationship::many_to_one("oneToOneObject1", "one_to_one_object1_id", "table1", "id")
                    .with_other_relationship("oneToOneObject2"),
            )
            .relationship(Relationship::many_to_one(
                "oneToManyObject2ManyToOne",
                "one_to_many_object2_many_to_one_id",
                "table1",
                "id",
            ))
            .relationship(Relationship::one_to_many(
                "manyToManyObject2",
                "id",
                "many_to_many_table2",
                "table2_id",
            )),
    );

    let many_to_many_table1 = hooks(
        shared_columns(
            TableDefinition::new("many_to_many_table1")
                .column(Column::new("table1_id1", "object1Id1").primary_key())
                .column(Column::new("table1_id2", "object1Id2").primary_key()),
        )
        .relationship(Relationship::many_to_one("object11", "table1_id1", "table1", "id"))
        .relationship(Relationship::many_to_one("object12", "table1_id2", "table1", "id")),
    );

    let many_to_many_table2 = hooks(
        shared_columns(
            TableDefinition::new("many_to_many_table2")
                .column(Column::new("table1_id", "object1Id").primary_key())
                .column(Column::new("table2_id", "object2Id").primary_key()),
        )
        .relationship(Relationship::many_to_one("object1", "table1_id", "table1", "id"))
        .relationship(Relationship::many_to_one("object2", "table2_id", "table2", "id")),
    );

    match Schema::builder()
        .table(table1)
        .table(table2)
        .table(many_to_many_table1)
        .table(many_to_many_table2)
        .build()
    {
        Ok(schema) => schema,
        Err(e) => panic!("fixture schema must be valid: {e}"),
    }
}

/// Shorthand for building a row from a `json!` object literal
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
