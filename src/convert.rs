//! Instance/row conversion for entity graphs and criteria.
//!
//! Flat conversion of one object lives on [`Table`]; this module walks
//! relationships. Graph conversion is node by node over the arena, so
//! cyclic graphs keep their shape and no entity is converted twice.

use serde_json::Value;

use crate::criteria::{Criteria, CriteriaObject, Criterion, Element};
use crate::error::OrmError;
use crate::graph::{EntityGraph, EntityId};
use crate::schema::{Schema, Side, Table};
use crate::value::Row;

/// Convert every instance of the graph into a row.
///
/// Entity ids are preserved, so relationship references stay valid.
///
/// # Errors
///
/// Returns `OrmError::UnknownTable` if an entity names an unregistered table.
pub fn instance_graph_to_rows(schema: &Schema, graph: &EntityGraph) -> Result<EntityGraph, OrmError> {
    convert_graph(schema, graph, Side::Row)
}

/// Convert every row of the graph into an instance; ids are preserved
pub fn row_graph_to_instances(schema: &Schema, graph: &EntityGraph) -> Result<EntityGraph, OrmError> {
    convert_graph(schema, graph, Side::Instance)
}

fn convert_graph(schema: &Schema, graph: &EntityGraph, target: Side) -> Result<EntityGraph, OrmError> {
    let mut converted = EntityGraph::new();
    for (_, entity) in graph.iter() {
        let table = schema.get_table(&entity.table)?;
        let mut copy = entity.clone();
        copy.fields = match target {
            Side::Row => table.instance_to_row(&entity.fields),
            Side::Instance => table.row_to_instance(&entity.fields),
        };
        converted.insert(copy);
    }
    Ok(converted)
}

/// Convert a nested instance given as JSON into a nested row
pub fn instance_to_row_json(schema: &Schema, table: &str, instance: &Value) -> Result<Value, OrmError> {
    convert_json(schema, table, instance, Side::Row)
}

/// Convert a nested row given as JSON into a nested instance
pub fn row_to_instance_json(schema: &Schema, table: &str, row: &Value) -> Result<Value, OrmError> {
    convert_json(schema, table, row, Side::Instance)
}

fn convert_json(schema: &Schema, table: &str, value: &Value, target: Side) -> Result<Value, OrmError> {
    let (graph, root) = EntityGraph::from_json(schema, table, value)?;
    let converted = convert_graph(schema, &graph, target)?;
    converted.to_json(root)
}

/// Convert the entities `ids` of a graph into instances and render them
pub fn rows_to_instances_json(
    schema: &Schema,
    graph: &EntityGraph,
    ids: &[EntityId],
) -> Result<Value, OrmError> {
    row_graph_to_instances(schema, graph)?.to_json_list(ids)
}

/// Translate property-keyed criteria into column-keyed criteria.
///
/// Comparison targets are translated, values are kept. Relationship
/// criteria are translated against the related table. Directives are
/// copied, with `@orderBy` fields mapped through the same property to
/// column translation. Unknown keys and unknown `@`-keys are dropped.
///
/// # Errors
///
/// Returns `OrmError::UnknownTable` if `table` or a related table is not registered.
pub fn instance_criteria_to_row_criteria(
    schema: &Schema,
    table: &str,
    criteria: &Criteria,
) -> Result<Criteria, OrmError> {
    let table = schema.get_table(table)?;
    convert_criteria(schema, table, criteria)
}

fn convert_criteria(schema: &Schema, table: &Table, criteria: &Criteria) -> Result<Criteria, OrmError> {
    match criteria {
        Criteria::Object(object) => Ok(Criteria::Object(convert_criteria_object(schema, table, object)?)),
        Criteria::Array(elements) => {
            let mut converted = Vec::with_capacity(elements.len());
            for element in elements {
                converted.push(match element {
                    Element::Item(criteria) => Element::Item(convert_criteria(schema, table, criteria)?),
                    Element::Connective(c) => Element::Connective(*c),
                });
            }
            Ok(Criteria::Array(converted))
        }
    }
}

fn convert_criteria_object(
    schema: &Schema,
    table: &Table,
    object: &CriteriaObject,
) -> Result<CriteriaObject, OrmError> {
    let mut converted = CriteriaObject {
        entries: Vec::with_capacity(object.entries.len()),
        not: object.not,
        load: object.load,
        load_separately: object.load_separately,
        count: object.count.clone(),
        min: object.min.clone(),
        max: object.max.clone(),
        order_by: object.order_by.as_ref().map(|order_by| {
            order_by.map_fields(|field| {
                table
                    .column_by_property(field)
                    .map_or_else(|| field.to_string(), |c| c.name.clone())
            })
        }),
        limit: object.limit,
        offset: object.offset,
        unknown_directives: Vec::new(),
    };

    for (key, criterion) in &object.entries {
        if let Some(column) = table.column_by_property(key) {
            converted.entries.push((column.name.clone(), criterion.clone()));
        } else if let Some(relationship) = table.relationship(key) {
            let criterion = match criterion {
                Criterion::Relationship(nested) => {
                    let other_table = schema.other_table(relationship)?;
                    Criterion::Relationship(convert_criteria(schema, other_table, nested)?)
                }
                other => other.clone(),
            };
            converted.entries.push((key.clone(), criterion));
        } else {
            log::debug!("Dropping unknown criteria key '{}' of table '{}'", key, table.name());
        }
    }

    Ok(converted)
}

/// Criteria locating a row plus the columns to assign
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCriteria {
    /// Primary key columns; an unset key is `null`
    pub criteria: CriteriaObject,
    /// Every other column present on the row
    pub set: Row,
}

/// Split a row into its primary key criteria and the `set` assignments
pub fn row_to_update_criteria(table: &Table, row: &Row) -> UpdateCriteria {
    let mut criteria = CriteriaObject::new();
    let mut set = Row::new();

    for column in table.columns() {
        if column.primary_key {
            let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
            criteria.insert(column.name.clone(), Criterion::Value(value));
        } else if let Some(value) = row.get(&column.name) {
            set.insert(column.name.clone(), value.clone());
        }
    }

    UpdateCriteria { criteria, set }
}

/// Convert an instance to a row and derive its update criteria
pub fn instance_to_update_criteria(table: &Table, instance: &Row) -> UpdateCriteria {
    row_to_update_criteria(table, &table.instance_to_row(instance))
}

/// Primary key criteria of a row; an unset key is `null`
pub fn row_to_delete_criteria(table: &Table, row: &Row) -> CriteriaObject {
    let mut criteria = CriteriaObject::new();
    for column in table.primary_key() {
        let value = row.get(&column.name).cloned().unwrap_or(Value::Null);
        criteria.insert(column.name.clone(), Criterion::Value(value));
    }
    criteria
}

/// Convert an instance to a row and derive its delete criteria
pub fn instance_to_delete_criteria(table: &Table, instance: &Row) -> CriteriaObject {
    row_to_delete_criteria(table, &table.instance_to_row(instance))
}
