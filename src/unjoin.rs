//! Reconstruction of entity graphs from flat joined rows.
//!
//! Rows come back labelled `<alias>_<columnIndex>` (see
//! [`crate::query::column_label`]). Every relationship that was loaded by
//! join is reconstructed from the same rows under its own alias, then
//! attached to its owners by id equality.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::criteria::{summarize, Criteria, Summary};
use crate::error::OrmError;
use crate::graph::{Entity, EntityGraph, EntityId, Related};
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
use crate::query::{column_label, relationship_alias};
use crate::schema::{Relationship, RelationshipKind, Schema, Table};
use crate::value::{id_key, Row};

/// Entities reconstructed from one row set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unjoined {
    pub graph: EntityGraph,
    /// Top-level entities in row order
    pub roots: Vec<EntityId>,
}

impl Unjoined {
    /// The root entities rendered as a JSON array
    pub fn to_json(&self) -> Result<Value, OrmError> {
        self.graph.to_json_list(&self.roots)
    }
}

/// A relationship that has to be resolved with a follow-up query
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    /// Table owning the relationship
    pub table_name: String,
    pub relationship_name: String,
    /// The first criteria given for the relationship
    pub relationship_criteria: Criteria,
    /// Entities that need the relationship attached
    pub rows: Vec<EntityId>,
}

/// Rebuild the entities of `table` and of every relationship loaded by join.
///
/// Rows whose columns for an alias are all null are LEFT JOIN misses and
/// produce no entity. Repeated primary keys produce one entity.
///
/// # Errors
///
/// Returns `OrmError::UnknownTable` if `table` or a related table is not
/// registered.
pub fn unjoin_rows(
    schema: &Schema,
    table: &str,
    rows: &[Row],
    criteria: &Criteria,
    alias: &str,
) -> Result<Unjoined, OrmError> {
    let table = schema.get_table(table)?;
    let summary = summarize(criteria);
    let mut graph = EntityGraph::new();
    let roots = unjoin_table(schema, table, rows, &summary, alias, &mut graph)?;

    log::debug!(
        "Unjoined {} rows into {} '{}' entities ({} entities total)",
        rows.len(),
        roots.len(),
        table.name(),
        graph.len()
    );
    #[cfg(feature = "metrics")]
    METRICS.record_rows_unjoined(rows.len());

    Ok(Unjoined { graph, roots })
}

fn unjoin_table(
    schema: &Schema,
    table: &Table,
    rows: &[Row],
    summary: &Summary,
    alias: &str,
    graph: &mut EntityGraph,
) -> Result<Vec<EntityId>, OrmError> {
    let mut loaded: Vec<(&Relationship, Vec<EntityId>)> = Vec::new();
    for relationship in table.relationships() {
        let Some(related) = summary.relationship(&relationship.name) else {
            continue;
        };
        if !related.summary.is_loaded_by_join() {
            continue;
        }
        let other_table = schema.other_table(relationship)?;
        let other_alias = relationship_alias(alias, relationship.index());
        let ids = unjoin_table(schema, other_table, rows, &related.summary, &other_alias, graph)?;
        loaded.push((relationship, ids));
    }

    let mut emitted: Vec<EntityId> = Vec::new();
    let mut seen: HashMap<String, EntityId> = HashMap::new();
    for row in rows {
        let fields = extract_fields(table, row, alias);
        if fields.values().all(Value::is_null) {
            continue;
        }
        let key = primary_key_of(table, &fields);
        if key.as_ref().is_some_and(|key| seen.contains_key(key)) {
            log::trace!("Skipping duplicate '{}' row under alias '{alias}'", table.name());
            continue;
        }
        let id = graph.insert(Entity::new(table.name(), fields));
        if let Some(key) = key {
            seen.insert(key, id);
        }
        emitted.push(id);
    }

    for (relationship, candidates) in &loaded {
        attach_related(graph, &emitted, relationship, candidates);
    }

    Ok(emitted)
}

/// Identity of a row within one reconstruction call. Tables without a
/// primary key, and rows missing a key column, never deduplicate.
fn primary_key_of(table: &Table, fields: &Row) -> Option<String> {
    if !table.has_primary_key() {
        return None;
    }
    let mut key = Vec::new();
    for column in table.primary_key() {
        key.push(fields.get(&column.name)?.clone());
    }
    Some(Value::Array(key).to_string())
}

/// Attach `candidates` to every owner whose `this_id` matches their
/// `other_id`. Many-to-one takes the first match, one-to-many takes all of
/// them in candidate order.
pub(crate) fn attach_related(
    graph: &mut EntityGraph,
    owners: &[EntityId],
    relationship: &Relationship,
    candidates: &[EntityId],
) {
    let mut by_other_id: HashMap<String, Vec<EntityId>> = HashMap::new();
    for candidate in candidates {
        let key = graph
            .get(*candidate)
            .and_then(|entity| entity.field(&relationship.other_id))
            .and_then(id_key);
        if let Some(key) = key {
            by_other_id.entry(key).or_default().push(*candidate);
        }
    }

    for owner in owners {
        let matching = graph
            .get(*owner)
            .and_then(|entity| entity.field(&relationship.this_id))
            .and_then(id_key)
            .and_then(|key| by_other_id.get(&key));
        let related = match relationship.kind {
            RelationshipKind::ManyToOne => Related::One(matching.and_then(|ids| ids.first().copied())),
            RelationshipKind::OneToMany => Related::Many(matching.cloned().unwrap_or_default()),
        };
        graph.set_related(*owner, &relationship.name, related);
    }
}

/// The columns of `table` found under `alias`, keyed by column name
fn extract_fields(table: &Table, row: &Row, alias: &str) -> Row {
    let mut fields = Row::new();
    for (index, column) in table.columns().iter().enumerate() {
        if let Some(value) = row.get(&column_label(alias, index)) {
            fields.insert(column.name.clone(), value.clone());
        }
    }
    fields
}

/// Collect every relationship flagged `@loadSeparately`, at any depth of
/// the joined relationships, keyed by its dotted path from the root (for
/// example `.manyToManyObject2.object2`).
///
/// Paths without any owning entity are omitted.
///
/// # Errors
///
/// Returns `OrmError::UnknownTable` if a table is not registered and
/// `OrmError::InvalidEntity` if `roots` refers to an entity not in `graph`.
pub fn determine_relationships_to_load(
    schema: &Schema,
    table: &str,
    graph: &EntityGraph,
    roots: &[EntityId],
    criteria: &Criteria,
) -> Result<BTreeMap<String, LoadRequest>, OrmError> {
    let table = schema.get_table(table)?;
    let summary = summarize(criteria);
    let mut requests = BTreeMap::new();
    collect_requests(schema, table, graph, roots, &summary, "", &mut requests)?;
    Ok(requests)
}

fn collect_requests(
    schema: &Schema,
    table: &Table,
    graph: &EntityGraph,
    ids: &[EntityId],
    summary: &Summary,
    path: &str,
    requests: &mut BTreeMap<String, LoadRequest>,
) -> Result<(), OrmError> {
    if ids.is_empty() {
        return Ok(());
    }
    for id in ids {
        entity(graph, *id)?;
    }

    for relationship in table.relationships() {
        let Some(related) = summary.relationship(&relationship.name) else {
            continue;
        };
        let relationship_path = format!("{path}.{}", relationship.name);

        if related.summary.is_loaded_separately() {
            let request = requests.entry(relationship_path).or_insert_with(|| LoadRequest {
                table_name: table.name().to_string(),
                relationship_name: relationship.name.clone(),
                relationship_criteria: related.criteria.clone(),
                rows: Vec::new(),
            });
            for id in ids {
                if !request.rows.contains(id) {
                    request.rows.push(*id);
                }
            }
        } else if related.summary.is_loaded_by_join() {
            let mut children: Vec<EntityId> = Vec::new();
            for id in ids {
                let Some(related_ids) = entity(graph, *id)?.related(&relationship.name) else {
                    continue;
                };
                for child in related_ids.ids() {
                    if !children.contains(&child) {
                        children.push(child);
                    }
                }
            }
            let other_table = schema.other_table(relationship)?;
            collect_requests(
                schema,
                other_table,
                graph,
                &children,
                &related.summary,
                &relationship_path,
                requests,
            )?;
        }
    }
    Ok(())
}

fn entity(graph: &EntityGraph, id: EntityId) -> Result<&Entity, OrmError> {
    graph
        .get(id)
        .ok_or_else(|| OrmError::InvalidEntity(format!("No entity {} in the reconstructed graph", id.index())))
}
