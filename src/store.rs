//! Saving and deleting single rows.
//!
//! [`save`] asks [`is_persisted`] whether to insert or update. Statements
//! are built with sea-query for the configured dialect and run through the
//! injected [`QueryExecutor`].

use sea_query::{Asterisk, Cond, Condition, ConditionalStatement, Expr, ExprTrait, Query};

use crate::config::Dialect;
use crate::convert::{row_to_delete_criteria, row_to_update_criteria};
use crate::criteria::{CriteriaObject, Criterion};
use crate::error::OrmError;
use crate::executor::QueryExecutor;
use crate::keys::is_primary_key_set;
use crate::persist::is_persisted;
use crate::query::render::{build_statement, Ident};
use crate::schema::{Side, Table};
use crate::value::{to_sea_value, Row};

/// Insert or update a row and return it as stored.
///
/// On Postgres the inserted row is read back with `RETURNING *`. Other
/// dialects fill a single generated key column from the reported insert id.
/// An update that assigns nothing is skipped.
///
/// # Errors
///
/// Returns the errors of [`is_persisted`] and `OrmError::Executor` if a
/// statement fails.
pub fn save(table: &Table, executor: &dyn QueryExecutor, row: &Row, dialect: Dialect) -> Result<Row, OrmError> {
    if is_persisted(table, executor, row, Side::Row, dialect)? {
        update(table, executor, row, dialect)
    } else {
        insert(table, executor, row, dialect)
    }
}

fn insert(table: &Table, executor: &dyn QueryExecutor, row: &Row, dialect: Dialect) -> Result<Row, OrmError> {
    let mut columns = Vec::new();
    let mut values: Vec<Expr> = Vec::new();
    for column in table.columns() {
        let Some(value) = row.get(&column.name) else {
            continue;
        };
        if column.generated && value.is_null() {
            continue;
        }
        columns.push(Ident(column.name.clone()));
        values.push(to_sea_value(value).into());
    }

    let mut insert = Query::insert();
    insert.into_table(Ident(table.name().to_string()));
    if columns.is_empty() {
        insert.or_default_values();
    } else {
        insert.columns(columns);
        insert
            .values(values)
            .map_err(|e| OrmError::InvalidEntity(format!("Cannot insert into '{}': {e}", table.name())))?;
    }

    if dialect == Dialect::Postgres {
        insert.returning_col(Asterisk);
        let statement = build_statement(&insert, dialect);
        let mut returned = executor.query(&statement.sql, &statement.values)?;
        log::debug!("Inserted into '{}'", table.name());
        return Ok(if returned.is_empty() {
            row.clone()
        } else {
            returned.swap_remove(0)
        });
    }

    let statement = build_statement(&insert, dialect);
    let result = executor.execute(&statement.sql, &statement.values)?;
    log::debug!("Inserted {} row(s) into '{}'", result.affected_rows, table.name());

    let mut stored = row.clone();
    if let Some(id) = result.insert_id {
        let mut generated = table.generated_primary_key();
        if let (Some(column), None) = (generated.next(), generated.next()) {
            stored.insert(column.name.clone(), id);
        }
    }
    Ok(stored)
}

fn update(table: &Table, executor: &dyn QueryExecutor, row: &Row, dialect: Dialect) -> Result<Row, OrmError> {
    let update_criteria = row_to_update_criteria(table, row);
    if update_criteria.set.is_empty() {
        log::debug!("Nothing to update on '{}'", table.name());
        return Ok(row.clone());
    }

    let mut update = Query::update();
    update.table(Ident(table.name().to_string()));
    for (column, value) in &update_criteria.set {
        update.value(Ident(column.clone()), to_sea_value(value));
    }
    update.cond_where(key_condition(&update_criteria.criteria));

    let statement = build_statement(&update, dialect);
    let result = executor.execute(&statement.sql, &statement.values)?;
    if result.affected_rows == 0 {
        log::warn!("Update of '{}' matched no row", table.name());
    }
    Ok(row.clone())
}

/// Delete a row by its primary key and return the number of rows removed.
///
/// # Errors
///
/// Returns `OrmError::MissingPrimaryKey` if the table has no primary key or
/// a key column is null, and `OrmError::Executor` if the statement fails.
pub fn delete(table: &Table, executor: &dyn QueryExecutor, row: &Row, dialect: Dialect) -> Result<u64, OrmError> {
    if !table.has_primary_key() || !is_primary_key_set(table, row, Side::Row) {
        return Err(OrmError::MissingPrimaryKey {
            table: table.name().to_string(),
            columns: table.primary_key().map(|c| c.name.clone()).collect(),
        });
    }

    let criteria = row_to_delete_criteria(table, row);
    let mut delete = Query::delete();
    delete
        .from_table(Ident(table.name().to_string()))
        .cond_where(key_condition(&criteria));

    let statement = build_statement(&delete, dialect);
    let result = executor.execute(&statement.sql, &statement.values)?;
    log::debug!("Deleted {} row(s) from '{}'", result.affected_rows, table.name());
    Ok(result.affected_rows)
}

fn key_condition(criteria: &CriteriaObject) -> Condition {
    let mut condition = Cond::all();
    for (column, criterion) in &criteria.entries {
        if let Criterion::Value(value) = criterion {
            condition = condition.add(Expr::col(Ident(column.clone())).eq(to_sea_value(value)));
        }
    }
    condition
}
