//! Insert-or-update decision for a single object.

use sea_query::{Asterisk, ConditionalStatement, Expr, ExprTrait, Query};

use crate::config::Dialect;
use crate::error::OrmError;
use crate::executor::QueryExecutor;
use crate::keys::are_all_not_generated_primary_key_columns_set;
use crate::query::render::{build_statement, Ident};
use crate::schema::{Side, Table};
use crate::value::{to_sea_value, Row};

/// Decide whether `obj` already exists in storage.
///
/// A non-null generated key is taken as proof of persistence. When the
/// table has caller supplied key columns and no unset generated key, the
/// object is looked up by those columns and counts as persisted when
/// exactly one row matches. A table without a primary key is never
/// persisted.
///
/// # Errors
///
/// - `OrmError::MissingPrimaryKey` if a not generated key column is unset
/// - `OrmError::InconsistentKeyState` if generated key columns are partly null
/// - `OrmError::Executor` if the lookup fails
pub fn is_persisted(
    table: &Table,
    executor: &dyn QueryExecutor,
    obj: &Row,
    side: Side,
    dialect: Dialect,
) -> Result<bool, OrmError> {
    let row = match side {
        Side::Instance => table.instance_to_row(obj),
        Side::Row => obj.clone(),
    };

    if !table.has_primary_key() {
        log::debug!("Table '{}' has no primary key, treating object as new", table.name());
        return Ok(false);
    }

    if !are_all_not_generated_primary_key_columns_set(table, &row, Side::Row) {
        return Err(OrmError::MissingPrimaryKey {
            table: table.name().to_string(),
            columns: table.not_generated_primary_key().map(|c| c.name.clone()).collect(),
        });
    }

    let mut generated_null = 0;
    let mut generated_set = 0;
    for column in table.generated_primary_key() {
        match row.get(&column.name) {
            Some(value) if !value.is_null() => generated_set += 1,
            _ => generated_null += 1,
        }
    }
    if generated_null > 0 && generated_set > 0 {
        return Err(OrmError::InconsistentKeyState {
            table: table.name().to_string(),
        });
    }

    let has_not_generated = table.not_generated_primary_key().next().is_some();
    if has_not_generated && generated_null == 0 {
        return probe(table, executor, &row, dialect);
    }
    Ok(generated_set > 0)
}

/// Point lookup by the not generated key columns
fn probe(table: &Table, executor: &dyn QueryExecutor, row: &Row, dialect: Dialect) -> Result<bool, OrmError> {
    let mut select = Query::select();
    select.column(Asterisk).from(Ident(table.name().to_string()));
    for column in table.not_generated_primary_key() {
        let value = row.get(&column.name).map(to_sea_value).unwrap_or(sea_query::Value::String(None));
        select.and_where(Expr::col(Ident(column.name.clone())).eq(value));
    }

    let statement = build_statement(&select, dialect);
    let rows = executor.query(&statement.sql, &statement.values)?;
    log::debug!(
        "Persistence probe on '{}' matched {} row(s)",
        table.name(),
        rows.len()
    );
    Ok(rows.len() == 1)
}
