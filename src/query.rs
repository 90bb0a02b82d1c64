//! Abstract SELECT produced from criteria, and its rendering to SQL text.
//!
//! [`compile`] walks a criteria tree and produces a [`CompiledQuery`]: the
//! root table under its base alias, one LEFT JOIN per relationship path that
//! has to be joined, the WHERE [`Condition`], ORDER BY, LIMIT and OFFSET,
//! and every column of every aliased table labelled `<alias>_<index>`.
//! [`render::DialectRenderer`] turns it into SQL text plus parameters.
//!
//! # Example
//!
//! ```
//! use joinery::criteria::Criteria;
//! use joinery::query::{compile, CompileOptions};
//! use joinery::query::render::{DialectRenderer, SqlRenderer};
//! use joinery::config::Dialect;
//! use joinery::schema::{Column, Schema, TableDefinition};
//! use serde_json::json;
//!
//! let schema = Schema::builder()
//!     .table(
//!         TableDefinition::new("posts")
//!             .column(Column::new("id", "id").primary_key().generated())
//!             .column(Column::new("title", "title")),
//!     )
//!     .build()?;
//!
//! let criteria = Criteria::try_from(json!({ "title": "x", "@limit": 10 }))?;
//! let query = compile(&schema, "posts", &criteria, &CompileOptions::default())?;
//! let rendered = DialectRenderer::new(Dialect::Postgres).render_select(&query);
//! assert_eq!(
//!     rendered.sql,
//!     r#"SELECT t.id "t_0", t.title "t_1" FROM posts t WHERE t.title = $1 LIMIT 10"#
//! );
//! # Ok::<(), joinery::OrmError>(())
//! ```

mod compiler;
pub mod render;

pub use compiler::{add_criteria, compile, CompileOptions, SUPPORTED_OPERATORS};

use serde_json::Value;

use crate::criteria::{Connective, Direction};
use crate::schema::Table;

/// Alias of the table reached through relationship `index` from `alias`
pub fn relationship_alias(alias: &str, index: usize) -> String {
    format!("{alias}__{index}")
}

/// Select label of column `index` of the table under `alias`
pub fn column_label(alias: &str, index: usize) -> String {
    format!("{alias}_{index}")
}

/// A column of one aliased table occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

/// `<alias>.<column> "<label>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    pub alias: String,
    pub column: String,
    pub label: String,
}

/// `LEFT JOIN <table> <alias> ON <left> = <right>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub alias: String,
    /// Join column on the owning alias
    pub left: ColumnRef,
    /// Join column on the joined alias
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExpr {
    pub column: ColumnRef,
    /// `None` leaves the database default
    pub direction: Option<Direction>,
}

/// WHERE expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `<column> <operator> ?`
    Compare {
        column: ColumnRef,
        operator: String,
        value: Value,
    },
    /// `<column> [NOT] IN (?, ...)`
    In {
        column: ColumnRef,
        values: Vec<Value>,
        negated: bool,
    },
    /// `<column> IS [NOT] NULL`
    IsNull { column: ColumnRef, negated: bool },
    /// `1 = 1` when true, `1 = 2` when false
    Constant(bool),
    Not(Box<Condition>),
    /// Conditions joined left to right by connectives.
    ///
    /// A grouped junction is parenthesized even where it stands alone.
    Junction {
        first: Box<Condition>,
        rest: Vec<(Connective, Condition)>,
        grouped: bool,
    },
}

impl Condition {
    /// Combine folded parts; a single part is returned as is
    pub fn junction(first: Condition, rest: Vec<(Connective, Condition)>, grouped: bool) -> Condition {
        if rest.is_empty() {
            first
        } else {
            Condition::Junction {
                first: Box::new(first),
                rest,
                grouped,
            }
        }
    }

    /// AND-combine a list of conditions
    pub fn all(parts: Vec<Condition>) -> Option<Condition> {
        let mut parts = parts.into_iter();
        let first = parts.next()?;
        let rest = parts.map(|c| (Connective::And, c)).collect();
        Some(Condition::junction(first, rest, false))
    }

    /// A junction of more than one condition
    pub fn is_compound(&self) -> bool {
        matches!(self, Condition::Junction { .. })
    }
}

/// Abstract SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub table: String,
    pub alias: String,
    pub columns: Vec<SelectColumn>,
    pub joins: Vec<Join>,
    pub condition: Option<Condition>,
    pub order_by: Vec<OrderExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl CompiledQuery {
    /// A query selecting every column of `table` under `alias`
    pub fn new(table: &Table, alias: &str) -> Self {
        let mut query = Self {
            table: table.name().to_string(),
            alias: alias.to_string(),
            columns: Vec::new(),
            joins: Vec::new(),
            condition: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        };
        query.select_table(table, alias);
        query
    }

    pub(crate) fn select_table(&mut self, table: &Table, alias: &str) {
        for (index, column) in table.columns().iter().enumerate() {
            self.columns.push(SelectColumn {
                alias: alias.to_string(),
                column: column.name.clone(),
                label: column_label(alias, index),
            });
        }
    }

    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|join| join.alias == alias)
    }

    /// AND a condition onto the existing WHERE expression
    pub fn and_where(&mut self, condition: Condition) {
        self.condition = match self.condition.take() {
            None => Some(condition),
            Some(existing) => Condition::all(vec![existing, condition]),
        };
    }
}
