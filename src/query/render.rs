//! SQL text rendering of a [`CompiledQuery`].

use std::fmt::Write as _;

use sea_query::{Iden, MysqlQueryBuilder, PostgresQueryBuilder, QueryStatementWriter, SqliteQueryBuilder, Values};
use serde_json::Value;

use crate::config::Dialect;
use crate::criteria::Connective;
use crate::query::{ColumnRef, CompiledQuery, Condition};
use crate::value::to_sea_value;

/// SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub values: Values,
}

/// Turns abstract queries into SQL for one database
pub trait SqlRenderer {
    /// Render the full SELECT statement
    fn render_select(&self, query: &CompiledQuery) -> RenderedSql;

    /// Render a WHERE expression on its own
    fn render_condition(&self, condition: &Condition) -> RenderedSql;
}

/// Renderer for the built-in dialects.
///
/// Postgres gets `$n` placeholders, MySQL and SQLite get `?`. Only MySQL
/// has a boolean `XOR`; elsewhere `a XOR b` is rendered as `(a) <> (b)`.
/// Mixed connectives group as `a OR (b XOR (c AND d))` in every dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectRenderer {
    dialect: Dialect,
}

impl DialectRenderer {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl SqlRenderer for DialectRenderer {
    fn render_select(&self, query: &CompiledQuery) -> RenderedSql {
        let mut writer = Writer::new(self.dialect);
        let mut sql = String::from("SELECT ");

        let columns = query
            .columns
            .iter()
            .map(|c| format!("{}.{} {}", c.alias, c.column, writer.quote(&c.label)))
            .collect::<Vec<_>>();
        sql.push_str(&columns.join(", "));
        let _ = write!(sql, " FROM {} {}", query.table, query.alias);

        for join in &query.joins {
            let _ = write!(
                sql,
                " LEFT JOIN {} {} ON {} = {}",
                join.table,
                join.alias,
                column(&join.left),
                column(&join.right)
            );
        }

        if let Some(condition) = &query.condition {
            let rendered = writer.condition(condition);
            let _ = write!(sql, " WHERE {rendered}");
        }

        if !query.order_by.is_empty() {
            let terms = query
                .order_by
                .iter()
                .map(|o| match o.direction {
                    Some(direction) => format!("{} {}", column(&o.column), direction.as_str()),
                    None => column(&o.column),
                })
                .collect::<Vec<_>>();
            let _ = write!(sql, " ORDER BY {}", terms.join(", "));
        }

        match (query.limit, query.offset) {
            (Some(limit), _) => {
                let _ = write!(sql, " LIMIT {limit}");
            }
            (None, Some(_)) => match self.dialect {
                Dialect::MySql => sql.push_str(" LIMIT 18446744073709551615"),
                Dialect::Sqlite => sql.push_str(" LIMIT -1"),
                Dialect::Postgres => {}
            },
            (None, None) => {}
        }
        if let Some(offset) = query.offset {
            let _ = write!(sql, " OFFSET {offset}");
        }

        RenderedSql {
            sql,
            values: Values(writer.values),
        }
    }

    fn render_condition(&self, condition: &Condition) -> RenderedSql {
        let mut writer = Writer::new(self.dialect);
        let sql = writer.condition(condition);
        RenderedSql {
            sql,
            values: Values(writer.values),
        }
    }
}

/// A table or column name known only at runtime
#[derive(Debug, Clone)]
pub(crate) struct Ident(pub String);

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// Build a sea-query INSERT, UPDATE, DELETE or SELECT statement for `dialect`
pub fn build_statement<S: QueryStatementWriter>(statement: &S, dialect: Dialect) -> RenderedSql {
    let (sql, values) = match dialect {
        Dialect::Postgres => statement.build(PostgresQueryBuilder),
        Dialect::MySql => statement.build(MysqlQueryBuilder),
        Dialect::Sqlite => statement.build(SqliteQueryBuilder),
    };
    RenderedSql { sql, values }
}

fn column(column: &ColumnRef) -> String {
    format!("{}.{}", column.alias, column.column)
}

/// Renders conditions left to right so parameters line up with their
/// placeholders.
struct Writer {
    dialect: Dialect,
    values: Vec<sea_query::Value>,
}

impl Writer {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    fn quote(&self, label: &str) -> String {
        match self.dialect {
            Dialect::MySql => format!("`{label}`"),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{label}\""),
        }
    }

    fn param(&mut self, value: &Value) -> String {
        self.values.push(to_sea_value(value));
        match self.dialect {
            Dialect::Postgres => format!("${}", self.values.len()),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare {
                column: c,
                operator,
                value,
            } => {
                let placeholder = self.param(value);
                format!("{} {operator} {placeholder}", column(c))
            }
            Condition::In {
                column: c,
                values,
                negated,
            } => {
                let placeholders = values.iter().map(|v| self.param(v)).collect::<Vec<_>>();
                let not = if *negated { "NOT " } else { "" };
                format!("{} {not}IN ({})", column(c), placeholders.join(", "))
            }
            Condition::IsNull { column: c, negated } => {
                let not = if *negated { "NOT " } else { "" };
                format!("{} IS {not}NULL", column(c))
            }
            Condition::Constant(true) => "1 = 1".to_string(),
            Condition::Constant(false) => "1 = 2".to_string(),
            Condition::Not(inner) if inner.is_compound() => format!("NOT ({})", self.bare(inner)),
            Condition::Not(inner) => format!("NOT {}", self.condition(inner)),
            Condition::Junction { grouped, .. } => {
                let bare = self.bare(condition);
                if *grouped {
                    format!("({bare})")
                } else {
                    bare
                }
            }
        }
    }

    /// A junction without its own parentheses.
    ///
    /// Connectives bind with MySQL precedence (AND, then XOR, then OR) and
    /// every mixed group is parenthesized, so all dialects agree on the
    /// grouping.
    fn bare(&mut self, condition: &Condition) -> String {
        let Condition::Junction { first, rest, .. } = condition else {
            return self.condition(condition);
        };

        // OR terms, each a list of XOR terms, each a list of AND operands
        let mut or_terms: Vec<Vec<Vec<String>>> = vec![vec![vec![self.operand(first)]]];
        for (connective, next) in rest {
            let rendered = self.operand(next);
            match connective {
                Connective::Or => or_terms.push(vec![vec![rendered]]),
                Connective::Xor => {
                    if let Some(xor_terms) = or_terms.last_mut() {
                        xor_terms.push(vec![rendered]);
                    }
                }
                Connective::And => {
                    if let Some(and_terms) = or_terms.last_mut().and_then(|xor_terms| xor_terms.last_mut()) {
                        and_terms.push(rendered);
                    }
                }
            }
        }

        let grouped = or_terms.len() > 1;
        or_terms
            .into_iter()
            .map(|xor_terms| {
                let mixed = xor_terms.len() > 1;
                let xor = self.xor(xor_terms);
                if grouped && mixed {
                    format!("({xor})")
                } else {
                    xor
                }
            })
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// XOR over AND groups. Postgres and SQLite have no boolean XOR, so
    /// `a XOR b` becomes `(a) <> (b)`, folded left to right.
    fn xor(&self, xor_terms: Vec<Vec<String>>) -> String {
        let mixed = xor_terms.len() > 1;
        let mut terms = xor_terms.into_iter().map(|and_terms| {
            let several = and_terms.len() > 1;
            (and_terms.join(" AND "), several)
        });
        let Some((first, first_several)) = terms.next() else {
            return String::new();
        };

        match self.dialect {
            Dialect::MySql => {
                let wrap = |sql: String, several: bool| {
                    if mixed && several {
                        format!("({sql})")
                    } else {
                        sql
                    }
                };
                let mut sql = wrap(first, first_several);
                for (next, several) in terms {
                    sql = format!("{sql} XOR {}", wrap(next, several));
                }
                sql
            }
            Dialect::Postgres | Dialect::Sqlite => {
                let mut sql = first;
                for (next, _) in terms {
                    sql = format!("({sql}) <> ({next})");
                }
                sql
            }
        }
    }

    fn operand(&mut self, condition: &Condition) -> String {
        if condition.is_compound() {
            format!("({})", self.bare(condition))
        } else {
            self.condition(condition)
        }
    }
}
