//! Criteria to [`CompiledQuery`] compilation.

use std::convert::Infallible;

use serde_json::Value;

use crate::config::OrmConfig;
use crate::criteria::{
    fold_elements, summarize, Comparison, Connective, Criteria, CriteriaObject, Criterion, OrderBy,
    OrderTerm,
};
use crate::error::OrmError;
use crate::query::{relationship_alias, ColumnRef, CompiledQuery, Condition, Join, OrderExpr};
use crate::schema::{Relationship, Schema, Table};

/// Comparison operators accepted in `@operator`, after upper-casing.
/// Comparisons with any other operator are dropped.
pub const SUPPORTED_OPERATORS: &[&str] = &[
    "=", "!=", "<>", ">", ">=", "<", "<=", "IN", "NOT IN", "LIKE", "NOT LIKE", "ILIKE", "NOT ILIKE",
    "IS", "IS NOT",
];

/// Options for [`compile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Alias of the root table
    pub root_alias: String,
    /// Log ignored `@orderBy` terms at warn level instead of debug
    pub report_ignored_order_by: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            root_alias: "t".to_string(),
            report_ignored_order_by: false,
        }
    }
}

impl From<&OrmConfig> for CompileOptions {
    fn from(config: &OrmConfig) -> Self {
        Self {
            root_alias: config.root_alias.clone(),
            report_ignored_order_by: config.report_ignored_order_by,
        }
    }
}

/// Compile criteria against `table` into a new query.
///
/// # Errors
///
/// Returns `OrmError::UnknownTable` if the table or a related table is not
/// registered.
pub fn compile(
    schema: &Schema,
    table: &str,
    criteria: &Criteria,
    options: &CompileOptions,
) -> Result<CompiledQuery, OrmError> {
    let root = schema.get_table(table)?;
    let mut query = CompiledQuery::new(root, &options.root_alias);
    add_criteria(schema, &mut query, criteria, options)?;
    Ok(query)
}

/// Compile criteria into an existing query.
///
/// The resulting condition is AND-ed onto any existing WHERE expression,
/// joins already present are reused, and `@limit`/`@offset` only fill
/// values that are still unset.
pub fn add_criteria(
    schema: &Schema,
    query: &mut CompiledQuery,
    criteria: &Criteria,
    options: &CompileOptions,
) -> Result<(), OrmError> {
    let table = schema.get_table(&query.table)?;

    for object in criteria.objects() {
        if query.limit.is_none() {
            query.limit = object.limit;
        }
        if query.offset.is_none() {
            query.offset = object.offset;
        }
    }

    let alias = query.alias.clone();
    let mut compiler = Compiler {
        schema,
        options,
        query,
    };
    if let Some(condition) = compiler.criteria(table, &alias, criteria)? {
        compiler.query.and_where(condition);
    }
    Ok(())
}

struct Compiler<'a> {
    schema: &'a Schema,
    options: &'a CompileOptions,
    query: &'a mut CompiledQuery,
}

impl<'a> Compiler<'a> {
    fn criteria(&mut self, table: &'a Table, alias: &str, criteria: &Criteria) -> Result<Option<Condition>, OrmError> {
        match criteria {
            Criteria::Object(object) => self.object(table, alias, object),
            Criteria::Array(elements) => {
                let folded = fold_elements(elements, Connective::And, |element| {
                    self.criteria(table, alias, element)
                })?;
                Ok(folded.map(|(first, rest)| Condition::junction(first, rest, false)))
            }
        }
    }

    fn object(&mut self, table: &'a Table, alias: &str, object: &CriteriaObject) -> Result<Option<Condition>, OrmError> {
        let condition = Condition::all(self.object_parts(table, alias, object)?);
        Ok(match condition {
            Some(condition) if object.is_not() => Some(Condition::Not(Box::new(condition))),
            other => other,
        })
    }

    /// Conditions of one object, AND-ed by the caller. Conditions of a
    /// joined relationship are spliced in unless they are negated or given
    /// as an array.
    fn object_parts(&mut self, table: &'a Table, alias: &str, object: &CriteriaObject) -> Result<Vec<Condition>, OrmError> {
        if let Some(order_by) = &object.order_by {
            self.order_by(table, alias, order_by);
        }

        let mut parts = Vec::new();
        for (key, criterion) in &object.entries {
            if let Some(column) = table.resolve_column(key) {
                parts.extend(column_condition(ColumnRef::new(alias, &column.name), criterion));
                continue;
            }

            let Some(relationship) = table.relationship(key) else {
                log::debug!(
                    "Ignoring criteria key '{key}' which is neither a column nor a relationship of table '{}'",
                    table.name()
                );
                continue;
            };
            let Criterion::Relationship(nested) = criterion else {
                log::debug!("Ignoring non-object criteria for relationship '{}.{key}'", table.name());
                continue;
            };
            if summarize(nested).is_loaded_separately() {
                continue;
            }

            let schema = self.schema;
            let other_table = schema.other_table(relationship)?;
            let other_alias = self.join(alias, relationship, other_table);
            match nested {
                Criteria::Object(nested_object) if !nested_object.is_not() => {
                    let nested_parts = self.object_parts(other_table, &other_alias, nested_object)?;
                    parts.extend(nested_parts);
                }
                _ => parts.extend(self.criteria(other_table, &other_alias, nested)?),
            }
        }
        Ok(parts)
    }

    /// LEFT JOIN the relationship once per alias and select its columns
    fn join(&mut self, alias: &str, relationship: &Relationship, other_table: &Table) -> String {
        let other_alias = relationship_alias(alias, relationship.index());
        if !self.query.has_join(&other_alias) {
            self.query.joins.push(Join {
                table: other_table.name().to_string(),
                alias: other_alias.clone(),
                left: ColumnRef::new(alias, &relationship.this_id),
                right: ColumnRef::new(&other_alias, &relationship.other_id),
            });
            self.query.select_table(other_table, &other_alias);
        }
        other_alias
    }

    fn order_by(&mut self, table: &Table, alias: &str, order_by: &OrderBy) {
        for term in order_by.terms() {
            match term.field().and_then(|field| table.resolve_column(field)) {
                Some(column) => self.query.order_by.push(OrderExpr {
                    column: ColumnRef::new(alias, &column.name),
                    direction: term.direction(),
                }),
                None => self.ignore_order_term(table, term),
            }
        }
    }

    fn ignore_order_term(&self, table: &Table, term: &OrderTerm) {
        let description = match term {
            OrderTerm::Invalid(value) => value.to_string(),
            other => other.field().unwrap_or_default().to_string(),
        };
        if self.options.report_ignored_order_by {
            log::warn!("Ignoring @orderBy term {description} on table '{}'", table.name());
        } else {
            log::debug!("Ignoring @orderBy term {description} on table '{}'", table.name());
        }
    }
}

fn column_condition(column: ColumnRef, criterion: &Criterion) -> Option<Condition> {
    match criterion {
        Criterion::Value(Value::Null) => Some(Condition::IsNull {
            column,
            negated: false,
        }),
        Criterion::Value(value) => Some(Condition::Compare {
            column,
            operator: "=".to_string(),
            value: value.clone(),
        }),
        Criterion::List(values) => Some(in_list(column, values, false)),
        Criterion::Comparison(comparison) => compare(column, comparison),
        Criterion::ComparisonList(elements) => {
            let folded = match fold_elements::<_, _, Infallible>(elements, Connective::Or, |comparison| {
                Ok(compare(column.clone(), comparison))
            }) {
                Ok(folded) => folded,
                Err(never) => match never {},
            };
            folded.map(|(first, rest)| Condition::junction(first, rest, true))
        }
        Criterion::Relationship(_) => {
            log::debug!("Ignoring nested criteria given for column '{}'", column.column);
            None
        }
    }
}

/// `IN` over a list; an empty list is constant false, or true when negated
fn in_list(column: ColumnRef, values: &[Value], negated: bool) -> Condition {
    if values.is_empty() {
        Condition::Constant(negated)
    } else {
        Condition::In {
            column,
            values: values.to_vec(),
            negated,
        }
    }
}

fn compare(column: ColumnRef, comparison: &Comparison) -> Option<Condition> {
    let value = comparison.value.as_ref()?;
    let Some(operator) = normalize_operator(&comparison.operator) else {
        log::debug!(
            "Dropping comparison on '{}' with unsupported operator '{}'",
            column.column,
            comparison.operator
        );
        return None;
    };

    let condition = match (operator.as_str(), value) {
        ("=" | "IS", Value::Null) => Condition::IsNull {
            column,
            negated: false,
        },
        ("!=" | "<>" | "IS NOT", Value::Null) => Condition::IsNull {
            column,
            negated: true,
        },
        ("=" | "IN", Value::Array(values)) => in_list(column, values, false),
        ("!=" | "<>" | "NOT IN", Value::Array(values)) => in_list(column, values, true),
        (operator, Value::Array(values)) if values.is_empty() => Condition::Constant(is_negating(operator)),
        ("IN", value) => Condition::In {
            column,
            values: vec![value.clone()],
            negated: false,
        },
        ("NOT IN", value) => Condition::In {
            column,
            values: vec![value.clone()],
            negated: true,
        },
        _ => Condition::Compare {
            column,
            operator,
            value: value.clone(),
        },
    };

    Some(if comparison.not {
        Condition::Not(Box::new(condition))
    } else {
        condition
    })
}

fn normalize_operator(operator: &str) -> Option<String> {
    let normalized = operator
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    SUPPORTED_OPERATORS
        .contains(&normalized.as_str())
        .then_some(normalized)
}

fn is_negating(operator: &str) -> bool {
    operator.starts_with("NOT ") || matches!(operator, "!=" | "<>" | "IS NOT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Direction;
    use crate::test_support::test_schema;
    use serde_json::json;

    fn compile_json(table: &str, criteria: serde_json::Value) -> CompiledQuery {
        let schema = test_schema();
        let criteria = Criteria::try_from(criteria).expect("valid criteria");
        compile(&schema, table, &criteria, &CompileOptions::default()).expect("compiles")
    }

    #[test]
    fn test_compile_selects_every_root_column() {
        let query = compile_json("table1", json!({}));
        assert_eq!(query.columns.len(), 9);
        assert_eq!(query.columns[0].label, "t_0");
        assert_eq!(query.columns[8].column, "one_to_many_object1_many_to_one_id");
        assert!(query.joins.is_empty());
        assert_eq!(query.condition, None);
    }

    #[test]
    fn test_relationship_criteria_join_once() {
        let query = compile_json(
            "table1",
            json!([
                { "manyToManyObject2": { "column1": "a" } },
                "OR",
                { "manyToManyObject2": { "column1": "b", "object2": { "column1": "c" } } }
            ]),
        );
        let aliases: Vec<_> = query.joins.iter().map(|j| j.alias.as_str()).collect();
        assert_eq!(aliases, vec!["t__8", "t__8__1"]);
        assert_eq!(query.joins[0].left, ColumnRef::new("t", "id"));
        assert_eq!(query.joins[0].right, ColumnRef::new("t__8", "table1_id"));
        // 9 + 5 + 6 columns
        assert_eq!(query.columns.len(), 20);
        assert_eq!(query.columns[9].label, "t__8_0");
    }

    #[test]
    fn test_load_separately_is_not_joined() {
        let query = compile_json(
            "table1",
            json!({ "manyToManyObject2": { "@loadSeparately": true, "column1": "a" } }),
        );
        assert!(query.joins.is_empty());
        assert_eq!(query.condition, None, "separately loaded criteria do not filter the root");
    }

    #[test]
    fn test_unsupported_operator_and_missing_value_are_dropped() {
        let query = compile_json(
            "table1",
            json!({
                "column1": { "@operator": "DROP TABLE", "@value": "x" },
                "column2": { "@operator": ">" }
            }),
        );
        assert_eq!(query.condition, None);
    }

    #[test]
    fn test_operator_is_normalized() {
        let query = compile_json("table1", json!({ "column1": { "@operator": " not   like ", "@value": "a%" } }));
        assert!(matches!(
            query.condition,
            Some(Condition::Compare { ref operator, .. }) if operator == "NOT LIKE"
        ));
    }

    #[test]
    fn test_null_comparisons_become_is_null() {
        let query = compile_json("table1", json!({ "column1": null, "column2": { "@operator": "<>", "@value": null } }));
        let Some(Condition::Junction { first, rest, .. }) = query.condition else {
            panic!("expected a junction");
        };
        assert!(matches!(*first, Condition::IsNull { negated: false, .. }));
        assert!(matches!(rest[0].1, Condition::IsNull { negated: true, .. }));
    }

    #[test]
    fn test_limit_and_offset_first_write_wins() {
        let query = compile_json(
            "table1",
            json!([{ "@limit": 5 }, { "@limit": 10, "@offset": 2 }]),
        );
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(2));

        let schema = test_schema();
        let mut query = compile_json("table1", json!({ "@limit": 1 }));
        let more = Criteria::try_from(json!({ "@limit": 7, "column1": "a" })).expect("valid criteria");
        add_criteria(&schema, &mut query, &more, &CompileOptions::default()).expect("compiles");
        assert_eq!(query.limit, Some(1));
        assert!(query.condition.is_some());
    }

    #[test]
    fn test_order_by_follows_traversal() {
        let query = compile_json(
            "table1",
            json!({
                "@orderBy": [{ "field": "column1", "direction": "DESC" }, "nope", 3],
                "manyToManyObject2": { "@orderBy": { "field": "column1", "direction": "ASC" } }
            }),
        );
        assert_eq!(
            query.order_by,
            vec![
                OrderExpr {
                    column: ColumnRef::new("t", "column1"),
                    direction: Some(Direction::Desc),
                },
                OrderExpr {
                    column: ColumnRef::new("t__8", "column1"),
                    direction: Some(Direction::Asc),
                },
            ]
        );
    }

    #[test]
    fn test_property_keys_filter_and_order() {
        let query = compile_json(
            "table1",
            json!({
                "property1": "a",
                "manyToOneObject2": { "property2": 1 },
                "@orderBy": { "field": "property2", "direction": "ASC" }
            }),
        );
        let Some(Condition::Junction { first, rest, .. }) = query.condition else {
            panic!("expected both filters to survive");
        };
        assert!(matches!(*first, Condition::Compare { ref column, .. } if *column == ColumnRef::new("t", "column1")));
        assert!(matches!(rest[0].1, Condition::Compare { ref column, .. } if *column == ColumnRef::new("t__1", "column2")));
        assert_eq!(query.order_by[0].column, ColumnRef::new("t", "column2"));
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        let schema = test_schema();
        let result = compile(&schema, "table3", &Criteria::empty(), &CompileOptions::default());
        assert!(matches!(result, Err(OrmError::UnknownTable(_))));
    }

    #[test]
    fn test_custom_root_alias() {
        let schema = test_schema();
        let options = CompileOptions {
            root_alias: "r".to_string(),
            ..CompileOptions::default()
        };
        let criteria = Criteria::try_from(json!({ "manyToOneObject2": { "id": "x" } })).expect("valid criteria");
        let query = compile(&schema, "table1", &criteria, &options).expect("compiles");
        assert_eq!(query.alias, "r");
        assert_eq!(query.joins[0].alias, "r__1");
    }
}
