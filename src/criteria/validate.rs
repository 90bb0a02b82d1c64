//! Structural validation of criteria against the schema.
//!
//! Validation is advisory: it collects every issue in the tree and leaves
//! the decision to reject a request to the caller.

use serde::Serialize;

use crate::criteria::{Criteria, CriteriaObject, Criterion, Element};
use crate::error::OrmError;
use crate::schema::{Schema, Table};

pub const NOT_EXISTING_MESSAGE: &str = "Given column, relationship or @-property does not exist";

/// One problem found in a criteria tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriteriaIssue {
    /// Dotted path to the offending key, e.g. `manyToOneObject2.@invalid`
    pub location: String,
    pub message: String,
}

/// Check every key of every criteria object against the table's columns,
/// relationships and the known `@`-directives.
///
/// Keys may name a column or the property mapped to it, matching what
/// [`compile`](crate::query::compile) accepts.
///
/// # Errors
///
/// Returns `OrmError::UnknownTable` if `table` or a related table is not in the schema.
/// Problems inside the criteria are returned as issues, never as errors.
pub fn validate_criteria(
    schema: &Schema,
    table: &str,
    criteria: &Criteria,
) -> Result<Vec<CriteriaIssue>, OrmError> {
    let table = schema.get_table(table)?;
    let mut issues = Vec::new();
    validate(schema, table, criteria, "", &mut issues)?;
    Ok(issues)
}

fn validate(
    schema: &Schema,
    table: &Table,
    criteria: &Criteria,
    path: &str,
    issues: &mut Vec<CriteriaIssue>,
) -> Result<(), OrmError> {
    match criteria {
        Criteria::Object(object) => validate_object(schema, table, object, path, issues),
        Criteria::Array(elements) => {
            for element in elements {
                if let Element::Item(criteria) = element {
                    validate(schema, table, criteria, path, issues)?;
                }
            }
            Ok(())
        }
    }
}

fn validate_object(
    schema: &Schema,
    table: &Table,
    object: &CriteriaObject,
    path: &str,
    issues: &mut Vec<CriteriaIssue>,
) -> Result<(), OrmError> {
    for (key, criterion) in &object.entries {
        if table.resolve_column(key).is_some() {
            continue;
        }

        if let Some(relationship) = table.relationship(key) {
            if let Criterion::Relationship(nested) = criterion {
                let other_table = schema.other_table(relationship)?;
                validate(schema, other_table, nested, &format!("{path}{key}."), issues)?;
            }
            continue;
        }

        issues.push(CriteriaIssue {
            location: format!("{path}{key}"),
            message: NOT_EXISTING_MESSAGE.to_string(),
        });
    }

    for directive in &object.unknown_directives {
        issues.push(CriteriaIssue {
            location: format!("{path}{directive}"),
            message: NOT_EXISTING_MESSAGE.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_schema;
    use serde_json::json;

    fn issues(value: serde_json::Value) -> Vec<CriteriaIssue> {
        let criteria = Criteria::try_from(value).expect("valid criteria");
        validate_criteria(&test_schema(), "table1", &criteria).expect("table1 exists")
    }

    #[test]
    fn test_valid_criteria_have_no_issues() {
        assert!(issues(json!({})).is_empty());
        assert!(issues(json!({
            "id": 1,
            "column1": "a",
            "manyToOneObject2": { "column2": 1, "@orderBy": "id", "@limit": 5, "@offset": 10 },
            "@orderBy": "id",
            "@limit": 5,
            "@offset": 10
        }))
        .is_empty());
        assert!(issues(json!({
            "column1": { "@operator": "=", "@value": "a" },
            "column2": { "@operator": ">" }
        }))
        .is_empty());
    }

    #[test]
    fn test_property_keys_are_valid() {
        assert!(issues(json!({ "property1": "a", "manyToOneObject2": { "property2": 1 } })).is_empty());
    }

    #[test]
    fn test_directives_on_relationships_are_valid() {
        for directive in ["@load", "@loadSeparately", "@not", "@count", "@min", "@max"] {
            let mut inner = serde_json::Map::new();
            inner.insert(directive.to_string(), json!(true));
            let found = issues(json!({ "manyToOneObject2": inner }));
            assert!(found.is_empty(), "{directive} should be accepted, got {found:?}");
        }
    }

    #[test]
    fn test_unknown_keys_are_all_reported() {
        let found = issues(json!({
            "column": "a",
            "object": {},
            "@invalid": true
        }));
        let locations: Vec<_> = found.iter().map(|i| i.location.as_str()).collect();
        assert_eq!(locations, vec!["column", "object", "@invalid"]);
        assert!(found.iter().all(|i| i.message == NOT_EXISTING_MESSAGE));
    }

    #[test]
    fn test_nested_issues_carry_dotted_location() {
        let found = issues(json!([
            { "manyToOneObject2": { "column": "a", "@invalid": true } },
            "OR",
            { "manyToManyObject2": { "object1": { "nope": 1 } } }
        ]));
        let locations: Vec<_> = found.iter().map(|i| i.location.as_str()).collect();
        assert_eq!(
            locations,
            vec![
                "manyToOneObject2.column",
                "manyToOneObject2.@invalid",
                "manyToManyObject2.object1.nope"
            ]
        );
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        let result = validate_criteria(&test_schema(), "table9", &Criteria::empty());
        assert!(matches!(result, Err(OrmError::UnknownTable(_))));
    }
}
