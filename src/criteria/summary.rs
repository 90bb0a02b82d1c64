//! Flattening a criteria tree into effective per-relationship directives.
//!
//! Arrays are flattened and repeated relationship keys merged recursively.
//! For every directive the first explicitly given value wins; for every
//! relationship the first criteria encountered is kept verbatim.

use std::collections::BTreeMap;

use crate::criteria::{Criteria, Criterion};

/// Effective directives of one criteria level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub load: Option<bool>,
    pub load_separately: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub relationships: BTreeMap<String, RelationshipSummary>,
}

/// Summary of one relationship key
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipSummary {
    /// The first criteria given for the relationship
    pub criteria: Criteria,
    /// Merged directives of every criteria given for the relationship
    pub summary: Summary,
}

impl Summary {
    /// Entities are attached through the joined rows
    pub fn is_loaded_by_join(&self) -> bool {
        self.load == Some(true) && self.load_separately != Some(true)
    }

    /// Entities are resolved by a follow-up query
    pub fn is_loaded_separately(&self) -> bool {
        self.load_separately == Some(true)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSummary> {
        self.relationships.get(name)
    }

    fn merge(&mut self, other: Summary) {
        self.load = self.load.or(other.load);
        self.load_separately = self.load_separately.or(other.load_separately);
        self.limit = self.limit.or(other.limit);
        self.offset = self.offset.or(other.offset);

        for (name, relationship) in other.relationships {
            match self.relationships.get_mut(&name) {
                Some(existing) => existing.summary.merge(relationship.summary),
                None => {
                    self.relationships.insert(name, relationship);
                }
            }
        }
    }
}

/// Summarize a criteria tree
pub fn summarize(criteria: &Criteria) -> Summary {
    let mut summary = Summary::default();

    for object in criteria.objects() {
        let mut level = Summary {
            load: object.load,
            load_separately: object.load_separately,
            limit: object.limit,
            offset: object.offset,
            relationships: BTreeMap::new(),
        };

        for (key, criterion) in &object.entries {
            let Criterion::Relationship(nested) = criterion else {
                continue;
            };
            let nested_summary = summarize(nested);
            match level.relationships.get_mut(key) {
                Some(existing) => existing.summary.merge(nested_summary),
                None => {
                    level.relationships.insert(
                        key.clone(),
                        RelationshipSummary {
                            criteria: nested.clone(),
                            summary: nested_summary,
                        },
                    );
                }
            }
        }

        summary.merge(level);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn criteria(value: serde_json::Value) -> Criteria {
        Criteria::try_from(value).expect("valid criteria")
    }

    #[test]
    fn test_summarize_single_object() {
        let summary = summarize(&criteria(json!({
            "column1": "a",
            "manyToManyObject2": { "@load": true, "object2": { "@loadSeparately": true } },
            "@limit": 5
        })));
        assert_eq!(summary.limit, Some(5));
        let rel = summary.relationship("manyToManyObject2").expect("summarized");
        assert!(rel.summary.is_loaded_by_join());
        let nested = rel.summary.relationship("object2").expect("nested summarized");
        assert!(nested.summary.is_loaded_separately());
        assert!(!nested.summary.is_loaded_by_join());
    }

    #[test]
    fn test_summarize_merges_array_branches_first_wins() {
        let summary = summarize(&criteria(json!([
            { "manyToManyObject2": { "column1": "a" } },
            "XOR",
            [{ "manyToManyObject2": { "@load": true, "object1": { "@load": true } } }],
            "OR",
            { "manyToManyObject2": { "@load": false, "object2": { "@load": true } } }
        ])));
        let rel = summary.relationship("manyToManyObject2").expect("summarized");
        assert_eq!(rel.summary.load, Some(true), "first explicit @load wins");
        assert!(rel.summary.relationship("object1").is_some());
        assert!(rel.summary.relationship("object2").is_some());
        assert_eq!(
            rel.criteria,
            criteria(json!({ "column1": "a" })),
            "first criteria is kept for the relationship"
        );
    }

    #[test]
    fn test_summarize_ignores_non_relationship_entries() {
        let summary = summarize(&criteria(json!({ "column1": { "@operator": "=", "@value": 1 } })));
        assert!(summary.relationships.is_empty());
        assert_eq!(summary, Summary::default());
    }
}
