//! The criteria language.
//!
//! Criteria are either a single [`CriteriaObject`] or a sequence of criteria
//! interleaved with [`Connective`] tokens. A criteria object maps column or
//! relationship names to a [`Criterion`] and carries the `@`-directives as
//! typed fields.
//!
//! The JSON form accepted by [`Criteria::try_from`] looks like:
//!
//! ```
//! use joinery::criteria::Criteria;
//! use serde_json::json;
//!
//! let criteria = Criteria::try_from(json!([
//!     { "column1": "a", "column2": { "@operator": ">", "@value": 1 } },
//!     "OR",
//!     { "manyToManyObject2": { "@load": true, "column1": ["b", "c"] } }
//! ]))?;
//! assert!(matches!(criteria, Criteria::Array(_)));
//! # Ok::<(), joinery::OrmError>(())
//! ```

mod json;
mod summary;
mod validate;

pub use summary::{summarize, RelationshipSummary, Summary};
pub use validate::{validate_criteria, CriteriaIssue, NOT_EXISTING_MESSAGE};

use serde_json::Value;

/// Boolean token combining neighbouring criteria or comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
    Xor,
}

impl Connective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
            Connective::Xor => "XOR",
        }
    }

    /// Parse a connective token, ignoring case
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Connective::And),
            "OR" => Some(Connective::Or),
            "XOR" => Some(Connective::Xor),
            _ => None,
        }
    }
}

/// One element of a sequence that interleaves items with connectives
#[derive(Debug, Clone, PartialEq)]
pub enum Element<T> {
    Item(T),
    Connective(Connective),
}

/// Fold a connective-interleaved sequence.
///
/// Items for which `f` returns `None` are skipped. Leading and trailing
/// tokens are ignored; between two items the last token seen wins and
/// `default` applies when there is none.
pub(crate) fn fold_elements<T, R, E>(
    elements: &[Element<T>],
    default: Connective,
    mut f: impl FnMut(&T) -> Result<Option<R>, E>,
) -> Result<Option<(R, Vec<(Connective, R)>)>, E> {
    let mut first = None;
    let mut rest = Vec::new();
    let mut pending = None;

    for element in elements {
        match element {
            Element::Connective(connective) => pending = Some(*connective),
            Element::Item(item) => {
                let Some(result) = f(item)? else {
                    continue;
                };
                if first.is_none() {
                    first = Some(result);
                } else {
                    rest.push((pending.unwrap_or(default), result));
                }
                pending = None;
            }
        }
    }

    Ok(first.map(|first| (first, rest)))
}

/// A criteria tree
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Object(CriteriaObject),
    Array(Vec<Element<Criteria>>),
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::Object(CriteriaObject::default())
    }
}

impl Criteria {
    /// Criteria matching everything
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every criteria object in the tree at this level, in order, descending
    /// through arrays but not into relationships
    pub fn objects(&self) -> Vec<&CriteriaObject> {
        let mut objects = Vec::new();
        self.collect_objects(&mut objects);
        objects
    }

    fn collect_objects<'a>(&'a self, objects: &mut Vec<&'a CriteriaObject>) {
        match self {
            Criteria::Object(object) => objects.push(object),
            Criteria::Array(elements) => {
                for element in elements {
                    if let Element::Item(criteria) = element {
                        criteria.collect_objects(objects);
                    }
                }
            }
        }
    }
}

impl From<CriteriaObject> for Criteria {
    fn from(object: CriteriaObject) -> Self {
        Criteria::Object(object)
    }
}

/// A mapping of column or relationship names to criteria plus directives
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CriteriaObject {
    /// Column and relationship entries in the order they were given
    pub entries: Vec<(String, Criterion)>,
    /// `@not`: negate the whole object
    pub not: Option<bool>,
    /// `@load`: attach the relationship's entities to the result
    pub load: Option<bool>,
    /// `@loadSeparately`: resolve the relationship with a follow-up query
    pub load_separately: Option<bool>,
    /// `@count`
    pub count: Option<Criterion>,
    /// `@min`
    pub min: Option<Criterion>,
    /// `@max`
    pub max: Option<Criterion>,
    /// `@orderBy`
    pub order_by: Option<OrderBy>,
    /// `@limit`
    pub limit: Option<u64>,
    /// `@offset`
    pub offset: Option<u64>,
    /// `@`-prefixed keys that are not directives, kept for validation
    pub unknown_directives: Vec<String>,
}

impl CriteriaObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style entry insertion
    pub fn with(mut self, key: impl Into<String>, criterion: Criterion) -> Self {
        self.insert(key, criterion);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Criterion> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    /// Insert or replace an entry, keeping the position of a replaced key
    pub fn insert(&mut self, key: impl Into<String>, criterion: Criterion) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = criterion,
            None => self.entries.push((key, criterion)),
        }
    }

    pub fn is_not(&self) -> bool {
        self.not == Some(true)
    }
}

/// The condition given for one key of a criteria object
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Equality, or `IS NULL` for `null`
    Value(Value),
    /// `IN (...)`; an empty list never matches
    List(Vec<Value>),
    Comparison(Comparison),
    /// Comparisons combined with `OR` unless connectives are given
    ComparisonList(Vec<Element<Comparison>>),
    /// Nested criteria for a relationship
    Relationship(Criteria),
}

/// `{ "@operator": ..., "@value": ..., "@not": ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub operator: String,
    /// `None` when the value was not given; such comparisons are dropped
    pub value: Option<Value>,
    pub not: bool,
}

impl Comparison {
    pub fn new(operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            operator: operator.into(),
            value: Some(value.into()),
            not: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }
}

/// Sort direction of an order term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Direction::Asc),
            "DESC" => Some(Direction::Desc),
            _ => None,
        }
    }
}

/// `@orderBy` as given: a single term or a list of terms
#[derive(Debug, Clone, PartialEq)]
pub enum OrderBy {
    Single(OrderTerm),
    List(Vec<OrderTerm>),
}

impl OrderBy {
    pub fn terms(&self) -> &[OrderTerm] {
        match self {
            OrderBy::Single(term) => std::slice::from_ref(term),
            OrderBy::List(terms) => terms,
        }
    }

    /// Apply `f` to every field reference, keeping the shape
    pub fn map_fields(&self, mut f: impl FnMut(&str) -> String) -> OrderBy {
        let mut map = |term: &OrderTerm| match term {
            OrderTerm::Field(field) => OrderTerm::Field(f(field)),
            OrderTerm::Directed { field, direction } => OrderTerm::Directed {
                field: f(field),
                direction: *direction,
            },
            OrderTerm::Invalid(value) => OrderTerm::Invalid(value.clone()),
        };
        match self {
            OrderBy::Single(term) => OrderBy::Single(map(term)),
            OrderBy::List(terms) => OrderBy::List(terms.iter().map(map).collect()),
        }
    }
}

/// One `@orderBy` term
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTerm {
    /// Bare field name, ascending by default
    Field(String),
    /// `{ "field": ..., "direction": ... }`
    Directed {
        field: String,
        direction: Option<Direction>,
    },
    /// A term of unrecognised shape; ignored when compiling
    Invalid(Value),
}

impl OrderTerm {
    pub fn field(&self) -> Option<&str> {
        match self {
            OrderTerm::Field(field) | OrderTerm::Directed { field, .. } => Some(field),
            OrderTerm::Invalid(_) => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            OrderTerm::Directed { direction, .. } => *direction,
            _ => None,
        }
    }
}
