//! JSON form of criteria.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::criteria::{
    Comparison, Connective, Criteria, CriteriaObject, Criterion, Direction, Element, OrderBy,
    OrderTerm,
};
use crate::error::OrmError;

const COMPARISON_KEYS: [&str; 6] = ["@operator", "operator", "@value", "value", "@not", "not"];

impl TryFrom<Value> for Criteria {
    type Error = OrmError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        parse_criteria(&value)
    }
}

impl TryFrom<&Value> for Criteria {
    type Error = OrmError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        parse_criteria(value)
    }
}

impl From<&Criteria> for Value {
    fn from(criteria: &Criteria) -> Self {
        match criteria {
            Criteria::Object(object) => object_to_json(object),
            Criteria::Array(elements) => Value::Array(
                elements
                    .iter()
                    .map(|element| match element {
                        Element::Item(criteria) => Value::from(criteria),
                        Element::Connective(c) => Value::String(c.as_str().to_string()),
                    })
                    .collect(),
            ),
        }
    }
}

impl From<Criteria> for Value {
    fn from(criteria: Criteria) -> Self {
        Value::from(&criteria)
    }
}

impl Serialize for Criteria {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Criteria {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Criteria::try_from(value).map_err(serde::de::Error::custom)
    }
}

fn parse_criteria(value: &Value) -> Result<Criteria, OrmError> {
    match value {
        Value::Object(map) => Ok(Criteria::Object(parse_object(map)?)),
        Value::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                let element = match item {
                    Value::String(token) => Element::Connective(Connective::parse(token).ok_or_else(
                        || OrmError::InvalidCriteria(format!("Unknown connective '{token}'")),
                    )?),
                    Value::Object(_) | Value::Array(_) => Element::Item(parse_criteria(item)?),
                    other => {
                        return Err(OrmError::InvalidCriteria(format!(
                            "Criteria arrays may only contain criteria and connectives, got {other}"
                        )))
                    }
                };
                elements.push(element);
            }
            Ok(Criteria::Array(elements))
        }
        other => Err(OrmError::InvalidCriteria(format!(
            "Criteria must be an object or an array, got {other}"
        ))),
    }
}

fn parse_object(map: &Map<String, Value>) -> Result<CriteriaObject, OrmError> {
    let mut object = CriteriaObject::default();

    for (key, value) in map {
        match key.as_str() {
            "@not" => object.not = Some(expect_bool(key, value)?),
            "@load" => object.load = Some(expect_bool(key, value)?),
            "@loadSeparately" => object.load_separately = Some(expect_bool(key, value)?),
            "@count" => object.count = Some(parse_criterion(value)?),
            "@min" => object.min = Some(parse_criterion(value)?),
            "@max" => object.max = Some(parse_criterion(value)?),
            "@orderBy" => object.order_by = Some(parse_order_by(value)),
            "@limit" => object.limit = Some(expect_u64(key, value)?),
            "@offset" => object.offset = Some(expect_u64(key, value)?),
            directive if directive.starts_with('@') => {
                object.unknown_directives.push(directive.to_string())
            }
            _ => object.entries.push((key.clone(), parse_criterion(value)?)),
        }
    }

    Ok(object)
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, OrmError> {
    value
        .as_bool()
        .ok_or_else(|| OrmError::InvalidCriteria(format!("{key} expects a boolean, got {value}")))
}

fn expect_u64(key: &str, value: &Value) -> Result<u64, OrmError> {
    value.as_u64().ok_or_else(|| {
        OrmError::InvalidCriteria(format!("{key} expects a non-negative integer, got {value}"))
    })
}

fn is_comparison(map: &Map<String, Value>) -> bool {
    (map.contains_key("@operator") || map.contains_key("operator"))
        && map.keys().all(|k| COMPARISON_KEYS.contains(&k.as_str()))
}

fn parse_comparison(map: &Map<String, Value>) -> Comparison {
    let operator = match map.get("@operator").or_else(|| map.get("operator")) {
        Some(Value::String(s)) => s.clone(),
        // never matches the operator whitelist, so the comparison is dropped
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Comparison {
        operator,
        value: map.get("@value").or_else(|| map.get("value")).cloned(),
        not: map
            .get("@not")
            .or_else(|| map.get("not"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn parse_criterion(value: &Value) -> Result<Criterion, OrmError> {
    match value {
        Value::Object(map) if is_comparison(map) => Ok(Criterion::Comparison(parse_comparison(map))),
        Value::Object(_) => Ok(Criterion::Relationship(parse_criteria(value)?)),
        Value::Array(items) => parse_array_criterion(value, items),
        scalar => Ok(Criterion::Value(scalar.clone())),
    }
}

fn parse_array_criterion(value: &Value, items: &[Value]) -> Result<Criterion, OrmError> {
    let has_comparison = items
        .iter()
        .any(|item| matches!(item, Value::Object(map) if is_comparison(map)));

    if has_comparison {
        let mut elements = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(map) if is_comparison(map) => {
                    elements.push(Element::Item(parse_comparison(map)))
                }
                Value::String(token) if Connective::parse(token).is_some() => {
                    if let Some(c) = Connective::parse(token) {
                        elements.push(Element::Connective(c));
                    }
                }
                other => {
                    return Err(OrmError::InvalidCriteria(format!(
                        "Comparison lists may only contain comparisons and connectives, got {other}"
                    )))
                }
            }
        }
        return Ok(Criterion::ComparisonList(elements));
    }

    let nested = items
        .iter()
        .any(|item| matches!(item, Value::Object(_) | Value::Array(_)));
    if nested {
        return Ok(Criterion::Relationship(parse_criteria(value)?));
    }

    Ok(Criterion::List(items.to_vec()))
}

fn parse_order_by(value: &Value) -> OrderBy {
    match value {
        Value::Array(items) => OrderBy::List(items.iter().map(parse_order_term).collect()),
        single => OrderBy::Single(parse_order_term(single)),
    }
}

fn parse_order_term(value: &Value) -> OrderTerm {
    match value {
        Value::String(field) => OrderTerm::Field(field.clone()),
        Value::Object(map) => {
            let Some(Value::String(field)) = map.get("field") else {
                return OrderTerm::Invalid(value.clone());
            };
            let direction = match map.get("direction") {
                None | Some(Value::Null) => None,
                Some(Value::String(d)) => match Direction::parse(d) {
                    Some(direction) => Some(direction),
                    None => return OrderTerm::Invalid(value.clone()),
                },
                Some(_) => return OrderTerm::Invalid(value.clone()),
            };
            OrderTerm::Directed {
                field: field.clone(),
                direction,
            }
        }
        other => OrderTerm::Invalid(other.clone()),
    }
}

fn object_to_json(object: &CriteriaObject) -> Value {
    let mut map = Map::new();

    for (key, criterion) in &object.entries {
        map.insert(key.clone(), criterion_to_json(criterion));
    }

    if let Some(not) = object.not {
        map.insert("@not".into(), Value::Bool(not));
    }
    if let Some(load) = object.load {
        map.insert("@load".into(), Value::Bool(load));
    }
    if let Some(load_separately) = object.load_separately {
        map.insert("@loadSeparately".into(), Value::Bool(load_separately));
    }
    if let Some(count) = &object.count {
        map.insert("@count".into(), criterion_to_json(count));
    }
    if let Some(min) = &object.min {
        map.insert("@min".into(), criterion_to_json(min));
    }
    if let Some(max) = &object.max {
        map.insert("@max".into(), criterion_to_json(max));
    }
    if let Some(order_by) = &object.order_by {
        let json = match order_by {
            OrderBy::Single(term) => order_term_to_json(term),
            OrderBy::List(terms) => Value::Array(terms.iter().map(order_term_to_json).collect()),
        };
        map.insert("@orderBy".into(), json);
    }
    if let Some(limit) = object.limit {
        map.insert("@limit".into(), Value::from(limit));
    }
    if let Some(offset) = object.offset {
        map.insert("@offset".into(), Value::from(offset));
    }

    Value::Object(map)
}

fn criterion_to_json(criterion: &Criterion) -> Value {
    match criterion {
        Criterion::Value(value) => value.clone(),
        Criterion::List(values) => Value::Array(values.clone()),
        Criterion::Comparison(comparison) => comparison_to_json(comparison),
        Criterion::ComparisonList(elements) => Value::Array(
            elements
                .iter()
                .map(|element| match element {
                    Element::Item(comparison) => comparison_to_json(comparison),
                    Element::Connective(c) => Value::String(c.as_str().to_string()),
                })
                .collect(),
        ),
        Criterion::Relationship(criteria) => Value::from(criteria),
    }
}

fn comparison_to_json(comparison: &Comparison) -> Value {
    let mut map = Map::new();
    map.insert("@operator".into(), Value::String(comparison.operator.clone()));
    if let Some(value) = &comparison.value {
        map.insert("@value".into(), value.clone());
    }
    if comparison.not {
        map.insert("@not".into(), Value::Bool(true));
    }
    Value::Object(map)
}

fn order_term_to_json(term: &OrderTerm) -> Value {
    match term {
        OrderTerm::Field(field) => Value::String(field.clone()),
        OrderTerm::Directed { field, direction } => {
            let mut map = Map::new();
            map.insert("field".into(), Value::String(field.clone()));
            if let Some(direction) = direction {
                map.insert("direction".into(), Value::String(direction.as_str().to_string()));
            }
            Value::Object(map)
        }
        OrderTerm::Invalid(value) => value.clone(),
    }
}
