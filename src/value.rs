//! Row representation and value helpers.
//!
//! Rows and instances are both JSON objects: a row is keyed by column names
//! (or select labels before unjoining), an instance by property names.
//! Parameters travel to the executor as `sea_query::Values`.

use serde_json::{Map, Number, Value};

/// A flat row or instance: field name to JSON value
pub type Row = Map<String, Value>;

/// Returns true when the field is absent or explicitly null
pub fn is_null_or_absent(row: &Row, field: &str) -> bool {
    row.get(field).map_or(true, Value::is_null)
}

/// Id equality used when attaching relationship rows.
///
/// Both sides must be present and not null; `1` and `1.0` are considered equal.
pub fn ids_match(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left.and_then(id_key), right.and_then(id_key)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Hashable form of an id value, `None` for null.
///
/// Two ids have the same key exactly when [`ids_match`] holds for them.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(n) => Some(match n.as_f64() {
            // adding zero folds -0.0 into 0.0
            Some(f) => format!("#{}", f + 0.0),
            None => format!("#{n}"),
        }),
        other => Some(other.to_string()),
    }
}

/// Convert a JSON value into a SeaQuery parameter value.
///
/// Integers bind as `BigInt`, other numbers as `Double`; arrays and objects
/// bind as JSON. `null` binds as a typed null string.
pub fn to_sea_value(value: &Value) -> sea_query::Value {
    match value {
        Value::Null => sea_query::Value::String(None),
        Value::Bool(b) => sea_query::Value::Bool(Some(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                sea_query::Value::BigInt(Some(i))
            } else if let Some(u) = n.as_u64() {
                sea_query::Value::BigUnsigned(Some(u))
            } else {
                sea_query::Value::Double(n.as_f64())
            }
        }
        Value::String(s) => sea_query::Value::String(Some(s.clone())),
        Value::Array(_) | Value::Object(_) => {
            sea_query::Value::Json(Some(Box::new(value.clone())))
        }
    }
}

/// Convert a SeaQuery value back into JSON.
///
/// Used to read back parameters in diagnostics and by the mock executor.
/// Types without a natural JSON form are rendered through their debug output.
pub fn from_sea_value(value: &sea_query::Value) -> Value {
    use sea_query::Value as V;
    match value {
        V::Bool(Some(b)) => Value::Bool(*b),
        V::TinyInt(Some(i)) => Value::from(*i),
        V::SmallInt(Some(i)) => Value::from(*i),
        V::Int(Some(i)) => Value::from(*i),
        V::BigInt(Some(i)) => Value::from(*i),
        V::TinyUnsigned(Some(u)) => Value::from(*u),
        V::SmallUnsigned(Some(u)) => Value::from(*u),
        V::Unsigned(Some(u)) => Value::from(*u),
        V::BigUnsigned(Some(u)) => Value::from(*u),
        V::Float(Some(f)) => Number::from_f64(f64::from(*f)).map_or(Value::Null, Value::Number),
        V::Double(Some(d)) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        V::String(Some(s)) => Value::String(s.clone()),
        V::Json(Some(j)) => (**j).clone(),
        V::Bool(None)
        | V::TinyInt(None)
        | V::SmallInt(None)
        | V::Int(None)
        | V::BigInt(None)
        | V::TinyUnsigned(None)
        | V::SmallUnsigned(None)
        | V::Unsigned(None)
        | V::BigUnsigned(None)
        | V::Float(None)
        | V::Double(None)
        | V::String(None)
        | V::Json(None) => Value::Null,
        other => Value::String(format!("{other:?}")),
    }
}

/// Convert a whole parameter list back into JSON values
pub fn values_to_json(values: &sea_query::Values) -> Vec<Value> {
    values.iter().map(from_sea_value).collect()
}
