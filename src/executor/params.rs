//! Conversion of sea-query parameter values into `may_postgres` parameters.
//!
//! Criteria values come from JSON, so an integer arrives as `BigInt` even
//! when the column is `INT4`, and a UUID or timestamp arrives as a string.
//! [`Param`] accepts every Postgres type and converts at bind time, once the
//! target type of the placeholder is known.

use std::error::Error;
use std::str::FromStr;

use bytes::BytesMut;
use may_postgres::types::{IsNull, ToSql, Type};
use rust_decimal::Decimal;
use sea_query::{Value, Values};

use crate::executor::ExecutorError;

type BoxError = Box<dyn Error + Sync + Send>;

#[derive(Debug)]
enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Decimal(Decimal),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    NaiveDateTime(chrono::NaiveDateTime),
    Date(chrono::NaiveDate),
}

impl ToSql for Param {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Param::Null => Ok(IsNull::Yes),
            Param::Bool(b) => b.to_sql(ty, out),
            Param::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => i.to_string().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Param::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Param::Text(s) => match *ty {
                Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
                Type::NUMERIC => Decimal::from_str(s)?.to_sql(ty, out),
                Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(s)?
                    .with_timezone(&chrono::Utc)
                    .to_sql(ty, out),
                Type::TIMESTAMP => s.parse::<chrono::NaiveDateTime>()?.to_sql(ty, out),
                Type::DATE => s.parse::<chrono::NaiveDate>()?.to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::String(s.clone()).to_sql(ty, out),
                _ => s.to_sql(ty, out),
            },
            Param::Bytes(b) => b.to_sql(ty, out),
            Param::Json(j) => j.to_sql(ty, out),
            Param::Decimal(d) => d.to_sql(ty, out),
            Param::Uuid(u) => u.to_sql(ty, out),
            Param::DateTime(t) => t.to_sql(ty, out),
            Param::NaiveDateTime(t) => t.to_sql(ty, out),
            Param::Date(d) => d.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    may_postgres::types::to_sql_checked!();
}

fn to_param(value: &Value) -> Result<Param, ExecutorError> {
    let param = match value {
        Value::Bool(Some(b)) => Param::Bool(*b),
        Value::TinyInt(Some(i)) => Param::Int(i64::from(*i)),
        Value::SmallInt(Some(i)) => Param::Int(i64::from(*i)),
        Value::Int(Some(i)) => Param::Int(i64::from(*i)),
        Value::BigInt(Some(i)) => Param::Int(*i),
        Value::TinyUnsigned(Some(u)) => Param::Int(i64::from(*u)),
        Value::SmallUnsigned(Some(u)) => Param::Int(i64::from(*u)),
        Value::Unsigned(Some(u)) => Param::Int(i64::from(*u)),
        Value::BigUnsigned(Some(u)) => Param::Int(i64::try_from(*u).map_err(|_| {
            ExecutorError::Other(format!(
                "BigUnsigned value {u} exceeds i64::MAX ({}), cannot be safely cast to i64",
                i64::MAX
            ))
        })?),
        Value::Float(Some(f)) => Param::Float(f64::from(*f)),
        Value::Double(Some(d)) => Param::Float(*d),
        Value::String(Some(s)) => Param::Text(s.to_string()),
        Value::Char(Some(c)) => Param::Text(c.to_string()),
        Value::Bytes(Some(b)) => Param::Bytes(b.to_vec()),
        Value::Json(Some(j)) => Param::Json(serde_json::Value::clone(j)),
        Value::Decimal(Some(d)) => Param::Decimal(Decimal::clone(d)),
        Value::Uuid(Some(u)) => Param::Uuid(uuid::Uuid::clone(u)),
        Value::ChronoDateTimeUtc(Some(t)) => Param::DateTime(chrono::DateTime::clone(t)),
        Value::ChronoDateTime(Some(t)) => Param::NaiveDateTime(chrono::NaiveDateTime::clone(t)),
        Value::ChronoDate(Some(d)) => Param::Date(chrono::NaiveDate::clone(d)),
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::String(None)
        | Value::Char(None)
        | Value::Bytes(None)
        | Value::Json(None)
        | Value::Decimal(None)
        | Value::Uuid(None)
        | Value::ChronoDateTimeUtc(None)
        | Value::ChronoDateTime(None)
        | Value::ChronoDate(None) => Param::Null,
        other => {
            return Err(ExecutorError::Other(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}

/// Convert sea-query values to `may_postgres` parameters and run `f` with
/// them.
///
/// # Errors
///
/// Returns `ExecutorError::Other` if an unsupported value type is
/// encountered, otherwise whatever `f` returns.
pub fn with_converted_params<F, R>(values: &Values, f: F) -> Result<R, ExecutorError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, ExecutorError>,
{
    let owned = values.iter().map(to_param).collect::<Result<Vec<_>, _>>()?;
    let params = owned.iter().map(|p| p as &dyn ToSql).collect::<Vec<_>>();
    f(&params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(param: &Param, ty: &Type) -> Result<(IsNull, Vec<u8>), BoxError> {
        let mut out = BytesMut::new();
        let is_null = param.to_sql_checked(ty, &mut out)?;
        Ok((is_null, out.to_vec()))
    }

    #[test]
    fn test_integers_narrow_to_column_type() {
        let (_, bytes) = bind(&Param::Int(7), &Type::INT4).expect("fits in int4");
        assert_eq!(bytes, 7i32.to_be_bytes().to_vec());
        let (_, bytes) = bind(&Param::Int(7), &Type::INT8).expect("int8");
        assert_eq!(bytes, 7i64.to_be_bytes().to_vec());
        assert!(bind(&Param::Int(i64::MAX), &Type::INT2).is_err(), "overflow must not truncate");
    }

    #[test]
    fn test_null_binds_to_any_type() {
        for ty in [Type::INT4, Type::TEXT, Type::UUID, Type::JSONB] {
            let (is_null, _) = bind(&Param::Null, &ty).expect("null accepted");
            assert!(matches!(is_null, IsNull::Yes));
        }
    }

    #[test]
    fn test_text_parses_into_typed_columns() {
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let (_, bytes) = bind(&Param::Text(id.to_string()), &Type::UUID).expect("valid uuid");
        assert_eq!(bytes.len(), 16);
        assert!(bind(&Param::Text("nope".to_string()), &Type::UUID).is_err());
    }

    #[test]
    fn test_with_converted_params_keeps_order() {
        let values = Values(vec![Value::BigInt(Some(1)), Value::String(None), Value::Bool(Some(true))]);
        let count = with_converted_params(&values, |params| Ok(params.len())).expect("supported values");
        assert_eq!(count, 3);

        let too_big = Values(vec![Value::BigUnsigned(Some(u64::MAX))]);
        assert!(matches!(
            with_converted_params(&too_big, |_| Ok(())),
            Err(ExecutorError::Other(_))
        ));
    }
}
