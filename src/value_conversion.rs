//! Conversion of SeaQuery values into `may_postgres` parameters.
//!
//! Statements are built with `sea-query` and executed through [`LifeExecutor`], which takes
//! `&[&dyn ToSql]`. Conversion runs in two passes: every value is first moved into an owned,
//! correctly typed parameter, then a slice of references to those parameters is handed to the
//! caller's closure. The references stay valid for the duration of the closure only.
//!
//! NULLs keep the SQL type of their variant (`Value::String(None)` binds as a NULL `text`),
//! so Postgres type checking accepts them for the matching column.
//!
//! [`LifeExecutor`]: crate::executor::LifeExecutor

use crate::executor::{LifeError, LifeExecutor};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use may_postgres::types::ToSql;
use may_postgres::Row;
use sea_query::{Value, Values};

type Param = Box<dyn ToSql + Sync>;

/// Convert SeaQuery values to `may_postgres` parameters and run `f` with them.
///
/// # Errors
///
/// Returns `LifeError::Other` if a value has no Postgres representation (an unsigned
/// 64-bit value above `i64::MAX`, or a variant this crate does not bind), otherwise whatever
/// `f` returns.
pub fn with_converted_params<F, R>(values: &[Value], f: F) -> Result<R, LifeError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, LifeError>,
{
    let owned = values
        .iter()
        .map(to_param)
        .collect::<Result<Vec<Param>, LifeError>>()?;

    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
    f(&params)
}

/// Run a built statement that returns no rows.
pub(crate) fn execute_values<E>(exec: &E, sql: &str, values: &Values) -> Result<u64, LifeError>
where
    E: LifeExecutor + ?Sized,
{
    with_converted_params(&values.0, |params| exec.execute(sql, params))
}

/// Run a built statement and collect its rows.
pub(crate) fn query_values<E>(exec: &E, sql: &str, values: &Values) -> Result<Vec<Row>, LifeError>
where
    E: LifeExecutor + ?Sized,
{
    with_converted_params(&values.0, |params| exec.query_all(sql, params))
}

fn to_param(value: &Value) -> Result<Param, LifeError> {
    let param: Param = match value {
        Value::Bool(v) => Box::new(*v),
        Value::TinyInt(v) => Box::new(v.map(i16::from)),
        Value::SmallInt(v) => Box::new(*v),
        Value::Int(v) => Box::new(*v),
        Value::BigInt(v) => Box::new(*v),
        Value::TinyUnsigned(v) => Box::new(v.map(i16::from)),
        Value::SmallUnsigned(v) => Box::new(v.map(i32::from)),
        Value::Unsigned(v) => Box::new(v.map(i64::from)),
        Value::BigUnsigned(v) => {
            let converted = match v {
                Some(u) => Some(i64::try_from(*u).map_err(|_| {
                    LifeError::Other(format!(
                        "BigUnsigned value {u} exceeds i64::MAX ({}), cannot be bound",
                        i64::MAX
                    ))
                })?),
                None => None,
            };
            Box::new(converted)
        }
        Value::Float(v) => Box::new(*v),
        Value::Double(v) => Box::new(*v),
        Value::Char(v) => Box::new(v.map(|c| c.to_string())),
        Value::String(v) => Box::new(v.as_ref().map(|s| {
            let s: &str = s;
            s.to_owned()
        })),
        Value::Bytes(v) => Box::new(v.as_ref().map(|b| {
            let b: &[u8] = b;
            b.to_vec()
        })),
        Value::Json(v) => Box::new(v.as_ref().map(|j| {
            let j: &serde_json::Value = j;
            j.clone()
        })),
        Value::ChronoDate(v) => Box::new(v.as_ref().map(|d| {
            let d: &NaiveDate = d;
            *d
        })),
        Value::ChronoTime(v) => Box::new(v.as_ref().map(|t| {
            let t: &NaiveTime = t;
            *t
        })),
        Value::ChronoDateTime(v) => Box::new(v.as_ref().map(|dt| {
            let dt: &NaiveDateTime = dt;
            *dt
        })),
        Value::ChronoDateTimeUtc(v) => Box::new(v.as_ref().map(|dt| {
            let dt: &DateTime<Utc> = dt;
            *dt
        })),
        Value::ChronoDateTimeWithTimeZone(v) => Box::new(v.as_ref().map(|dt| {
            let dt: &DateTime<FixedOffset> = dt;
            *dt
        })),
        other => {
            return Err(LifeError::Other(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_every_value_in_order() {
        let values = vec![
            Value::from(7i64),
            Value::from("Henglong"),
            Value::from(true),
            Value::String(None),
        ];
        let count = with_converted_params(&values, |params| Ok(params.len()))
            .expect("conversion succeeds");
        assert_eq!(count, 4);
    }

    #[test]
    fn test_big_unsigned_overflow_is_rejected() {
        let values = vec![Value::from(u64::MAX)];
        let err = with_converted_params(&values, |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("exceeds i64::MAX"));
    }

    #[test]
    fn test_big_unsigned_in_range_is_accepted() {
        let values = vec![Value::from(42u64)];
        assert!(with_converted_params(&values, |params| Ok(params.len())).is_ok());
    }

    #[test]
    fn test_closure_error_is_returned() {
        let err = with_converted_params(&[], |_| -> Result<(), LifeError> {
            Err(LifeError::QueryError("boom".into()))
        })
        .unwrap_err();
        assert!(matches!(err, LifeError::QueryError(_)));
    }
}
