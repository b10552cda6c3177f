//! Typed access to `sea_query::Value` and to result rows.
//!
//! [`FromValue`] is how entities accept dynamically typed values (a primary key returned by
//! `RETURNING`, a foreign key copied from a parent, an audit column). Integers widen and
//! narrow across variants when the value fits. [`RowExt`] reads a column by name and falls back
//! to the type's default when the column was not selected.

use crate::executor::LifeError;
use chrono::{DateTime, Utc};
use may_postgres::types::FromSql;
use may_postgres::Row;
use sea_query::Value;

/// Error type for value extraction failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueExtractionError {
    /// The value is null (None variant)
    #[error("Value is null")]
    NullValue,
    /// The value type doesn't match the expected type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    /// Value conversion failed (overflow)
    #[error("Conversion error: {0}")]
    ConversionError(String),
}

impl From<ValueExtractionError> for LifeError {
    fn from(err: ValueExtractionError) -> Self {
        LifeError::ParseError(err.to_string())
    }
}

/// Extraction of a Rust value from a `sea_query::Value`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError>;
}

fn mismatch(expected: &str, value: &Value) -> ValueExtractionError {
    ValueExtractionError::TypeMismatch {
        expected: expected.to_string(),
        actual: format!("{value:?}"),
    }
}

/// Any integer variant as `i128`, `Ok(None)` for an integer NULL.
fn integer(value: &Value) -> Result<Option<i128>, ValueExtractionError> {
    let n = match value {
        Value::TinyInt(v) => v.map(i128::from),
        Value::SmallInt(v) => v.map(i128::from),
        Value::Int(v) => v.map(i128::from),
        Value::BigInt(v) => v.map(i128::from),
        Value::TinyUnsigned(v) => v.map(i128::from),
        Value::SmallUnsigned(v) => v.map(i128::from),
        Value::Unsigned(v) => v.map(i128::from),
        Value::BigUnsigned(v) => v.map(i128::from),
        other => return Err(mismatch("integer", other)),
    };
    Ok(n)
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
                    let n = integer(&value)?.ok_or(ValueExtractionError::NullValue)?;
                    <$ty>::try_from(n).map_err(|_| {
                        ValueExtractionError::ConversionError(format!(
                            "{n} does not fit in {}",
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i16, i32, i64, u32, u64);

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Bool(Some(b)) => Ok(b),
            Value::Bool(None) => Err(ValueExtractionError::NullValue),
            other => Err(mismatch("Bool", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Double(Some(d)) => Ok(d),
            Value::Float(Some(f)) => Ok(f64::from(f)),
            Value::Double(None) | Value::Float(None) => Err(ValueExtractionError::NullValue),
            other => Err(mismatch("Double", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::String(Some(s)) => {
                let s: &str = &s;
                Ok(s.to_owned())
            }
            Value::Char(Some(c)) => Ok(c.to_string()),
            Value::String(None) | Value::Char(None) => Err(ValueExtractionError::NullValue),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::ChronoDateTimeUtc(Some(dt)) => {
                let dt: &DateTime<Utc> = &dt;
                Ok(*dt)
            }
            Value::ChronoDateTimeUtc(None) => Err(ValueExtractionError::NullValue),
            other => Err(mismatch("ChronoDateTimeUtc", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueExtractionError> {
        match T::from_value(value) {
            Ok(v) => Ok(Some(v)),
            Err(ValueExtractionError::NullValue) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Whether `value` is the zero value of its type: NULL, `false`, `0`, or an empty string or
/// byte string.
///
/// Zero-valued fields are skipped by updates without an explicit selection, and a zero primary
/// key marks a record that has not been inserted yet.
pub fn is_zero_value(value: &Value) -> bool {
    if let Ok(n) = integer(value) {
        return n.unwrap_or(0) == 0;
    }
    match value {
        Value::Bool(v) => !v.unwrap_or(false),
        Value::Float(v) => v.unwrap_or(0.0) == 0.0,
        Value::Double(v) => v.unwrap_or(0.0) == 0.0,
        Value::Char(v) => v.is_none(),
        Value::String(v) => v.as_ref().map_or(true, |s| {
            let s: &str = s;
            s.is_empty()
        }),
        Value::Bytes(v) => v.as_ref().map_or(true, |b| {
            let b: &[u8] = b;
            b.is_empty()
        }),
        Value::Json(v) => v.is_none(),
        Value::ChronoDate(v) => v.is_none(),
        Value::ChronoTime(v) => v.is_none(),
        Value::ChronoDateTime(v) => v.is_none(),
        Value::ChronoDateTimeUtc(v) => v.is_none(),
        Value::ChronoDateTimeWithTimeZone(v) => v.is_none(),
        _ => false,
    }
}

/// Key comparison that treats integer variants of equal magnitude as equal.
///
/// A foreign key decoded as `INT` still matches a primary key decoded as `BIGINT`.
pub fn key_eq(a: &Value, b: &Value) -> bool {
    match (integer(a), integer(b)) {
        (Ok(Some(x)), Ok(Some(y))) => x == y,
        (Ok(None), _) | (_, Ok(None)) => false,
        _ => a == b,
    }
}

/// Name-based column access on result rows.
pub trait RowExt {
    /// Whether the row carries a column with this name.
    fn has_column(&self, name: &str) -> bool;

    /// Read `name`, or `T::default()` when the column is absent or NULL.
    fn column_or_default<T>(&self, name: &str) -> Result<T, LifeError>
    where
        T: for<'a> FromSql<'a> + Default;

    /// Read a nullable column, `None` when absent.
    fn column_opt<T>(&self, name: &str) -> Result<Option<T>, LifeError>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn has_column(&self, name: &str) -> bool {
        self.columns().iter().any(|c| c.name() == name)
    }

    fn column_or_default<T>(&self, name: &str) -> Result<T, LifeError>
    where
        T: for<'a> FromSql<'a> + Default,
    {
        Ok(self.column_opt::<T>(name)?.unwrap_or_default())
    }

    fn column_opt<T>(&self, name: &str) -> Result<Option<T>, LifeError>
    where
        T: for<'a> FromSql<'a>,
    {
        if !self.has_column(name) {
            return Ok(None);
        }
        self.try_get::<_, Option<T>>(name)
            .map_err(|e| LifeError::ParseError(format!("column {name}: {e}")))
    }
}
