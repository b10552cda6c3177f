//! WHERE clauses addressing rows by key values.
//!
//! Three cases, by the number of key columns named in the `QueryOption`:
//!
//! * none: the primary key, values one-dimensional, `"id" IN (?, ?)`;
//! * one: values one-dimensional, or two-dimensional with one value per tuple,
//!   `"col" IN (?, ?)`;
//! * several: values two-dimensional with one value per key column,
//!   `("a" = ? AND "b" = ?) OR ("a" = ? AND "b" = ?)`.
//!
//! An empty value list matches nothing (`1 = 0`). Every placeholder has exactly one argument,
//! in order.

use super::shape::{assert_single_dimension, assert_two_dimension, ShapeError};
use super::KeyValue;
use crate::model::Schema;
use crate::naming::{DefaultNaming, NamingStrategy};
use sea_query::{Alias, Condition, Expr, ExprTrait, Value};

/// A key condition in two forms: SQL text with `?` placeholders plus its arguments, and the
/// structured rows it was built from for statement building.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFilter {
    pub expr: String,
    pub args: Vec<Value>,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl KeyFilter {
    /// Physical key columns, in key order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether the filter matches no row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of `?` placeholders in `expr`, quoted identifiers excluded.
    pub fn placeholder_count(&self) -> usize {
        let mut quoted = false;
        self.expr
            .chars()
            .filter(|c| {
                if *c == '"' {
                    quoted = !quoted;
                }
                !quoted && *c == '?'
            })
            .count()
    }

    /// The filter as a SeaQuery condition with bound values.
    pub fn to_condition(&self) -> Condition {
        if self.rows.is_empty() {
            return Condition::all().add(Expr::cust("1 = 0"));
        }
        if let [column] = self.columns.as_slice() {
            let values: Vec<Value> = self.rows.iter().map(|row| row[0].clone()).collect();
            return Condition::all().add(Expr::col(Alias::new(column.clone())).is_in(values));
        }
        let mut any = Condition::any();
        for row in &self.rows {
            let mut all = Condition::all();
            for (column, value) in self.columns.iter().zip(row) {
                all = all.add(Expr::col(Alias::new(column.clone())).eq(value.clone()));
            }
            any = any.add(all);
        }
        any
    }

    pub fn into_condition(self) -> Condition {
        self.to_condition()
    }
}

/// Build the key filter for `values`, resolving `keys` with [`DefaultNaming`].
///
/// # Errors
///
/// Returns a [`ShapeError`] when `values` is not a sequence, has the wrong nesting, or a tuple's
/// length differs from the number of keys.
pub fn build_where_by_keys<S: AsRef<str>>(
    schema: &Schema,
    keys: &[S],
    values: &KeyValue,
) -> Result<KeyFilter, ShapeError> {
    build_where_by_keys_with(&DefaultNaming, schema, keys, values)
}

/// [`build_where_by_keys`] with an explicit naming strategy.
pub fn build_where_by_keys_with<S: AsRef<str>>(
    naming: &dyn NamingStrategy,
    schema: &Schema,
    keys: &[S],
    values: &KeyValue,
) -> Result<KeyFilter, ShapeError> {
    let columns: Vec<String> = if keys.is_empty() {
        vec![schema.primary_key.to_string()]
    } else {
        keys.iter()
            .map(|k| naming.column_name(schema, k.as_ref()))
            .collect()
    };

    let rows = if keys.is_empty() {
        scalar_rows(assert_single_dimension(values)?)
    } else if columns.len() == 1 {
        match assert_single_dimension(values) {
            Ok(items) => scalar_rows(items),
            Err(ShapeError::NotSingleDimension) => {
                tuple_rows(assert_two_dimension(values)?, 1)?
            }
            Err(e) => return Err(e),
        }
    } else {
        tuple_rows(assert_two_dimension(values)?, columns.len())?
    };

    let args: Vec<Value> = rows.iter().flatten().cloned().collect();
    let expr = render(&columns, rows.len());
    Ok(KeyFilter {
        expr,
        args,
        columns,
        rows,
    })
}

fn scalar_rows(items: &[KeyValue]) -> Vec<Vec<Value>> {
    items
        .iter()
        .filter_map(KeyValue::as_scalar)
        .map(|v| vec![v.clone()])
        .collect()
}

fn tuple_rows(items: &[KeyValue], width: usize) -> Result<Vec<Vec<Value>>, ShapeError> {
    items
        .iter()
        .map(|item| {
            let inner = item.as_seq().unwrap_or_default();
            if inner.len() != width {
                return Err(ShapeError::KeyLengthMismatch {
                    expected: width,
                    actual: inner.len(),
                });
            }
            Ok(inner.iter().filter_map(KeyValue::as_scalar).cloned().collect())
        })
        .collect()
}

fn quote(column: &str) -> String {
    format!("\"{}\"", column.replace('"', "\"\""))
}

fn render(columns: &[String], row_count: usize) -> String {
    if row_count == 0 {
        return "1 = 0".to_string();
    }
    if let [column] = columns {
        let placeholders = vec!["?"; row_count].join(", ");
        return format!("{} IN ({placeholders})", quote(column));
    }
    let conjunction = columns
        .iter()
        .map(|c| format!("{} = ?", quote(c)))
        .collect::<Vec<_>>()
        .join(" AND ");
    vec![format!("({conjunction})"); row_count].join(" OR ")
}
