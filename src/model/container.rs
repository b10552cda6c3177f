//! Construction of typed results.
//!
//! Repository operations accept the model by value, by reference or boxed ([`IntoModel`]) and
//! always hand back an owned model. Query results are decoded straight into a `Vec<M>`, which is
//! empty rather than absent when nothing matched.

use super::{Model, Record};
use crate::executor::LifeError;
use may_postgres::Row;

/// Conversion of a model argument into the owned instance an operation works on.
///
/// References are cloned so the caller's value is never mutated; the populated copy is
/// returned instead.
pub trait IntoModel<M: Model> {
    fn into_model(self) -> M;
}

impl<M: Model> IntoModel<M> for M {
    fn into_model(self) -> M {
        self
    }
}

impl<M: Model> IntoModel<M> for &M {
    fn into_model(self) -> M {
        self.clone()
    }
}

impl<M: Model> IntoModel<M> for &mut M {
    fn into_model(self) -> M {
        self.clone()
    }
}

impl<M: Model> IntoModel<M> for Box<M> {
    fn into_model(self) -> M {
        *self
    }
}

/// Decode every row into `M`.
///
/// # Errors
///
/// Returns the first decoding error.
pub fn collect_rows<M: Model>(rows: &[Row]) -> Result<Vec<M>, LifeError> {
    let mut models = Vec::with_capacity(rows.len());
    for row in rows {
        models.push(M::from_row(row)?);
    }
    Ok(models)
}

/// Convert dynamically decoded records back to their concrete type.
///
/// # Errors
///
/// Returns `LifeError::ParseError` naming the offending entity if a record is not an `M`.
pub fn downcast_records<M: Model>(records: Vec<Box<dyn Record>>) -> Result<Vec<M>, LifeError> {
    records
        .into_iter()
        .map(|record| {
            let name = record.schema().name;
            record.into_any().downcast::<M>().map(|m| *m).map_err(|_| {
                LifeError::ParseError(format!(
                    "expected {} record, got {name}",
                    M::table_schema().name
                ))
            })
        })
        .collect()
}

/// The first record of a to-one relation, as its concrete type.
///
/// # Errors
///
/// Returns `LifeError::ParseError` if a record is not an `M`.
pub fn first_record<M: Model>(records: Vec<Box<dyn Record>>) -> Result<Option<M>, LifeError> {
    Ok(downcast_records::<M>(records)?.into_iter().next())
}
