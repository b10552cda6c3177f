//! Identifying keys and the WHERE clauses built from them.
//!
//! Operations that address existing rows (`get`, `delete`, `updates`) take the rows' key values
//! as a [`KeyValue`]: a flat sequence of scalars for single-column keys, a sequence of tuples for
//! composite keys. [`shape`] validates the nesting, [`filter`] turns the values into a condition.

pub mod filter;
pub mod shape;
pub mod value;

pub use filter::{build_where_by_keys, build_where_by_keys_with, KeyFilter};
pub use shape::{assert_sequence, assert_single_dimension, assert_two_dimension, ShapeError};
pub use value::{IntoKeyValue, KeyValue};
