//! # pingorm
//!
//! Generic repository operations (create, update, upsert, delete, bulk update, get with
//! preloading) for any entity implementing [`Model`], executed synchronously on `may_postgres`
//! through the [`LifeExecutor`] seam and built with SeaQuery.
//!
//! Rows are addressed by key values whose shape is checked at run time: a flat list for the
//! primary key or a single key column, a list of tuples for composite keys. See
//! [`build_where_by_keys`].

extern crate self as pingorm;

pub mod assignments;
pub mod audit;
pub mod config;
pub mod connection;
pub mod engine;
pub mod entities;
pub mod error;
pub mod executor;
pub mod keys;
pub mod metrics;
pub mod model;
pub mod naming;
pub mod option;
pub mod pool;
pub mod repository;
pub mod transaction;
pub mod value;
pub mod value_conversion;

#[cfg(test)]
mod tests_cfg;

pub use assignments::{Assignments, IntoAssignments};
pub use audit::{AuditContext, AuditSkip};
pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError};
pub use error::{ErrorKind, RepoError};
pub use executor::{LifeError, LifeExecutor, MayPostgresExecutor};
pub use keys::{build_where_by_keys, IntoKeyValue, KeyFilter, KeyValue, ShapeError};
pub use model::{Field, IntoModel, Model, Record, Relation, RelationKind, Schema};
pub use naming::{DefaultNaming, NamingStrategy};
pub use option::QueryOption;
pub use pingorm_derive::Model;
pub use pool::{ConnectionPool, PoolError, PooledConnection};
pub use repository::Repository;
pub use transaction::{IsolationLevel, Transaction, TransactionError};

#[doc(hidden)]
pub mod __private {
    pub use may_postgres::Row;
    pub use sea_query::Value;
    pub use std::any::Any;
}
