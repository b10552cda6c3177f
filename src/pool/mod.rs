//! Bounded connection pool over `may_postgres` clients.
//!
//! Idle connections wait in a `crossbeam-channel` queue. A checkout takes one from the queue,
//! opens a new one while the pool is below `max_connections`, or waits up to the configured
//! timeout for one to be returned. Reused connections are checked with `SELECT 1` and replaced
//! when they fail the check or have outlived the idle or lifetime bounds.

pub mod config;
pub mod manager;

pub use config::DatabaseConfig;
pub use manager::{ConnectionPool, PoolError, PooledConnection};
