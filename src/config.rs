//! Settings loading.
//!
//! [`DatabaseConfig::load`] reads `config/config.toml` when present, then applies
//! `PINGORM__DATABASE__*` environment overrides, for example
//! `PINGORM__DATABASE__MAX_CONNECTIONS=20`.

pub use crate::pool::config::DatabaseConfig;
