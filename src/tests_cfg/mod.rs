//! Fixtures for unit tests: an executor that records statements instead of running them, and
//! an entity carrying the audit columns.

use crate::executor::{LifeError, LifeExecutor};
use crate::Model;
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub sql: String,
    pub param_count: usize,
}

/// Records every statement. Queries return no rows; `execute` reports `affected` rows.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<Recorded>>,
    affected: u64,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<Recorded> {
        self.statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn record(&self, query: &str, params: &[&dyn ToSql]) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(Recorded {
                sql: query.to_string(),
                param_count: params.len(),
            });
        }
    }
}

impl LifeExecutor for RecordingExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.record(query, params);
        Ok(self.affected)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.record(query, params);
        Err(LifeError::QueryError("recording executor returns no rows".to_string()))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.record(query, params);
        Ok(Vec::new())
    }
}

/// An audited entity without relations or soft delete.
#[derive(Debug, Clone, Default, PartialEq, Model)]
#[table_name = "note"]
pub struct Note {
    #[primary_key]
    #[auto_increment]
    #[field_name = "ID"]
    pub id: i64,
    pub body: String,
    pub created_by: String,
    #[field_name = "OrgID"]
    pub org_id: String,
    pub updated_by: String,
}
