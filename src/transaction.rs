//! Transactions over a single `may_postgres` client.
//!
//! A [`Transaction`] implements [`LifeExecutor`], so a whole repository operation (a create
//! that cascades into its associations, say) can be made atomic by running it on one.
//! [`Transaction::savepoint`] opens an inner scope that can be undone on its own.
//! Dropping a scope that was neither committed nor rolled back undoes it.

use crate::executor::{instrumented, LifeError, LifeExecutor};
use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Isolation level requested when the transaction starts.
///
/// PostgreSQL's default, `READ COMMITTED`, is what a plain `BEGIN` gives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn begin_statement(self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "BEGIN",
            IsolationLevel::RepeatableRead => "BEGIN ISOLATION LEVEL REPEATABLE READ",
            IsolationLevel::Serializable => "BEGIN ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] PostgresError),
    /// Commit or rollback was already issued for this scope.
    #[error("transaction already finished")]
    Finished,
}

impl From<TransactionError> for LifeError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Postgres(e) => LifeError::PostgresError(e),
            other => LifeError::Other(other.to_string()),
        }
    }
}

/// Which scope a [`Transaction`] value closes: the outer `BEGIN` or a numbered savepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Outer,
    Savepoint(u32),
}

impl Scope {
    fn depth(self) -> u32 {
        match self {
            Scope::Outer => 0,
            Scope::Savepoint(depth) => depth,
        }
    }

    fn open_statement(self) -> Option<String> {
        match self {
            Scope::Outer => None,
            Scope::Savepoint(depth) => Some(format!("SAVEPOINT pingorm_sp_{depth}")),
        }
    }

    fn close_statement(self, commit: bool) -> String {
        match (self, commit) {
            (Scope::Outer, true) => "COMMIT".to_string(),
            (Scope::Outer, false) => "ROLLBACK".to_string(),
            (Scope::Savepoint(depth), true) => format!("RELEASE SAVEPOINT pingorm_sp_{depth}"),
            (Scope::Savepoint(depth), false) => {
                format!("ROLLBACK TO SAVEPOINT pingorm_sp_{depth}")
            }
        }
    }
}

/// An open transaction (or savepoint) on one client.
///
/// ```no_run
/// use pingorm::entities::Author;
/// use pingorm::{connect, MayPostgresExecutor, QueryOption, Repository};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let exec = MayPostgresExecutor::new(connect("postgresql://localhost/pingorm")?);
/// let tx = exec.begin()?;
/// let repo = Repository::<Author>::new();
/// repo.create(&tx, Author::default(), &QueryOption::new())?;
///
/// let inner = tx.savepoint()?;
/// repo.delete(&inner, vec![1i64], &QueryOption::new())?;
/// inner.rollback()?;
///
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction {
    client: Client,
    scope: Scope,
    finished: bool,
}

impl Transaction {
    pub(crate) fn begin(client: Client, level: IsolationLevel) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        client.execute(level.begin_statement(), &[])?;
        log::debug!("transaction started ({level:?})");
        Ok(Self {
            client,
            scope: Scope::Outer,
            finished: false,
        })
    }

    /// Open a savepoint inside this transaction.
    ///
    /// Statements run on the returned value become part of this transaction once it is
    /// committed, or are undone alone when it is rolled back or dropped.
    pub fn savepoint(&self) -> Result<Transaction, TransactionError> {
        if self.finished {
            return Err(TransactionError::Finished);
        }
        let scope = Scope::Savepoint(self.scope.depth() + 1);
        if let Some(sql) = scope.open_statement() {
            self.client.execute(sql.as_str(), &[])?;
        }
        Ok(Transaction {
            client: self.client.clone(),
            scope,
            finished: false,
        })
    }

    /// `COMMIT`, or `RELEASE SAVEPOINT` for a savepoint.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();
        self.finish(true)
    }

    /// `ROLLBACK`, or `ROLLBACK TO SAVEPOINT` for a savepoint.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();
        self.finish(false)
    }

    fn finish(&mut self, commit: bool) -> Result<(), TransactionError> {
        if self.finished {
            return Err(TransactionError::Finished);
        }
        // Marked first so a failed COMMIT is not followed by a second ROLLBACK from Drop.
        self.finished = true;
        let sql = self.scope.close_statement(commit);
        self.client.execute(sql.as_str(), &[])?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), LifeError> {
        if self.finished {
            return Err(TransactionError::Finished.into());
        }
        Ok(())
    }

    /// Savepoint nesting level, 0 for the outer transaction.
    pub fn depth(&self) -> u32 {
        self.scope.depth()
    }
}

impl LifeExecutor for Transaction {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.ensure_open()?;
        instrumented(query, || self.client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.ensure_open()?;
        instrumented(query, || self.client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.ensure_open()?;
        instrumented(query, || self.client.query(query, params))
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::debug!("transaction dropped unfinished at depth {}", self.depth());
        if let Err(e) = self.finish(false) {
            log::warn!("implicit rollback of dropped transaction failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_statement() {
        assert_eq!(IsolationLevel::default().begin_statement(), "BEGIN");
        assert_eq!(
            IsolationLevel::Serializable.begin_statement(),
            "BEGIN ISOLATION LEVEL SERIALIZABLE"
        );
        assert_eq!(
            IsolationLevel::RepeatableRead.begin_statement(),
            "BEGIN ISOLATION LEVEL REPEATABLE READ"
        );
    }

    #[test]
    fn test_outer_scope_statements() {
        assert_eq!(Scope::Outer.open_statement(), None);
        assert_eq!(Scope::Outer.close_statement(true), "COMMIT");
        assert_eq!(Scope::Outer.close_statement(false), "ROLLBACK");
        assert_eq!(Scope::Outer.depth(), 0);
    }

    #[test]
    fn test_savepoint_statements_are_numbered_by_depth() {
        let scope = Scope::Savepoint(2);
        assert_eq!(scope.open_statement().as_deref(), Some("SAVEPOINT pingorm_sp_2"));
        assert_eq!(scope.close_statement(true), "RELEASE SAVEPOINT pingorm_sp_2");
        assert_eq!(scope.close_statement(false), "ROLLBACK TO SAVEPOINT pingorm_sp_2");
    }

    #[test]
    fn test_finished_converts_to_life_error() {
        let err: LifeError = TransactionError::Finished.into();
        assert!(matches!(err, LifeError::Other(ref msg) if msg == "transaction already finished"));
    }
}
