use super::config::DatabaseConfig;
use crate::connection::{check_connection_health, connect, ConnectionError};
use crate::executor::{instrumented, LifeError, LifeExecutor};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use may_postgres::types::ToSql;
use may_postgres::{Client, Row};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Upper bound on one blocking wait, so waiters notice `shutdown`.
const WAIT_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),
    #[error("connection pool is closed")]
    Closed,
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

struct Slot {
    client: Client,
    opened: Instant,
    idle_since: Instant,
}

struct PoolInner {
    config: DatabaseConfig,
    idle_tx: Sender<Slot>,
    idle_rx: Receiver<Slot>,
    open: AtomicUsize,
    closed: AtomicBool,
}

impl PoolInner {
    /// Claim capacity for one more connection.
    fn reserve(&self) -> bool {
        self.open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < self.config.max_connections).then_some(open + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }

    /// Hand back a reused slot, or close it when it is stale or fails the health check.
    fn revalidate(&self, slot: Slot) -> Option<Slot> {
        let stale = slot.opened.elapsed() >= self.config.max_lifetime()
            || slot.idle_since.elapsed() >= self.config.max_idle();
        if stale {
            log::debug!("closing stale pooled connection");
        } else if check_connection_health(&slot.client) {
            return Some(slot);
        }
        self.release();
        None
    }

    fn drain(&self) {
        while let Ok(slot) = self.idle_rx.try_recv() {
            drop(slot);
            self.release();
        }
    }
}

/// A bounded pool of PostgreSQL connections; cheap to clone and share between coroutines.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("max_connections", &self.inner.config.max_connections)
            .field("open", &self.open_connections())
            .field("idle", &self.idle_connections())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionPool {
    /// Create a pool. Connections are opened on demand.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` when `max_connections` is zero.
    pub fn new(config: DatabaseConfig) -> Result<Self, PoolError> {
        if config.max_connections == 0 {
            return Err(PoolError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        let (idle_tx, idle_rx) = bounded(config.max_connections);
        log::info!(
            "connection pool ready: max_connections={}, timeout={}s",
            config.max_connections,
            config.pool_timeout_seconds
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                idle_tx,
                idle_rx,
                open: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Create a pool from [`DatabaseConfig::load`].
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` when the configuration cannot be loaded or is invalid.
    pub fn from_config() -> Result<Self, PoolError> {
        let config = DatabaseConfig::load().map_err(|e| PoolError::InvalidConfig(e.to_string()))?;
        Self::new(config)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    /// Check out a connection, waiting up to `pool_timeout_seconds`.
    ///
    /// # Errors
    ///
    /// `PoolError::Timeout` when none frees up in time, `PoolError::Closed` after
    /// [`shutdown`](Self::shutdown), `PoolError::Connection` when opening a new one fails.
    pub fn acquire(&self) -> Result<PooledConnection, PoolError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::acquire_connection_span().entered();

        let start = Instant::now();
        let timeout = self.inner.config.pool_timeout();
        loop {
            if self.is_closed() {
                return Err(PoolError::Closed);
            }
            if let Ok(slot) = self.inner.idle_rx.try_recv() {
                if let Some(slot) = self.inner.revalidate(slot) {
                    return Ok(self.checkout(slot, start));
                }
                continue;
            }
            if self.inner.reserve() {
                return match connect(&self.inner.config.url) {
                    Ok(client) => {
                        let now = Instant::now();
                        Ok(self.checkout(
                            Slot {
                                client,
                                opened: now,
                                idle_since: now,
                            },
                            start,
                        ))
                    }
                    Err(e) => {
                        self.inner.release();
                        Err(PoolError::Connection(e))
                    }
                };
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                log::warn!("connection pool exhausted after {timeout:?}");
                return Err(PoolError::Timeout(timeout));
            }
            match self.inner.idle_rx.recv_timeout(remaining.min(WAIT_SLICE)) {
                Ok(slot) => {
                    if let Some(slot) = self.inner.revalidate(slot) {
                        return Ok(self.checkout(slot, start));
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(PoolError::Closed),
            }
        }
    }

    fn checkout(&self, slot: Slot, start: Instant) -> PooledConnection {
        let waited = start.elapsed();
        log::debug!("checked out connection after {waited:?}");
        #[cfg(feature = "metrics")]
        {
            METRICS.record_connection_wait(waited);
            METRICS.record_checkout();
        }
        PooledConnection {
            slot: Some(slot),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Whether a connection can be checked out and answers `SELECT 1`.
    pub fn check_health(&self) -> bool {
        match self.acquire() {
            Ok(conn) => conn.check_health(),
            Err(e) => {
                log::warn!("pool health check failed: {e}");
                false
            }
        }
    }

    /// Close idle connections and refuse further checkouts. Connections still checked out are
    /// closed when they are dropped.
    pub fn shutdown(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            log::info!("shutting down connection pool");
        }
        self.inner.drain();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Connections currently open, idle or checked out.
    pub fn open_connections(&self) -> usize {
        self.inner.open.load(Ordering::Acquire)
    }

    pub fn idle_connections(&self) -> usize {
        self.inner.idle_rx.len()
    }
}

/// A checked-out connection. Runs statements like any executor and goes back to the pool when
/// dropped.
pub struct PooledConnection {
    slot: Option<Slot>,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    fn slot(&self) -> Result<&Slot, LifeError> {
        self.slot
            .as_ref()
            .ok_or_else(|| LifeError::Other("pooled connection already released".to_string()))
    }

    /// The underlying client, `None` only while the connection is being returned.
    pub fn client(&self) -> Option<&Client> {
        self.slot.as_ref().map(|s| &s.client)
    }

    pub fn check_health(&self) -> bool {
        self.client().is_some_and(check_connection_health)
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("age", &self.slot.as_ref().map(|s| s.opened.elapsed()))
            .finish()
    }
}

impl LifeExecutor for PooledConnection {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        let client = &self.slot()?.client;
        instrumented(query, || client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        let client = &self.slot()?.client;
        instrumented(query, || client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        let client = &self.slot()?.client;
        instrumented(query, || client.query(query, params))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(mut slot) = self.slot.take() else {
            return;
        };
        #[cfg(feature = "metrics")]
        METRICS.record_checkin();
        if self.pool.closed.load(Ordering::Acquire) {
            drop(slot);
            self.pool.release();
            return;
        }
        slot.idle_since = Instant::now();
        if self.pool.idle_tx.try_send(slot).is_err() {
            self.pool.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str, max_connections: usize) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string(),
            max_connections,
            pool_timeout_seconds: 1,
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = ConnectionPool::new(config("postgres://localhost/db", 0)).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
    }

    #[test]
    fn test_connect_failure_releases_capacity() {
        let pool = ConnectionPool::new(config("not a connection string", 1)).unwrap();
        let err = pool.acquire().unwrap_err();
        assert!(matches!(
            err,
            PoolError::Connection(ConnectionError::InvalidConnectionString(_))
        ));
        assert_eq!(pool.open_connections(), 0);
        assert!(!pool.check_health());
    }

    #[test]
    fn test_acquire_after_shutdown_fails() {
        let pool = ConnectionPool::new(config("postgres://localhost/db", 2)).unwrap();
        pool.shutdown();
        assert!(pool.is_closed());
        assert!(matches!(pool.acquire(), Err(PoolError::Closed)));
    }

    #[test]
    fn test_reserve_respects_capacity() {
        let pool = ConnectionPool::new(config("postgres://localhost/db", 2)).unwrap();
        assert!(pool.inner.reserve());
        assert!(pool.inner.reserve());
        assert!(!pool.inner.reserve());
        pool.inner.release();
        assert_eq!(pool.open_connections(), 1);
    }
}
