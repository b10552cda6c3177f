//! Pool checkout against PostgreSQL. Requires `TEST_DATABASE_URL`.

mod common;

use pingorm::{ConnectionPool, DatabaseConfig, LifeExecutor, PoolError};
use std::time::Instant;

fn pool(max_connections: usize) -> Option<ConnectionPool> {
    let url = common::database_url()?;
    let config = DatabaseConfig {
        url,
        max_connections,
        pool_timeout_seconds: 1,
        ..DatabaseConfig::default()
    };
    Some(ConnectionPool::new(config).expect("valid pool configuration"))
}

#[test]
fn checkout_beyond_capacity_times_out() {
    let Some(pool) = pool(1) else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    let held = pool.acquire().unwrap();
    let start = Instant::now();
    let err = pool.acquire().unwrap_err();
    assert!(matches!(err, PoolError::Timeout(_)));
    assert!(start.elapsed().as_millis() >= 900);

    drop(held);
    assert_eq!(pool.idle_connections(), 1);
    let reused = pool.acquire().unwrap();
    assert_eq!(pool.open_connections(), 1);
    let row = reused.query_one("SELECT 1::INT8", &[]).unwrap();
    assert_eq!(row.get::<_, i64>(0), 1);
}

#[test]
fn health_check_and_shutdown() {
    let Some(pool) = pool(2) else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };

    assert!(pool.check_health());
    assert_eq!(pool.idle_connections(), 1);

    let held = pool.acquire().unwrap();
    pool.shutdown();
    assert_eq!(pool.idle_connections(), 0);
    assert!(matches!(pool.acquire(), Err(PoolError::Closed)));

    drop(held);
    assert_eq!(pool.open_connections(), 0);
}
