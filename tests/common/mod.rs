//! Shared setup for database-backed tests.
//!
//! Tests connect to `TEST_DATABASE_URL` and skip themselves when it is unset. Every
//! [`TestDatabase`] works in its own schema, dropped again when the value goes away, so tests
//! can run in parallel against one database.

#![allow(dead_code)]

use pingorm::{connect, LifeError, LifeExecutor, MayPostgresExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_SCHEMA: AtomicUsize = AtomicUsize::new(0);

const TABLES: [&str; 3] = ["author", "editor", "book"];

const DDL: [&str; 3] = [
    "CREATE TABLE author (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        sex TEXT NOT NULL DEFAULT '',
        contact_number TEXT NOT NULL DEFAULT '',
        deleted_at TIMESTAMPTZ
    )",
    "CREATE TABLE editor (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        sex TEXT NOT NULL DEFAULT '',
        deleted_at TIMESTAMPTZ
    )",
    "CREATE TABLE book (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        author_id BIGINT NOT NULL DEFAULT 0,
        editor_id BIGINT NOT NULL DEFAULT 0,
        deleted_at TIMESTAMPTZ
    )",
];

/// Connection string for database-backed tests, if configured.
pub fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok().filter(|u| !u.is_empty())
}

/// Bind a [`TestDatabase`] or return from the test when no database is configured.
#[allow(unused_macros)]
macro_rules! require_db {
    () => {
        match $crate::common::TestDatabase::open() {
            Some(db) => db,
            None => {
                eprintln!("TEST_DATABASE_URL not set, skipping");
                return;
            }
        }
    };
}

pub struct TestDatabase {
    pub exec: MayPostgresExecutor,
    schema: String,
}

impl TestDatabase {
    /// Connect and create a private schema with the reference tables.
    pub fn open() -> Option<Self> {
        let url = database_url()?;
        let client = connect(&url).expect("failed to connect to TEST_DATABASE_URL");
        let schema = format!(
            "pingorm_test_{}_{}",
            std::process::id(),
            NEXT_SCHEMA.fetch_add(1, Ordering::SeqCst)
        );
        let db = Self {
            exec: MayPostgresExecutor::new(client),
            schema,
        };
        db.exec
            .execute(&format!("CREATE SCHEMA {}", db.schema), &[])
            .expect("failed to create test schema");
        db.exec
            .execute(&format!("SET search_path TO {}", db.schema), &[])
            .expect("failed to set search_path");
        for statement in DDL {
            db.exec.execute(statement, &[]).expect("failed to create table");
        }
        Some(db)
    }

    /// Run seed statements, then move every id sequence past the seeded rows.
    pub fn seed(&self, statements: &[&str]) {
        for statement in statements {
            self.exec.execute(statement, &[]).expect("failed to seed");
        }
        for table in TABLES {
            self.exec
                .execute(
                    &format!(
                        "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
                         COALESCE(MAX(id), 0) + 1, false) FROM {table}"
                    ),
                    &[],
                )
                .expect("failed to sync sequence");
        }
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.exec
            .query_one(sql, &[])
            .map(|row| row.get::<_, i64>(0))
            .expect("count query failed")
    }

    /// `(id, title, author_id, editor_id)` of every book, deleted ones included.
    pub fn books(&self) -> Result<Vec<(i64, String, i64, i64)>, LifeError> {
        let rows = self
            .exec
            .query_all("SELECT id, title, author_id, editor_id FROM book ORDER BY id", &[])?;
        Ok(rows
            .iter()
            .map(|r| (r.get(0), r.get(1), r.get(2), r.get(3)))
            .collect())
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let drop_schema = format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema);
        if let Err(e) = self.exec.execute(&drop_schema, &[]) {
            eprintln!("failed to drop {}: {e}", self.schema);
        }
    }
}
