//! Reference domain: authors and editors, each with many books.
//!
//! Matching tables:
//!
//! ```sql
//! CREATE TABLE author (
//!     id BIGSERIAL PRIMARY KEY,
//!     name TEXT NOT NULL DEFAULT '',
//!     sex TEXT NOT NULL DEFAULT '',
//!     contact_number TEXT NOT NULL DEFAULT '',
//!     deleted_at TIMESTAMPTZ
//! );
//! CREATE TABLE editor (
//!     id BIGSERIAL PRIMARY KEY,
//!     name TEXT NOT NULL DEFAULT '',
//!     sex TEXT NOT NULL DEFAULT '',
//!     deleted_at TIMESTAMPTZ
//! );
//! CREATE TABLE book (
//!     id BIGSERIAL PRIMARY KEY,
//!     title TEXT NOT NULL DEFAULT '',
//!     author_id BIGINT NOT NULL DEFAULT 0,
//!     editor_id BIGINT NOT NULL DEFAULT 0,
//!     deleted_at TIMESTAMPTZ
//! );
//! ```

mod author;
mod book;
mod editor;

pub use author::Author;
pub use book::Book;
pub use editor::Editor;
