//! Procedural macros for pingorm
//!
//! `#[derive(Model)]` turns a plain struct into a pingorm entity: it generates the static
//! `Schema` (table, fields, primary key, soft-delete column, relations) and the `Record` and
//! `Model` implementations the repository drives.

mod attributes;
mod model;

use proc_macro::TokenStream;

/// Derive macro for `Model`
///
/// Struct attributes:
/// - `#[table_name = "..."]`: physical table, snake_case of the struct name by default.
/// - `#[entity_name = "..."]`: name used by `update_on_conflict`, the struct name by default.
///
/// Field attributes:
/// - `#[primary_key]` (exactly one field), optionally with `#[auto_increment]`.
/// - `#[column_name = "..."]`, `#[field_name = "..."]`: physical column and caller-facing name.
/// - `#[soft_delete]`: timestamp column marking deleted rows.
/// - `#[has_many(foreign_key = "...")]`, `#[has_one(...)]`, `#[belongs_to(...)]`: a relation
///   held in a `Vec<T>`, `Option<T>` or `Option<Box<T>>` field. `references` defaults to `"id"`,
///   `name` to the PascalCase field name.
/// - `#[skip]`: not mapped, left at its default when decoding.
///
/// ```ignore
/// use pingorm::Model;
///
/// #[derive(Debug, Clone, Default, Model)]
/// #[table_name = "author"]
/// pub struct Author {
///     #[primary_key]
///     #[auto_increment]
///     #[field_name = "ID"]
///     pub id: i64,
///     pub name: String,
///     #[soft_delete]
///     pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
///     #[has_many(foreign_key = "author_id")]
///     pub books: Vec<Book>,
/// }
/// ```
#[proc_macro_derive(
    Model,
    attributes(
        table_name,
        entity_name,
        primary_key,
        auto_increment,
        column_name,
        field_name,
        soft_delete,
        has_many,
        has_one,
        belongs_to,
        skip
    )
)]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}
