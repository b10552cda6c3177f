//! Entity capability interface.
//!
//! Every entity describes itself with a static [`Schema`] (table, columns, primary key,
//! soft-delete column, relations) and exposes its values through the object-safe [`Record`]
//! trait. The repository works on `&mut dyn Record` when it walks associations, so one code path
//! saves and preloads any entity graph. [`Model`] adds the statically typed half: row decoding
//! and access to the schema without an instance.

pub mod container;

pub use container::{collect_rows, downcast_records, first_record, IntoModel};

use crate::executor::LifeError;
use crate::naming::normalize_name;
use crate::value::FromValue;
use may_postgres::Row;
use sea_query::Value;
use std::any::Any;
use std::fmt;

/// One mapped field: its Rust-facing name and its physical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
}

impl Field {
    /// Whether `name` designates this field, by field name or column name.
    ///
    /// Matching ignores case and underscores, so `ContactNumber`, `contact_number` and
    /// `contactnumber` all designate the same field.
    pub fn matches(&self, name: &str) -> bool {
        let wanted = normalize_name(name);
        normalize_name(self.name) == wanted || normalize_name(self.column) == wanted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The target rows carry `foreign_key` pointing at this entity's `references` column.
    HasMany,
    /// Like `HasMany`, with at most one target row.
    HasOne,
    /// This entity carries `foreign_key` pointing at the target's `references` column.
    BelongsTo,
}

/// An association between two entities.
#[derive(Clone, Copy)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    pub target: fn() -> &'static Schema,
    pub foreign_key: &'static str,
    pub references: &'static str,
}

impl Relation {
    pub fn target_schema(&self) -> &'static Schema {
        (self.target)()
    }

    pub fn matches(&self, name: &str) -> bool {
        normalize_name(self.name) == normalize_name(name)
    }

    /// Whether the target rows are written after the owner (they need the owner's key).
    pub fn is_dependent(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany | RelationKind::HasOne)
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target", &self.target_schema().name)
            .field("foreign_key", &self.foreign_key)
            .field("references", &self.references)
            .finish()
    }
}

/// Static description of an entity and its table.
pub struct Schema {
    /// Entity name, the key used by `updates_on_conflict`.
    pub name: &'static str,
    pub table: &'static str,
    /// Primary key column.
    pub primary_key: &'static str,
    /// Whether the database assigns the primary key when it is left at zero.
    pub auto_increment: bool,
    pub fields: &'static [Field],
    /// Timestamp column marking soft-deleted rows.
    pub soft_delete: Option<&'static str>,
    pub relations: &'static [Relation],
    /// Row decoder for the dynamically typed paths (preloading).
    pub decode: fn(&Row) -> Result<Box<dyn Record>, LifeError>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.matches(name))
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.matches(name))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.iter().any(|f| f.column == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.column)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key == column
    }

    pub fn is_soft_delete(&self, column: &str) -> bool {
        self.soft_delete == Some(column)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .field("soft_delete", &self.soft_delete)
            .field("relations", &self.relations)
            .finish_non_exhaustive()
    }
}

/// Dynamic, object-safe access to an entity instance.
pub trait Record: Send + Sync + 'static {
    fn schema(&self) -> &'static Schema;

    /// Current value of a column, `None` for an unknown column.
    fn get(&self, column: &str) -> Option<Value>;

    /// Overwrite a column.
    ///
    /// # Errors
    ///
    /// Returns `LifeError::ParseError` when the value does not convert to the field's type,
    /// `LifeError::Other` for an unknown column.
    fn set(&mut self, column: &str, value: Value) -> Result<(), LifeError>;

    /// The loaded records of a relation (none when the relation is unknown or empty).
    fn related(&self, relation: &str) -> Vec<&dyn Record>;

    fn related_mut(&mut self, relation: &str) -> Vec<&mut dyn Record>;

    /// Replace the loaded records of a relation.
    ///
    /// # Errors
    ///
    /// Returns `LifeError::ParseError` if a record is not of the relation's target type.
    fn set_related(&mut self, relation: &str, records: Vec<Box<dyn Record>>)
        -> Result<(), LifeError>;

    fn clone_record(&self) -> Box<dyn Record>;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Value of the primary key column.
    fn primary_key(&self) -> Option<Value> {
        self.get(self.schema().primary_key)
    }
}

impl fmt::Debug for dyn Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.schema();
        let mut s = f.debug_struct(schema.name);
        for field in schema.fields {
            s.field(field.name, &self.get(field.column));
        }
        s.finish()
    }
}

/// Statically typed entity.
pub trait Model: Record + Clone + Sized {
    fn table_schema() -> &'static Schema;

    /// Decode one row. Columns missing from the row keep their default value.
    ///
    /// # Errors
    ///
    /// Returns `LifeError::ParseError` if a present column has an incompatible type.
    fn from_row(row: &Row) -> Result<Self, LifeError>;
}

/// `Schema::decode` for a concrete model.
pub fn decode_boxed<M: Model>(row: &Row) -> Result<Box<dyn Record>, LifeError> {
    Ok(Box::new(M::from_row(row)?))
}

/// Convert `value` into a field's type and store it, naming the column on failure.
///
/// # Errors
///
/// Returns `LifeError::ParseError` if the value does not convert.
pub fn assign<T: FromValue>(slot: &mut T, column: &str, value: Value) -> Result<(), LifeError> {
    *slot = T::from_value(value)
        .map_err(|e| LifeError::ParseError(format!("column {column}: {e}")))?;
    Ok(())
}

pub fn unknown_column(schema: &Schema, column: &str) -> LifeError {
    LifeError::Other(format!("{} has no column {column}", schema.name))
}

pub fn unknown_relation(schema: &Schema, relation: &str) -> LifeError {
    LifeError::Other(format!("{} has no relation {relation}", schema.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Author, Book};

    #[test]
    fn test_field_lookup_ignores_case_and_underscores() {
        let schema = Author::table_schema();
        assert_eq!(schema.field("ContactNumber").map(|f| f.column), Some("contact_number"));
        assert_eq!(schema.field("contact_number").map(|f| f.column), Some("contact_number"));
        assert_eq!(schema.field("CONTACTNUMBER").map(|f| f.column), Some("contact_number"));
        assert!(schema.field("Books").is_none());
    }

    #[test]
    fn test_relation_lookup() {
        let schema = Author::table_schema();
        let books = schema.relation("books").expect("books relation");
        assert_eq!(books.kind, RelationKind::HasMany);
        assert_eq!(books.target_schema().table, "book");
        assert!(books.is_dependent());

        let author = Book::table_schema().relation("Author").expect("author relation");
        assert_eq!(author.kind, RelationKind::BelongsTo);
        assert!(!author.is_dependent());
    }

    #[test]
    fn test_record_debug_lists_fields() {
        let author = Author {
            id: 1,
            name: "Henglong".into(),
            ..Default::default()
        };
        let record: &dyn Record = &author;
        let text = format!("{record:?}");
        assert!(text.starts_with("Author"));
        assert!(text.contains("Henglong"));
    }
}
