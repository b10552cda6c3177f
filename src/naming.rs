//! Name resolution between caller-facing names and physical tables and columns.
//!
//! Callers name fields the way the entity does (`ContactNumber`), the way the table does
//! (`contact_number`) or anything in between; [`normalize_name`] folds all of these to one form.

use crate::model::Schema;
use convert_case::{Case, Casing};

/// Lower-case `name` and drop underscores.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Maps caller-facing field names onto column names.
pub trait NamingStrategy: Send + Sync {
    fn column_name(&self, schema: &Schema, field: &str) -> String;
}

/// Columns resolved against the schema, unknown names snake_cased.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNaming;

impl NamingStrategy for DefaultNaming {
    fn column_name(&self, schema: &Schema, field: &str) -> String {
        match schema.field(field) {
            Some(f) => f.column.to_string(),
            None => field.to_case(Case::Snake),
        }
    }
}
