//! Statement orchestration underneath the repository.
//!
//! [`statements`] builds SQL, [`selector`] resolves select/omit rules, [`save`] writes a record
//! together with its associations and [`preload`] loads relations with one `IN` query per
//! relation level.

pub mod preload;
pub mod save;
pub mod selector;
pub mod statements;

pub use preload::PreloadTree;
pub use selector::FieldSelector;
pub use statements::ConflictRule;

use crate::model::Schema;
use crate::naming::{DefaultNaming, NamingStrategy};
use crate::option::QueryOption;

/// Conflict action for inserts into `schema`: the `updates_on_conflict` entry for the entity
/// if there is one, `default` otherwise.
pub fn conflict_rule(option: &QueryOption, schema: &Schema, default: ConflictRule) -> ConflictRule {
    match option.conflict_updates_for(schema.name) {
        Some(fields) => ConflictRule::UpdateColumns(
            fields
                .iter()
                .map(|f| DefaultNaming.column_name(schema, f))
                .collect(),
        ),
        None => default,
    }
}

/// Columns to read for `selector`: the admitted fields plus the primary key and `required`,
/// in schema order.
pub fn read_columns(selector: &FieldSelector, required: &[&str]) -> Vec<String> {
    let schema = selector.schema();
    schema
        .fields
        .iter()
        .filter(|f| {
            f.column == schema.primary_key
                || required.contains(&f.column)
                || selector.includes_field(f)
        })
        .map(|f| f.column.to_string())
        .collect()
}
