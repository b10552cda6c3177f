//! Resolution of selected and omitted names against a schema.

use crate::model::{Field, Relation, Schema};
use crate::naming::normalize_name;
use crate::option::QueryOption;

/// Select/omit rules of one `QueryOption`, applied to one entity.
///
/// A non-empty selection admits only the fields and relations it names (`*` admits
/// everything); omission removes names whether or not they were selected.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    schema: &'static Schema,
    selected: Vec<String>,
    omitted: Vec<String>,
}

impl FieldSelector {
    pub fn new(schema: &'static Schema, option: &QueryOption) -> Self {
        Self::from_names(schema, option.selected_fields(), option.omitted_fields())
    }

    /// Selector that admits everything; used for associated records.
    pub fn all(schema: &'static Schema) -> Self {
        Self::from_names::<&str>(schema, &[], &[])
    }

    pub fn from_names<S: AsRef<str>>(
        schema: &'static Schema,
        selected: &[S],
        omitted: &[S],
    ) -> Self {
        let normalize = |names: &[S]| -> Vec<String> {
            names.iter().map(|n| normalize_name(n.as_ref())).collect()
        };
        Self {
            schema,
            selected: normalize(selected),
            omitted: normalize(omitted),
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Whether an explicit selection was given.
    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    fn admits(&self, names: &[&str]) -> bool {
        let named = |list: &[String]| {
            names
                .iter()
                .any(|n| list.iter().any(|entry| *entry == normalize_name(n)))
        };
        if named(&self.omitted) {
            return false;
        }
        !self.has_selection() || self.selected.iter().any(|s| s == "*") || named(&self.selected)
    }

    pub fn includes_field(&self, field: &Field) -> bool {
        self.admits(&[field.name, field.column])
    }

    pub fn includes_relation(&self, relation: &Relation) -> bool {
        self.admits(&[relation.name])
    }

    /// Admitted fields, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = &'static Field> + '_ {
        self.schema.fields.iter().filter(|f| self.includes_field(f))
    }

    /// Admitted relations, in schema order.
    pub fn relations(&self) -> impl Iterator<Item = &'static Relation> + '_ {
        self.schema
            .relations
            .iter()
            .filter(|r| self.includes_relation(r))
    }
}
