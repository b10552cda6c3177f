//! `QueryOption`: the per-call selector of repository operations.

use crate::naming::normalize_name;
use serde::Deserialize;
use std::collections::HashMap;

/// Which keys, fields and relations an operation works on.
///
/// Built with consuming setters, or deserialized from configuration:
///
/// ```
/// use pingorm::QueryOption;
///
/// let option = QueryOption::new()
///     .select(["Name", "Sex"])
///     .preload(["Books.Editor"])
///     .update_on_conflict("Book", ["Title"]);
/// assert_eq!(option.selected_fields(), ["Name", "Sex"]);
///
/// let from_json: QueryOption =
///     serde_json::from_str(r#"{"omitted_fields": ["Books"], "hard_delete": true}"#).unwrap();
/// assert!(from_json.is_hard_delete());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryOption {
    keys: Vec<String>,
    selected_fields: Vec<String>,
    omitted_fields: Vec<String>,
    preloaded_fields: Vec<String>,
    updates_on_conflict: HashMap<String, Vec<String>>,
    hard_delete: bool,
    include_deleted: bool,
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl QueryOption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key columns identifying rows. Empty means the primary key.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = strings(keys);
        self
    }

    /// Restrict the fields (and associations) an operation reads or writes.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_fields = strings(fields);
        self
    }

    /// Exclude fields or associations; wins over `select` on overlap.
    pub fn omit<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omitted_fields = strings(fields);
        self
    }

    /// Relation paths to load with `get`, such as `Books`, `Books.Editor` or `Books.Title`.
    pub fn preload<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preloaded_fields = strings(paths);
        self
    }

    /// On a key conflict while inserting `entity`, update `fields` instead of failing.
    pub fn update_on_conflict<I, S>(mut self, entity: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updates_on_conflict
            .insert(entity.into(), strings(fields));
        self
    }

    /// Delete rows physically even when the entity supports soft delete.
    pub fn hard_delete(mut self, hard_delete: bool) -> Self {
        self.hard_delete = hard_delete;
        self
    }

    /// Make reads and updates see soft-deleted rows.
    pub fn include_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn selected_fields(&self) -> &[String] {
        &self.selected_fields
    }

    pub fn omitted_fields(&self) -> &[String] {
        &self.omitted_fields
    }

    pub fn preloaded_fields(&self) -> &[String] {
        &self.preloaded_fields
    }

    pub fn updates_on_conflict(&self) -> &HashMap<String, Vec<String>> {
        &self.updates_on_conflict
    }

    /// Conflict-update fields registered for `entity`, matched like field names.
    pub fn conflict_updates_for(&self, entity: &str) -> Option<&[String]> {
        let wanted = normalize_name(entity);
        self.updates_on_conflict
            .iter()
            .find(|(name, _)| normalize_name(name) == wanted)
            .map(|(_, fields)| fields.as_slice())
    }

    pub fn is_hard_delete(&self) -> bool {
        self.hard_delete
    }

    pub fn includes_deleted(&self) -> bool {
        self.include_deleted
    }
}
