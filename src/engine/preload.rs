//! Select-in loading of relations.
//!
//! Preload paths such as `Books`, `Books.Editor` or `Books.Title` are parsed into a
//! [`PreloadTree`]. Each level of the tree costs one query: the owner-side key values of all
//! parents are collected, deduplicated, and fetched with `WHERE <join column> IN (…)`; the
//! fetched records are then grouped back onto their parents.

use super::read_columns;
use super::selector::FieldSelector;
use super::statements::select_statement;
use crate::error::RepoError;
use crate::executor::LifeExecutor;
use crate::model::{Record, Relation, RelationKind, Schema};
use crate::value::{is_zero_value, key_eq};
use crate::value_conversion::query_values;
use sea_query::{Alias, Condition, Expr, ExprTrait, Value};

/// Relations to load, nested by path.
#[derive(Debug, Clone, Default)]
pub struct PreloadTree {
    children: Vec<PreloadNode>,
}

#[derive(Debug, Clone)]
struct PreloadNode {
    relation: &'static Relation,
    /// Field restriction on the target; empty loads every column.
    fields: Vec<String>,
    tree: PreloadTree,
}

impl PreloadTree {
    /// Parse dotted preload paths relative to `schema`.
    ///
    /// Every segment must name a relation, except the last segment of a path with at least
    /// two segments, which may name a field of the relation's target instead and then
    /// restricts the columns loaded for it.
    ///
    /// # Errors
    ///
    /// `RepoError::Misuse` for a segment that names neither.
    pub fn parse<S: AsRef<str>>(schema: &'static Schema, paths: &[S]) -> Result<Self, RepoError> {
        let mut tree = PreloadTree::default();
        for path in paths {
            let segments: Vec<&str> = path
                .as_ref()
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            tree.insert(schema, &segments, path.as_ref())?;
        }
        Ok(tree)
    }

    fn insert(
        &mut self,
        schema: &'static Schema,
        segments: &[&str],
        path: &str,
    ) -> Result<(), RepoError> {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(());
        };
        let relation = schema.relation(head).ok_or_else(|| {
            RepoError::misuse(format!("preload {path}: {} has no relation {head}", schema.name))
        })?;
        let index = match self.children.iter().position(|n| std::ptr::eq(n.relation, relation)) {
            Some(index) => index,
            None => {
                self.children.push(PreloadNode {
                    relation,
                    fields: Vec::new(),
                    tree: PreloadTree::default(),
                });
                self.children.len() - 1
            }
        };
        let node = &mut self.children[index];
        let target = relation.target_schema();

        if let [last] = rest {
            if target.relation(last).is_none() {
                if let Some(field) = target.field(last) {
                    if !node.fields.iter().any(|f| field.matches(f)) {
                        node.fields.push(field.name.to_string());
                    }
                    return Ok(());
                }
            }
        }
        node.tree.insert(target, rest, path)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Columns of `schema` the parents must have been read with for this tree to join.
    pub fn required_columns(&self, schema: &Schema) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = Vec::new();
        for node in &self.children {
            let (owner, _) = join_columns(node.relation);
            if schema.has_column(owner) && !columns.contains(&owner) {
                columns.push(owner);
            }
        }
        columns
    }
}

impl PreloadNode {
    fn columns(&self) -> Vec<String> {
        let target = self.relation.target_schema();
        if self.fields.is_empty() {
            return target.columns().map(str::to_string).collect();
        }
        let (_, joined) = join_columns(self.relation);
        let mut required = self.tree.required_columns(target);
        required.push(joined);
        let selector = FieldSelector::from_names(target, &self.fields, &[]);
        read_columns(&selector, &required)
    }
}

/// (owner column, target column) a relation joins on.
fn join_columns(relation: &Relation) -> (&'static str, &'static str) {
    match relation.kind {
        RelationKind::HasMany | RelationKind::HasOne => (relation.references, relation.foreign_key),
        RelationKind::BelongsTo => (relation.foreign_key, relation.references),
    }
}

/// Load every relation in `tree` into `parents`, recursing into nested paths.
///
/// Parents whose join key is zero get an empty relation. Soft-deleted related rows are
/// skipped unless `include_deleted`.
///
/// # Errors
///
/// Returns the first storage or decoding error.
pub fn preload<E>(
    exec: &E,
    parents: &mut [&mut dyn Record],
    tree: &PreloadTree,
    include_deleted: bool,
) -> Result<(), RepoError>
where
    E: LifeExecutor + ?Sized,
{
    for node in &tree.children {
        let relation = node.relation;
        let target = relation.target_schema();
        let (owner_column, target_column) = join_columns(relation);

        let mut keys: Vec<Value> = Vec::new();
        for parent in parents.iter() {
            if let Some(key) = parent.get(owner_column) {
                if !is_zero_value(&key) && !keys.iter().any(|k| key_eq(k, &key)) {
                    keys.push(key);
                }
            }
        }

        let mut loaded: Vec<Box<dyn Record>> = Vec::new();
        if !keys.is_empty() {
            let filter = Condition::all().add(Expr::col(Alias::new(target_column)).is_in(keys));
            let (sql, values) = select_statement(target, &node.columns(), filter, include_deleted);
            let rows = query_values(exec, &sql, &values)?;
            log::debug!(
                "preload {}: {} rows for {} parents",
                relation.name,
                rows.len(),
                parents.len()
            );
            loaded = rows
                .iter()
                .map(|row| (target.decode)(row))
                .collect::<Result<_, _>>()?;
        }

        if !node.tree.is_empty() && !loaded.is_empty() {
            let mut nested: Vec<&mut dyn Record> = Vec::with_capacity(loaded.len());
            for record in loaded.iter_mut() {
                nested.push(&mut **record);
            }
            preload(exec, &mut nested, &node.tree, include_deleted)?;
        }

        for parent in parents.iter_mut() {
            let mut matched: Vec<Box<dyn Record>> = match parent.get(owner_column) {
                Some(key) if !is_zero_value(&key) => loaded
                    .iter()
                    .filter(|r| r.get(target_column).is_some_and(|v| key_eq(&v, &key)))
                    .map(|r| r.clone_record())
                    .collect(),
                _ => Vec::new(),
            };
            if relation.kind != RelationKind::HasMany {
                matched.truncate(1);
            }
            parent.set_related(relation.name, matched)?;
        }
    }
    Ok(())
}
