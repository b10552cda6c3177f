//! Writing a record together with its associations.
//!
//! Belongs-to parents are written first (`ON CONFLICT DO NOTHING` unless overridden) and their
//! key copied into the record. Has-many and has-one children are written after the record, with
//! the record's key copied into their foreign key, as upserts that by default only move the
//! foreign key (`ON CONFLICT (pk) DO UPDATE SET fk`). Associations take part only when the
//! selector admits them.

use super::selector::FieldSelector;
use super::statements::{insert_statement, update_statement, ConflictRule};
use super::conflict_rule;
use crate::audit::AuditContext;
use crate::error::RepoError;
use crate::executor::{LifeError, LifeExecutor};
use crate::model::{Record, RelationKind};
use crate::option::QueryOption;
use crate::value::is_zero_value;
use crate::value_conversion::{execute_values, query_values};
use may_postgres::types::Type;
use may_postgres::Row;
use sea_query::{Alias, Condition, Expr, ExprTrait, Value};

/// Per-operation settings shared by every record in the graph being saved.
#[derive(Debug, Clone, Copy)]
pub struct SaveContext<'a> {
    pub option: &'a QueryOption,
    pub audit: Option<&'a AuditContext>,
}

/// Insert `record` under `conflict`, then its admitted associations.
///
/// The primary key returned by the database is written back into the record. A conflicting
/// row skipped by `DO NOTHING` returns no key and leaves the record as it was.
///
/// # Errors
///
/// Returns the first storage error; statements already run are not undone.
pub fn insert_record<E>(
    exec: &E,
    record: &mut dyn Record,
    selector: &FieldSelector,
    conflict: &ConflictRule,
    ctx: SaveContext<'_>,
) -> Result<(), RepoError>
where
    E: LifeExecutor + ?Sized,
{
    save_parents(exec, record, selector, ctx)?;

    let schema = record.schema();
    apply_audit(record, ctx.audit.map(|a| a.on_insert(schema)).unwrap_or_default())?;
    let (columns, values) = insert_columns(&*record, selector, ctx.audit)?;
    let (sql, params) = insert_statement(schema, &columns, vec![values], conflict)?;
    let rows = query_values(exec, &sql, &params)?;
    if let Some(row) = rows.first() {
        record.set(schema.primary_key, returned_key(row)?)?;
    }

    save_children(exec, record, selector, ctx)
}

/// Update the record's row by primary key, then save its admitted associations.
///
/// Returns the number of rows the update touched; zero when no column qualified.
///
/// # Errors
///
/// `RepoError::Misuse` when the record has no primary key, otherwise the first storage error.
pub fn update_record<E>(
    exec: &E,
    record: &mut dyn Record,
    selector: &FieldSelector,
    ctx: SaveContext<'_>,
) -> Result<u64, RepoError>
where
    E: LifeExecutor + ?Sized,
{
    let schema = record.schema();
    let key = record
        .primary_key()
        .filter(|k| !is_zero_value(k))
        .ok_or_else(|| {
            RepoError::misuse(format!("update of {} requires a primary key", schema.name))
        })?;

    save_parents(exec, record, selector, ctx)?;

    let mut assignments = model_assignments(&*record, selector);
    let mut affected = 0;
    if !assignments.is_empty() {
        let audited = ctx.audit.map(|a| a.on_update(schema)).unwrap_or_default();
        apply_audit(record, audited.clone())?;
        merge(&mut assignments, audited);
        let filter = Condition::all().add(Expr::col(Alias::new(schema.primary_key)).eq(key));
        let (sql, params) =
            update_statement(schema, assignments, filter, ctx.option.includes_deleted());
        affected = execute_values(exec, &sql, &params)?;
    }

    save_children(exec, record, selector, ctx)?;
    Ok(affected)
}

/// Column/value pairs an update of `record` writes.
///
/// With an explicit selection every admitted column is written, zero or not; without one only
/// non-zero columns are. The primary key and the soft-delete column are never written.
pub fn model_assignments(record: &dyn Record, selector: &FieldSelector) -> Vec<(String, Value)> {
    let schema = selector.schema();
    selector
        .fields()
        .filter(|f| !schema.is_primary_key(f.column) && !schema.is_soft_delete(f.column))
        .filter_map(|f| record.get(f.column).map(|v| (f.column.to_string(), v)))
        .filter(|(_, v)| selector.has_selection() || !is_zero_value(v))
        .collect()
}

/// Column list and values for inserting `record`.
///
/// A zero auto-increment key is left to the database; the soft-delete column is never written;
/// audit columns are always written.
pub fn insert_columns(
    record: &dyn Record,
    selector: &FieldSelector,
    audit: Option<&AuditContext>,
) -> Result<(Vec<String>, Vec<Value>), LifeError> {
    let schema = record.schema();
    let mut pairs: Vec<(String, Value)> = Vec::new();
    for field in selector.fields() {
        if schema.is_soft_delete(field.column) {
            continue;
        }
        let value = record
            .get(field.column)
            .ok_or_else(|| crate::model::unknown_column(schema, field.column))?;
        if schema.is_primary_key(field.column) && schema.auto_increment && is_zero_value(&value) {
            continue;
        }
        pairs.push((field.column.to_string(), value));
    }
    if let Some(audit) = audit {
        merge(&mut pairs, audit.on_insert(schema));
    }
    Ok(pairs.into_iter().unzip())
}

fn merge(pairs: &mut Vec<(String, Value)>, forced: Vec<(&'static str, Value)>) {
    for (column, value) in forced {
        match pairs.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => pairs.push((column.to_string(), value)),
        }
    }
}

pub(crate) fn apply_audit(
    record: &mut dyn Record,
    forced: Vec<(&'static str, Value)>,
) -> Result<(), LifeError> {
    for (column, value) in forced {
        record.set(column, value)?;
    }
    Ok(())
}

fn save_parents<E>(
    exec: &E,
    record: &mut dyn Record,
    selector: &FieldSelector,
    ctx: SaveContext<'_>,
) -> Result<(), RepoError>
where
    E: LifeExecutor + ?Sized,
{
    let relations: Vec<_> = selector
        .relations()
        .filter(|r| r.kind == RelationKind::BelongsTo)
        .collect();
    for relation in relations {
        let target = relation.target_schema();
        let rule = conflict_rule(ctx.option, target, ConflictRule::DoNothing);
        let mut key = None;
        for parent in record.related_mut(relation.name) {
            insert_record(exec, parent, &FieldSelector::all(target), &rule, ctx)?;
            key = parent.get(relation.references);
        }
        if let Some(key) = key {
            record.set(relation.foreign_key, key)?;
        }
    }
    Ok(())
}

fn save_children<E>(
    exec: &E,
    record: &mut dyn Record,
    selector: &FieldSelector,
    ctx: SaveContext<'_>,
) -> Result<(), RepoError>
where
    E: LifeExecutor + ?Sized,
{
    let relations: Vec<_> = selector.relations().filter(|r| r.is_dependent()).collect();
    for relation in relations {
        let Some(key) = record.get(relation.references) else {
            continue;
        };
        let target = relation.target_schema();
        let rule = conflict_rule(
            ctx.option,
            target,
            ConflictRule::UpdateColumns(vec![relation.foreign_key.to_string()]),
        );
        for child in record.related_mut(relation.name) {
            child.set(relation.foreign_key, key.clone())?;
            insert_record(exec, child, &FieldSelector::all(target), &rule, ctx)?;
        }
    }
    Ok(())
}

/// The key in the first column of a `RETURNING` row.
pub(crate) fn returned_key(row: &Row) -> Result<Value, LifeError> {
    let ty = row
        .columns()
        .first()
        .map(|c| c.type_().clone())
        .ok_or_else(|| LifeError::ParseError("RETURNING produced no column".to_string()))?;
    let value = if ty == Type::INT8 {
        Value::from(row.try_get::<_, i64>(0)?)
    } else if ty == Type::INT4 {
        Value::from(row.try_get::<_, i32>(0)?)
    } else if ty == Type::INT2 {
        Value::from(row.try_get::<_, i16>(0)?)
    } else if ty == Type::TEXT || ty == Type::VARCHAR {
        Value::from(row.try_get::<_, String>(0)?)
    } else {
        return Err(LifeError::ParseError(format!("unsupported primary key type {ty}")));
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Author, Book, Editor};
    use crate::model::Model;
    use crate::tests_cfg::{Note, RecordingExecutor};

    fn ctx(option: &QueryOption) -> SaveContext<'_> {
        SaveContext { option, audit: None }
    }

    fn author_with_book() -> Author {
        Author {
            name: "Vicheka".into(),
            sex: "Male".into(),
            books: vec![Book {
                title: "New-Book".into(),
                editor_id: 1,
                author_id: 1,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_cascades_into_has_many() {
        let exec = RecordingExecutor::new();
        let option = QueryOption::new();
        let mut author = author_with_book();
        let selector = FieldSelector::new(Author::table_schema(), &option);
        insert_record(&exec, &mut author, &selector, &ConflictRule::Error, ctx(&option)).unwrap();

        let statements = exec.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].sql.starts_with(r#"INSERT INTO "author""#));
        assert!(!statements[0].sql.contains("ON CONFLICT"));
        assert!(statements[1].sql.starts_with(r#"INSERT INTO "book""#));
        assert!(statements[1]
            .sql
            .contains(r#"DO UPDATE SET "author_id" = "excluded"."author_id""#));
    }

    #[test]
    fn test_selection_without_association_skips_children() {
        let exec = RecordingExecutor::new();
        let option = QueryOption::new().select(["ID", "Name", "Sex", "ContactNumber"]);
        let mut author = author_with_book();
        let selector = FieldSelector::new(Author::table_schema(), &option);
        insert_record(&exec, &mut author, &selector, &ConflictRule::Error, ctx(&option)).unwrap();
        assert_eq!(exec.statements().len(), 1);
    }

    #[test]
    fn test_omitted_association_is_skipped() {
        let exec = RecordingExecutor::new();
        let option = QueryOption::new().omit(["Books"]);
        let mut author = author_with_book();
        let selector = FieldSelector::new(Author::table_schema(), &option);
        insert_record(&exec, &mut author, &selector, &ConflictRule::Error, ctx(&option)).unwrap();
        assert_eq!(exec.statements().len(), 1);
    }

    #[test]
    fn test_belongs_to_parent_is_saved_first() {
        let exec = RecordingExecutor::new();
        let option = QueryOption::new();
        let mut book = Book {
            title: "Pingorm".into(),
            editor: Some(Box::new(Editor {
                id: 4,
                name: "Mr. B".into(),
                ..Default::default()
            })),
            ..Default::default()
        };
        let selector = FieldSelector::new(Book::table_schema(), &option);
        insert_record(&exec, &mut book, &selector, &ConflictRule::Error, ctx(&option)).unwrap();

        let statements = exec.statements();
        assert!(statements[0].sql.starts_with(r#"INSERT INTO "editor""#));
        assert!(statements[0].sql.contains("DO NOTHING"));
        assert!(statements[1].sql.starts_with(r#"INSERT INTO "book""#));
        assert_eq!(book.editor_id, 4);
    }

    #[test]
    fn test_conflict_override_for_children() {
        let exec = RecordingExecutor::new();
        let option = QueryOption::new().update_on_conflict("Book", ["Title"]);
        let mut author = author_with_book();
        let selector = FieldSelector::new(Author::table_schema(), &option);
        insert_record(&exec, &mut author, &selector, &ConflictRule::Error, ctx(&option)).unwrap();
        assert!(exec.statements()[1]
            .sql
            .contains(r#"DO UPDATE SET "title" = "excluded"."title""#));
    }

    #[test]
    fn test_insert_columns_skip_zero_key_and_soft_delete() {
        let author = Author {
            name: "A".into(),
            ..Default::default()
        };
        let selector = FieldSelector::all(Author::table_schema());
        let (columns, values) = insert_columns(&author, &selector, None).unwrap();
        assert_eq!(columns, vec!["name", "sex", "contact_number"]);
        assert_eq!(values.len(), 3);

        let seeded = Author { id: 1, ..author };
        let (columns, _) = insert_columns(&seeded, &selector, None).unwrap();
        assert_eq!(columns[0], "id");
    }

    #[test]
    fn test_insert_columns_force_audit_columns() {
        let audit = AuditContext::new("u-1", "org-9");
        let note = Note {
            body: "hello".into(),
            ..Default::default()
        };
        let option = QueryOption::new().select(["Body"]);
        let selector = FieldSelector::new(Note::table_schema(), &option);
        let (columns, values) = insert_columns(&note, &selector, Some(&audit)).unwrap();
        assert_eq!(columns, vec!["body", "created_by", "org_id"]);
        assert_eq!(values[1], Value::from("u-1"));
    }

    #[test]
    fn test_model_assignments_with_and_without_selection() {
        let author = Author {
            id: 1,
            sex: "F".into(),
            ..Default::default()
        };
        let all = FieldSelector::all(Author::table_schema());
        assert_eq!(
            model_assignments(&author, &all),
            vec![("sex".to_string(), Value::from("F"))]
        );

        let option = QueryOption::new().select(["Name", "Sex"]);
        let selected = FieldSelector::new(Author::table_schema(), &option);
        let columns: Vec<String> = model_assignments(&author, &selected)
            .into_iter()
            .map(|(c, _)| c)
            .collect();
        assert_eq!(columns, vec!["name", "sex"]);
    }

    #[test]
    fn test_update_requires_primary_key() {
        let exec = RecordingExecutor::new();
        let option = QueryOption::new();
        let mut author = Author::default();
        let selector = FieldSelector::all(Author::table_schema());
        let err = update_record(&exec, &mut author, &selector, ctx(&option)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Misuse);
        assert!(exec.statements().is_empty());
    }

    #[test]
    fn test_update_writes_row_then_children() {
        let exec = RecordingExecutor::with_affected(1);
        let option = QueryOption::new();
        let mut author = Author {
            id: 2,
            ..author_with_book()
        };
        let selector = FieldSelector::all(Author::table_schema());
        let affected = update_record(&exec, &mut author, &selector, ctx(&option)).unwrap();
        assert_eq!(affected, 1);

        let statements = exec.statements();
        assert!(statements[0].sql.starts_with(r#"UPDATE "author" SET"#));
        assert!(statements[1].sql.starts_with(r#"INSERT INTO "book""#));
        assert_eq!(author.books[0].author_id, 2);
    }
}
