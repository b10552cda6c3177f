//! SeaQuery statement builders (Postgres dialect).
//!
//! Builders take physical column names and values that have already been resolved, and return
//! SQL text plus the values to bind.

use crate::executor::LifeError;
use crate::model::Schema;
use sea_query::{
    Alias, Condition, Expr, ExprTrait, OnConflict, Order, PostgresQueryBuilder, Query, Value,
    Values,
};

/// What an insert does when the primary key already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictRule {
    /// No `ON CONFLICT` clause: the database error surfaces.
    Error,
    DoNothing,
    /// `DO UPDATE SET` the listed columns; an empty list behaves as `DoNothing`.
    UpdateColumns(Vec<String>),
}

/// A multi-row insert returning the primary key of every row written.
///
/// `rows` must all have one value per column. With no columns a single `DEFAULT VALUES` row is
/// inserted.
///
/// # Errors
///
/// Returns `LifeError::QueryError` if a row's width differs from the column count.
pub fn insert_statement(
    schema: &Schema,
    columns: &[String],
    rows: Vec<Vec<Value>>,
    conflict: &ConflictRule,
) -> Result<(String, Values), LifeError> {
    let mut stmt = Query::insert();
    stmt.into_table(Alias::new(schema.table));

    if columns.is_empty() {
        stmt.or_default_values();
    } else {
        stmt.columns(columns.iter().map(|c| Alias::new(c.clone())));
        for row in rows {
            stmt.values(row.into_iter().map(Expr::val))
                .map_err(|e| LifeError::QueryError(format!("insert into {}: {e}", schema.table)))?;
        }
    }

    let key = Alias::new(schema.primary_key);
    match conflict {
        ConflictRule::Error => {}
        ConflictRule::DoNothing => {
            stmt.on_conflict(OnConflict::column(key.clone()).do_nothing().to_owned());
        }
        ConflictRule::UpdateColumns(update) if update.is_empty() => {
            stmt.on_conflict(OnConflict::column(key.clone()).do_nothing().to_owned());
        }
        ConflictRule::UpdateColumns(update) => {
            stmt.on_conflict(
                OnConflict::column(key.clone())
                    .update_columns(update.iter().map(|c| Alias::new(c.clone())))
                    .to_owned(),
            );
        }
    }
    stmt.returning_col(key);

    Ok(stmt.build(PostgresQueryBuilder))
}

/// `UPDATE … SET … WHERE filter`, skipping soft-deleted rows unless `include_deleted`.
pub fn update_statement(
    schema: &Schema,
    assignments: Vec<(String, Value)>,
    filter: Condition,
    include_deleted: bool,
) -> (String, Values) {
    let mut stmt = Query::update();
    stmt.table(Alias::new(schema.table));
    for (column, value) in assignments {
        stmt.value(Alias::new(column), Expr::val(value));
    }
    stmt.cond_where(filter);
    if let (Some(deleted_at), false) = (schema.soft_delete, include_deleted) {
        stmt.and_where(Expr::col(Alias::new(deleted_at)).is_null());
    }
    stmt.build(PostgresQueryBuilder)
}

/// Stamp the soft-delete column on live rows matching `filter`.
///
/// # Errors
///
/// Returns `LifeError::QueryError` if the entity has no soft-delete column.
pub fn soft_delete_statement(
    schema: &Schema,
    filter: Condition,
) -> Result<(String, Values), LifeError> {
    let deleted_at = schema.soft_delete.ok_or_else(|| {
        LifeError::QueryError(format!("{} does not support soft delete", schema.name))
    })?;
    let (sql, values) = Query::update()
        .table(Alias::new(schema.table))
        .value(Alias::new(deleted_at), Expr::cust("CURRENT_TIMESTAMP"))
        .cond_where(filter)
        .and_where(Expr::col(Alias::new(deleted_at)).is_null())
        .build(PostgresQueryBuilder);
    Ok((sql, values))
}

pub fn hard_delete_statement(schema: &Schema, filter: Condition) -> (String, Values) {
    Query::delete()
        .from_table(Alias::new(schema.table))
        .cond_where(filter)
        .build(PostgresQueryBuilder)
}

/// `SELECT columns … WHERE filter ORDER BY primary key`, hiding soft-deleted rows unless
/// `include_deleted`.
pub fn select_statement(
    schema: &Schema,
    columns: &[String],
    filter: Condition,
    include_deleted: bool,
) -> (String, Values) {
    let mut stmt = Query::select();
    stmt.columns(columns.iter().map(|c| Alias::new(c.clone())))
        .from(Alias::new(schema.table))
        .cond_where(filter);
    if let (Some(deleted_at), false) = (schema.soft_delete, include_deleted) {
        stmt.and_where(Expr::col(Alias::new(deleted_at)).is_null());
    }
    stmt.order_by(Alias::new(schema.primary_key), Order::Asc);
    stmt.build(PostgresQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Author, Book};
    use crate::model::Model;

    fn id_filter(ids: Vec<i64>) -> Condition {
        Condition::all().add(Expr::col(Alias::new("id")).is_in(ids))
    }

    #[test]
    fn test_insert_without_conflict_clause() {
        let (sql, values) = insert_statement(
            Author::table_schema(),
            &["name".to_string(), "sex".to_string()],
            vec![vec![Value::from("Vicheka"), Value::from("Male")]],
            &ConflictRule::Error,
        )
        .unwrap();
        assert!(
            sql.starts_with(r#"INSERT INTO "author" ("name", "sex") VALUES ($1, $2)"#),
            "{sql}"
        );
        assert!(!sql.contains("ON CONFLICT"));
        assert!(sql.ends_with(r#"RETURNING "id""#), "{sql}");
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_insert_conflict_updates_listed_columns() {
        let (sql, _) = insert_statement(
            Book::table_schema(),
            &["id".to_string(), "title".to_string(), "author_id".to_string()],
            vec![
                vec![Value::from(1i64), Value::from("a"), Value::from(2i64)],
                vec![Value::from(2i64), Value::from("b"), Value::from(2i64)],
            ],
            &ConflictRule::UpdateColumns(vec!["author_id".to_string()]),
        )
        .unwrap();
        assert!(
            sql.contains(r#"ON CONFLICT ("id") DO UPDATE SET "author_id" = "excluded"."author_id""#),
            "{sql}"
        );
        assert!(sql.contains("$6"), "{sql}");
    }

    #[test]
    fn test_insert_conflict_do_nothing() {
        for rule in [ConflictRule::DoNothing, ConflictRule::UpdateColumns(Vec::new())] {
            let (sql, _) = insert_statement(
                Author::table_schema(),
                &["id".to_string()],
                vec![vec![Value::from(1i64)]],
                &rule,
            )
            .unwrap();
            assert!(sql.contains(r#"ON CONFLICT ("id") DO NOTHING"#), "{sql}");
        }
    }

    #[test]
    fn test_insert_rejects_ragged_rows() {
        let err = insert_statement(
            Author::table_schema(),
            &["name".to_string(), "sex".to_string()],
            vec![vec![Value::from("only name")]],
            &ConflictRule::Error,
        )
        .unwrap_err();
        assert!(matches!(err, LifeError::QueryError(_)));
    }

    #[test]
    fn test_update_skips_soft_deleted_rows() {
        let (sql, values) = update_statement(
            Author::table_schema(),
            vec![("sex".to_string(), Value::from("F"))],
            id_filter(vec![1]),
            false,
        );
        assert!(sql.starts_with(r#"UPDATE "author" SET "sex" = $1 WHERE"#), "{sql}");
        assert!(sql.contains(r#""deleted_at" IS NULL"#), "{sql}");
        assert_eq!(values.0.len(), 2);

        let (unscoped, _) = update_statement(
            Author::table_schema(),
            vec![("sex".to_string(), Value::from("F"))],
            id_filter(vec![1]),
            true,
        );
        assert!(!unscoped.contains("deleted_at"), "{unscoped}");
    }

    #[test]
    fn test_soft_and_hard_delete() {
        let (soft, _) =
            soft_delete_statement(Author::table_schema(), id_filter(vec![1, 2])).unwrap();
        assert!(soft.contains(r#"SET "deleted_at" = CURRENT_TIMESTAMP"#), "{soft}");
        assert!(soft.contains(r#""deleted_at" IS NULL"#), "{soft}");

        let (hard, values) = hard_delete_statement(Author::table_schema(), id_filter(vec![1, 2]));
        assert!(hard.starts_with(r#"DELETE FROM "author" WHERE"#), "{hard}");
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_select_orders_by_primary_key() {
        let (sql, _) = select_statement(
            Book::table_schema(),
            &["id".to_string(), "title".to_string()],
            id_filter(vec![3]),
            false,
        );
        assert!(sql.starts_with(r#"SELECT "id", "title" FROM "book" WHERE"#), "{sql}");
        assert!(sql.contains(r#""deleted_at" IS NULL"#), "{sql}");
        assert!(sql.ends_with(r#"ORDER BY "id" ASC"#), "{sql}");
    }
}
