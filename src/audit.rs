//! Audit columns filled in on insert and update.
//!
//! When a repository carries an [`AuditContext`], every row it inserts gets `created_by` and
//! `org_id`, and every row it updates gets `updated_by`, provided the table has the column and
//! no [`AuditSkip`] rule names it.

use crate::model::Schema;
use sea_query::Value;

pub const CREATED_BY: &str = "created_by";
pub const ORG_ID: &str = "org_id";
pub const UPDATED_BY: &str = "updated_by";

/// Disables one audit column on one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSkip {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    user_id: String,
    org_id: String,
    skip: Vec<AuditSkip>,
}

impl AuditContext {
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            org_id: org_id.into(),
            skip: Vec::new(),
        }
    }

    pub fn skip(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.skip.push(AuditSkip {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    fn applies(&self, schema: &Schema, column: &str) -> bool {
        schema.has_column(column)
            && !self
                .skip
                .iter()
                .any(|s| s.table == schema.table && s.column == column)
    }

    /// Columns to force on an insert into `schema`'s table.
    pub fn on_insert(&self, schema: &Schema) -> Vec<(&'static str, Value)> {
        [(CREATED_BY, &self.user_id), (ORG_ID, &self.org_id)]
            .into_iter()
            .filter(|(column, _)| self.applies(schema, column))
            .map(|(column, value)| (column, Value::from(value.clone())))
            .collect()
    }

    /// Columns to force on an update of `schema`'s table.
    pub fn on_update(&self, schema: &Schema) -> Vec<(&'static str, Value)> {
        if self.applies(schema, UPDATED_BY) {
            vec![(UPDATED_BY, Value::from(self.user_id.clone()))]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Author;
    use crate::model::Model;
    use crate::tests_cfg::Note;

    #[test]
    fn test_insert_columns_present_on_table() {
        let audit = AuditContext::new("u-1", "org-9");
        let columns = audit.on_insert(Note::table_schema());
        assert_eq!(
            columns,
            vec![(CREATED_BY, Value::from("u-1")), (ORG_ID, Value::from("org-9"))]
        );
        assert_eq!(
            audit.on_update(Note::table_schema()),
            vec![(UPDATED_BY, Value::from("u-1"))]
        );
    }

    #[test]
    fn test_tables_without_audit_columns_are_untouched() {
        let audit = AuditContext::new("u-1", "org-9");
        assert!(audit.on_insert(Author::table_schema()).is_empty());
        assert!(audit.on_update(Author::table_schema()).is_empty());
    }

    #[test]
    fn test_skip_rule_disables_one_column() {
        let audit = AuditContext::new("u-1", "org-9").skip("note", ORG_ID);
        let columns = audit.on_insert(Note::table_schema());
        assert_eq!(columns, vec![(CREATED_BY, Value::from("u-1"))]);

        let other_table = AuditContext::new("u-1", "org-9").skip("author", ORG_ID);
        assert_eq!(other_table.on_insert(Note::table_schema()).len(), 2);
    }
}
