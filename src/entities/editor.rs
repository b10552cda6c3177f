use super::Book;
use crate::Model;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[table_name = "editor"]
pub struct Editor {
    #[primary_key]
    #[auto_increment]
    #[field_name = "ID"]
    pub id: i64,
    pub name: String,
    pub sex: String,
    #[soft_delete]
    pub deleted_at: Option<DateTime<Utc>>,
    #[has_many(foreign_key = "editor_id")]
    pub books: Vec<Book>,
}
