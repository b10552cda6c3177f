use super::{Author, Editor};
use crate::Model;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[table_name = "book"]
pub struct Book {
    #[primary_key]
    #[auto_increment]
    #[field_name = "ID"]
    pub id: i64,
    pub title: String,
    #[field_name = "AuthorID"]
    pub author_id: i64,
    #[field_name = "EditorID"]
    pub editor_id: i64,
    #[soft_delete]
    pub deleted_at: Option<DateTime<Utc>>,
    #[belongs_to(foreign_key = "author_id")]
    pub author: Option<Box<Author>>,
    #[belongs_to(foreign_key = "editor_id")]
    pub editor: Option<Box<Editor>>,
}
