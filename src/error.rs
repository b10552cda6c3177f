//! Errors returned by repository operations.

use crate::executor::LifeError;
use crate::keys::ShapeError;

/// Coarse classification of a [`RepoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The call itself is wrong; retrying it cannot succeed.
    Misuse,
    /// The key argument has the wrong shape.
    Validation,
    /// The database or the driver failed.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("invalid repository call: {0}")]
    Misuse(String),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Storage(#[from] LifeError),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::Misuse(_) => ErrorKind::Misuse,
            RepoError::Shape(_) => ErrorKind::Validation,
            RepoError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// SQLSTATE of the underlying database error, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            RepoError::Storage(e) => e.sql_state(),
            _ => None,
        }
    }

    pub(crate) fn misuse(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("repository misuse: {message}");
        RepoError::Misuse(message)
    }
}
