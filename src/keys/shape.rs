//! Shape validation of key arguments.

use super::KeyValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("value must be a kind of slice")]
    NotSequence,
    #[error("value must be a single dimension slice")]
    NotSingleDimension,
    #[error("value must be 2 dimension slice")]
    NotTwoDimension,
    #[error("key length {expected} requires value length {expected}, got {actual}")]
    KeyLengthMismatch { expected: usize, actual: usize },
}

pub fn assert_sequence(value: &KeyValue) -> Result<&[KeyValue], ShapeError> {
    value.as_seq().ok_or(ShapeError::NotSequence)
}

/// A sequence of scalars.
pub fn assert_single_dimension(value: &KeyValue) -> Result<&[KeyValue], ShapeError> {
    let items = assert_sequence(value)?;
    if items.iter().any(KeyValue::is_seq) {
        return Err(ShapeError::NotSingleDimension);
    }
    Ok(items)
}

/// A sequence of sequences of scalars.
pub fn assert_two_dimension(value: &KeyValue) -> Result<&[KeyValue], ShapeError> {
    let items = assert_sequence(value)?;
    for item in items {
        let inner = item.as_seq().ok_or(ShapeError::NotTwoDimension)?;
        if inner.iter().any(KeyValue::is_seq) {
            return Err(ShapeError::NotTwoDimension);
        }
    }
    Ok(items)
}
