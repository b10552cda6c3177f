//! Column values for bulk updates.

use crate::engine::save::model_assignments;
use crate::engine::FieldSelector;
use crate::error::RepoError;
use crate::model::Model;
use crate::naming::normalize_name;
use sea_query::Value;

/// An explicit field-to-value map for [`Repository::updates`](crate::Repository::updates).
///
/// Unlike a model argument, every listed field is written, zero values included.
///
/// ```
/// use pingorm::Assignments;
///
/// let values = Assignments::new().set("Sex", "Female").set("ContactNumber", "");
/// assert_eq!(values.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments {
    entries: Vec<(String, Value)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` (field or column name) to `value`, replacing an earlier value for it.
    ///
    /// Names are compared the way fields are resolved, so `Sex` and `sex` are one entry.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        let key = normalize_name(&field);
        match self
            .entries
            .iter_mut()
            .find(|(f, _)| normalize_name(f) == key)
        {
            Some(slot) => slot.1 = value,
            None => self.entries.push((field, value)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(f, v)| (f.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Assignments {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Assignments::new(), |acc, (k, v)| acc.set(k, v))
    }
}

/// Values accepted by `Repository::<M>::updates`: a model of the same type or [`Assignments`].
pub trait IntoAssignments<M: Model> {
    /// Physical column/value pairs to write, after select/omit rules.
    ///
    /// # Errors
    ///
    /// `RepoError::Misuse` when a name does not designate a field of `M`.
    fn into_assignments(
        self,
        selector: &FieldSelector,
    ) -> Result<Vec<(String, Value)>, RepoError>;
}

impl<M: Model> IntoAssignments<M> for &M {
    fn into_assignments(
        self,
        selector: &FieldSelector,
    ) -> Result<Vec<(String, Value)>, RepoError> {
        Ok(model_assignments(self, selector))
    }
}

impl<M: Model> IntoAssignments<M> for Assignments {
    fn into_assignments(
        self,
        selector: &FieldSelector,
    ) -> Result<Vec<(String, Value)>, RepoError> {
        let schema = M::table_schema();
        let mut resolved: Vec<(String, Value)> = Vec::with_capacity(self.entries.len());
        for (name, value) in self.entries {
            let field = schema.field(&name).ok_or_else(|| {
                RepoError::misuse(format!("{} has no field {name}", schema.name))
            })?;
            let column = field.column;
            if schema.is_primary_key(column)
                || schema.is_soft_delete(column)
                || !selector.includes_field(field)
            {
                log::debug!("updates on {}: skipping {column}", schema.name);
                continue;
            }
            // A field and its column name resolve to the same column; the later value wins.
            match resolved.iter_mut().find(|(c, _)| c == column) {
                Some(slot) => slot.1 = value,
                None => resolved.push((column.to_string(), value)),
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Author;
    use crate::option::QueryOption;

    fn resolve(
        values: Assignments,
        option: &QueryOption,
    ) -> Result<Vec<(String, Value)>, RepoError> {
        let selector = FieldSelector::new(Author::table_schema(), option);
        IntoAssignments::<Author>::into_assignments(values, &selector)
    }

    #[test]
    fn test_set_replaces_names_differing_in_case() {
        let values = Assignments::new().set("Sex", "Male").set("sex", "Female");
        assert_eq!(values.len(), 1);
        assert_eq!(values.iter().next(), Some(("Sex", &Value::from("Female"))));
    }

    #[test]
    fn test_field_and_column_names_resolve_to_one_column() {
        let values: Assignments = [("ContactNumber", "012"), ("contact_number", "099")]
            .into_iter()
            .collect();
        let resolved = resolve(values, &QueryOption::new()).unwrap();
        assert_eq!(resolved, vec![("contact_number".to_string(), Value::from("099"))]);
    }

    #[test]
    fn test_protected_and_unselected_fields_are_skipped() {
        let values = Assignments::new()
            .set("ID", 3i64)
            .set("DeletedAt", Value::ChronoDateTimeUtc(None))
            .set("Name", "Dara")
            .set("Sex", "Female");
        let resolved = resolve(values, &QueryOption::new().omit(["Name"])).unwrap();
        assert_eq!(resolved, vec![("sex".to_string(), Value::from("Female"))]);
    }

    #[test]
    fn test_unknown_field_is_misuse() {
        let err = resolve(Assignments::new().set("Isbn", "x"), &QueryOption::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Misuse);
        assert!(err.to_string().contains("Author has no field Isbn"));
    }
}
