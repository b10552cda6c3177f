//! Dynamically shaped key arguments.

use sea_query::Value;

/// A key argument: a single value or a (possibly nested) sequence of them.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Scalar(Value),
    Seq(Vec<KeyValue>),
}

impl KeyValue {
    pub fn is_seq(&self) -> bool {
        matches!(self, KeyValue::Seq(_))
    }

    pub fn as_seq(&self) -> Option<&[KeyValue]> {
        match self {
            KeyValue::Seq(items) => Some(items),
            KeyValue::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            KeyValue::Scalar(v) => Some(v),
            KeyValue::Seq(_) => None,
        }
    }

    /// Number of elements of a sequence; a scalar counts as one.
    pub fn len(&self) -> usize {
        match self {
            KeyValue::Seq(items) => items.len(),
            KeyValue::Scalar(_) => 1,
        }
    }

    /// `true` only for an empty sequence.
    pub fn is_empty(&self) -> bool {
        matches!(self, KeyValue::Seq(items) if items.is_empty())
    }
}

/// Conversion of Rust values into [`KeyValue`].
///
/// Scalars become `KeyValue::Scalar`; `Vec`s, slices, arrays and tuples become sequences, so
/// `vec![1i64, 2]` is one-dimensional and `vec![(1i64, "a"), (2, "b")]` two-dimensional.
pub trait IntoKeyValue {
    fn into_key_value(self) -> KeyValue;
}

impl IntoKeyValue for KeyValue {
    fn into_key_value(self) -> KeyValue {
        self
    }
}

impl IntoKeyValue for Value {
    fn into_key_value(self) -> KeyValue {
        KeyValue::Scalar(self)
    }
}

macro_rules! impl_scalar_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoKeyValue for $ty {
                fn into_key_value(self) -> KeyValue {
                    KeyValue::Scalar(Value::from(self))
                }
            }
        )*
    };
}

impl_scalar_key!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, char, String, &str);

impl<T: IntoKeyValue> IntoKeyValue for Vec<T> {
    fn into_key_value(self) -> KeyValue {
        KeyValue::Seq(self.into_iter().map(IntoKeyValue::into_key_value).collect())
    }
}

impl<T: IntoKeyValue + Clone> IntoKeyValue for &[T] {
    fn into_key_value(self) -> KeyValue {
        KeyValue::Seq(self.iter().cloned().map(IntoKeyValue::into_key_value).collect())
    }
}

impl<T: IntoKeyValue + Clone> IntoKeyValue for &Vec<T> {
    fn into_key_value(self) -> KeyValue {
        self.as_slice().into_key_value()
    }
}

impl<T: IntoKeyValue, const N: usize> IntoKeyValue for [T; N] {
    fn into_key_value(self) -> KeyValue {
        KeyValue::Seq(self.into_iter().map(IntoKeyValue::into_key_value).collect())
    }
}

macro_rules! impl_tuple_key {
    ($($name:ident),+) => {
        impl<$($name: IntoKeyValue),+> IntoKeyValue for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_key_value(self) -> KeyValue {
                let ($($name,)+) = self;
                KeyValue::Seq(vec![$($name.into_key_value()),+])
            }
        }
    };
}

impl_tuple_key!(A, B);
impl_tuple_key!(A, B, C);
impl_tuple_key!(A, B, C, D);
