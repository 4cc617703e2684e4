//! Conversions between Rust types and bridge values
//!
//! A registered function's signature is made of types implementing
//! `FromValue` (parameters) and `IntoValue` (results). Both carry a
//! `TypeDesc` so the registry can describe the function without calling it.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::codec::CodecError;
use crate::numeric::{Float64s, Int64s};
use crate::value::{Dynamic, TypeDesc, Value};

/// Static type descriptor of a Rust type
pub trait Typed {
    fn type_desc() -> TypeDesc;
}

/// Rust value convertible into a bridge value
pub trait IntoValue: Typed {
    fn into_value(self) -> Value;
}

/// Rust value reconstructible from a bridge value
pub trait FromValue: Typed + Sized {
    fn from_value(value: Value) -> Result<Self, CodecError>;
}

/// Byte string, distinct from `Vec<u8>` which is a list of integers
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

fn mismatch(expected: TypeDesc, found: &Value) -> CodecError {
    CodecError::KindMismatch {
        expected: expected.to_string(),
        found: found.type_name(),
    }
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl Typed for $ty {
            fn type_desc() -> TypeDesc {
                TypeDesc::Int
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::Int(self as i64)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::Int(n) => <$ty>::try_from(n).map_err(|_| CodecError::OutOfRange {
                        value: n.to_string(),
                        target: stringify!($ty),
                    }),
                    other => Err(mismatch(TypeDesc::Int, &other)),
                }
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl Typed for $ty {
            fn type_desc() -> TypeDesc {
                TypeDesc::Uint
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::Uint(self as u64)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::Uint(n) => <$ty>::try_from(n).map_err(|_| CodecError::OutOfRange {
                        value: n.to_string(),
                        target: stringify!($ty),
                    }),
                    other => Err(mismatch(TypeDesc::Uint, &other)),
                }
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

/// Implement the traits for a type stored directly in one `Value` variant
macro_rules! impl_direct {
    ($ty:ty, $variant:ident, $desc:expr) => {
        impl Typed for $ty {
            fn type_desc() -> TypeDesc {
                $desc
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(mismatch($desc, &other)),
                }
            }
        }
    };
}

impl_direct!(bool, Bool, TypeDesc::Bool);
impl_direct!(f64, Float, TypeDesc::Float);
impl_direct!(String, Str, TypeDesc::Str);
impl_direct!(Int64s, Int64s, TypeDesc::Int64s);
impl_direct!(Float64s, Float64s, TypeDesc::Float64s);

impl Typed for f32 {
    fn type_desc() -> TypeDesc {
        TypeDesc::Float
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        let f = f64::from_value(value)?;
        // Infinities and NaN pass through; finite values must fit
        if f.is_finite() && f.abs() > f64::from(f32::MAX) {
            return Err(CodecError::OutOfRange {
                value: format!("{:e}", f),
                target: "f32",
            });
        }
        Ok(f as f32)
    }
}

impl Typed for Bytes {
    fn type_desc() -> TypeDesc {
        TypeDesc::Bytes
    }
}

impl IntoValue for Bytes {
    fn into_value(self) -> Value {
        Value::Bytes(self.0)
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Bytes(bytes) => Ok(Bytes(bytes)),
            other => Err(mismatch(TypeDesc::Bytes, &other)),
        }
    }
}

impl Typed for Dynamic {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }
}

impl IntoValue for Dynamic {
    fn into_value(self) -> Value {
        Value::Any(Box::new(self))
    }
}

impl FromValue for Dynamic {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Any(dynamic) => Ok(*dynamic),
            other => Err(mismatch(TypeDesc::Any, &other)),
        }
    }
}

/// A bare `Value` travels as `any`, named after its own type
impl Typed for Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        let type_name = self.type_name();
        Value::Any(Box::new(Dynamic::new(type_name, self)))
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Any(dynamic) => Ok(dynamic.value),
            other => Err(mismatch(TypeDesc::Any, &other)),
        }
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::list(T::type_desc())
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch(Self::type_desc(), &other)),
        }
    }
}

impl<K: Typed, V: Typed> Typed for BTreeMap<K, V> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(K::type_desc(), V::type_desc())
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => Err(mismatch(Self::type_desc(), &other)),
        }
    }
}

impl<K: Typed, V: Typed, S> Typed for HashMap<K, V, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(K::type_desc(), V::type_desc())
    }
}

impl<K: IntoValue, V: IntoValue, S> IntoValue for HashMap<K, V, S> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }
}

impl<K, V, S> FromValue for HashMap<K, V, S>
where
    K: FromValue + Eq + Hash,
    V: FromValue,
    S: std::hash::BuildHasher + Default,
{
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => Err(mismatch(Self::type_desc(), &other)),
        }
    }
}

/// Result list of a registered function
pub trait IntoReturns {
    fn return_types() -> Vec<TypeDesc>;

    fn into_values(self) -> Vec<Value>;
}

impl IntoReturns for () {
    fn return_types() -> Vec<TypeDesc> {
        Vec::new()
    }

    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

impl<T: IntoValue> IntoReturns for T {
    fn return_types() -> Vec<TypeDesc> {
        vec![T::type_desc()]
    }

    fn into_values(self) -> Vec<Value> {
        vec![self.into_value()]
    }
}

macro_rules! impl_tuple_returns {
    ($($name:ident),+) => {
        impl<$($name: IntoValue),+> IntoReturns for ($($name,)+) {
            fn return_types() -> Vec<TypeDesc> {
                vec![$($name::type_desc()),+]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into_value()),+]
            }
        }
    };
}

impl_tuple_returns!(A, B);
impl_tuple_returns!(A, B, C);
impl_tuple_returns!(A, B, C, D);
