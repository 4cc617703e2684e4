//! Value model for values crossing the bridge
//!
//! `TypeDesc` describes the shape a parameter or return slot expects,
//! `Value` is the dynamically typed payload the codec reads and writes.

use std::fmt;
use std::sync::Arc;

use crate::numeric::{Float64s, Int64s};

/// Kind tag written in front of every encoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Bool = 1,
    Int = 2,
    Uint = 3,
    Float = 4,
    Str = 5,
    Bytes = 6,
    List = 7,
    Map = 8,
    Record = 9,
    Numeric = 10,
    Any = 11,
}

impl Kind {
    /// Decode a tag byte
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => Self::Bool,
            2 => Self::Int,
            3 => Self::Uint,
            4 => Self::Float,
            5 => Self::Str,
            6 => Self::Bytes,
            7 => Self::List,
            8 => Self::Map,
            9 => Self::Record,
            10 => Self::Numeric,
            11 => Self::Any,
            _ => return None,
        })
    }

    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Record => "record",
            Self::Numeric => "numeric",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named record layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<(String, TypeDesc)>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Index of a field by name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }
}

/// Type descriptor for one positional slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Bool,
    Int,
    Uint,
    Float,
    Str,
    Bytes,
    List(Box<TypeDesc>),
    Map(Box<TypeDesc>, Box<TypeDesc>),
    Record(Arc<RecordType>),
    Int64s,
    Float64s,
    /// Slot accepting any value that carries its own type name
    Any,
}

impl TypeDesc {
    pub fn list(elem: TypeDesc) -> Self {
        Self::List(Box::new(elem))
    }

    pub fn map(key: TypeDesc, elem: TypeDesc) -> Self {
        Self::Map(Box::new(key), Box::new(elem))
    }

    pub fn record(record: RecordType) -> Self {
        Self::Record(Arc::new(record))
    }

    /// Wire kind used for values of this type
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Bool => Kind::Bool,
            Self::Int => Kind::Int,
            Self::Uint => Kind::Uint,
            Self::Float => Kind::Float,
            Self::Str => Kind::Str,
            Self::Bytes => Kind::Bytes,
            Self::List(_) => Kind::List,
            Self::Map(..) => Kind::Map,
            Self::Record(_) => Kind::Record,
            Self::Int64s | Self::Float64s => Kind::Numeric,
            Self::Any => Kind::Any,
        }
    }

    /// Only scalar types may key a map
    #[inline]
    pub const fn is_map_key(&self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Uint | Self::Str)
    }

    /// Check that the descriptor can be encoded and decoded.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::List(elem) => elem.validate(),
            Self::Map(key, elem) => {
                if !key.is_map_key() {
                    return Err(format!("map key type {} is not a scalar", key));
                }
                elem.validate()
            }
            Self::Record(record) => {
                if record.name.is_empty() {
                    return Err("record type has an empty name".to_string());
                }
                for (i, (name, ty)) in record.fields.iter().enumerate() {
                    if record.fields[..i].iter().any(|(other, _)| other == name) {
                        return Err(format!(
                            "record {} declares field {:?} twice",
                            record.name, name
                        ));
                    }
                    ty.validate()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(elem) => write!(f, "list[{}]", elem),
            Self::Map(key, elem) => write!(f, "map[{}]{}", key, elem),
            Self::Record(record) => write!(f, "record {}", record.name),
            Self::Int64s => f.write_str("int64s"),
            Self::Float64s => f.write_str("float64s"),
            other => f.write_str(other.kind().name()),
        }
    }
}

/// Record value; absent fields decode as `None`
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<Option<Value>>,
}

impl Record {
    pub fn new(name: impl Into<String>, fields: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Move a field out, leaving `None` behind
    pub fn take_field(&mut self, index: usize) -> Option<Value> {
        self.fields.get_mut(index).and_then(Option::take)
    }
}

/// Value tagged with the name of its concrete type
#[derive(Debug, Clone, PartialEq)]
pub struct Dynamic {
    pub type_name: String,
    pub value: Value,
}

impl Dynamic {
    pub fn new(type_name: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

/// Dynamically typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Entries in insertion order
    Map(Vec<(Value, Value)>),
    Record(Record),
    Int64s(Int64s),
    Float64s(Float64s),
    Any(Box<Dynamic>),
}

impl Value {
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Bool(_) => Kind::Bool,
            Self::Int(_) => Kind::Int,
            Self::Uint(_) => Kind::Uint,
            Self::Float(_) => Kind::Float,
            Self::Str(_) => Kind::Str,
            Self::Bytes(_) => Kind::Bytes,
            Self::List(_) => Kind::List,
            Self::Map(_) => Kind::Map,
            Self::Record(_) => Kind::Record,
            Self::Int64s(_) | Self::Float64s(_) => Kind::Numeric,
            Self::Any(_) => Kind::Any,
        }
    }

    /// Short name used in mismatch messages
    pub fn type_name(&self) -> String {
        match self {
            Self::Record(record) => format!("record {}", record.name),
            Self::Int64s(_) => "int64s".to_string(),
            Self::Float64s(_) => "float64s".to_string(),
            other => other.kind().name().to_string(),
        }
    }

    /// Check the value against a declared type, recursively
    pub fn conforms_to(&self, ty: &TypeDesc) -> bool {
        match (self, ty) {
            (Self::Bool(_), TypeDesc::Bool)
            | (Self::Int(_), TypeDesc::Int)
            | (Self::Uint(_), TypeDesc::Uint)
            | (Self::Float(_), TypeDesc::Float)
            | (Self::Str(_), TypeDesc::Str)
            | (Self::Bytes(_), TypeDesc::Bytes)
            | (Self::Int64s(_), TypeDesc::Int64s)
            | (Self::Float64s(_), TypeDesc::Float64s)
            | (Self::Any(_), TypeDesc::Any) => true,
            (Self::List(items), TypeDesc::List(elem)) => {
                items.iter().all(|item| item.conforms_to(elem))
            }
            (Self::Map(entries), TypeDesc::Map(key, elem)) => entries
                .iter()
                .all(|(k, v)| k.conforms_to(key) && v.conforms_to(elem)),
            (Self::Record(record), TypeDesc::Record(layout)) => {
                record.name == layout.name
                    && record.fields.len() == layout.fields.len()
                    && record
                        .fields
                        .iter()
                        .zip(&layout.fields)
                        .all(|(value, (_, ty))| value.as_ref().map_or(true, |v| v.conforms_to(ty)))
            }
            _ => false,
        }
    }
}
