//! Tuple codec - self-describing encoding of positional values
//!
//! Every value is a kind tag followed by its payload:
//! - scalars use the variable-length forms from `varint`
//! - strings and byte strings carry a length prefix
//! - lists and maps carry an element count
//! - records carry their name, a field count and one presence byte per field
//! - bulk numeric containers embed an `ArrayCodec` blob
//! - `any` values carry the concrete type name before the nested value
//!
//! A tuple payload is the plain concatenation of its values. The reader
//! passes the expected type for each position; the tags in the payload are
//! checked against it rather than trusted.

pub mod varint;

use std::collections::HashSet;

use thiserror::Error;

use crate::config;
use crate::numeric::{ArrayCodec, ArrayError, NumericArray, ZstdArrayCodec};
use crate::value::{Dynamic, Kind, Record, TypeDesc, Value};

/// Nesting limit for lists, maps, records and `any` values
pub const MAX_DEPTH: usize = 128;

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of input: need {needed} bytes, {remaining} left")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("unknown kind tag {0:#04x}")]
    UnknownKind(u8),

    #[error("type mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    #[error("malformed varint length byte {0:#04x}")]
    BadVarint(u8),

    #[error("invalid bool value {0}")]
    BadBool(u64),

    #[error("invalid field presence byte {0:#04x}")]
    BadPresence(u8),

    #[error("invalid utf-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("record mismatch: expected {expected}, found {found}")]
    RecordMismatch { expected: String, found: String },

    #[error("record {record} has {found} fields, want {expected}")]
    FieldCount {
        record: String,
        expected: usize,
        found: usize,
    },

    #[error("duplicate map key {0}")]
    DuplicateKey(String),

    #[error("unsupported map key of type {0}")]
    UnsupportedKey(String),

    #[error("value nested deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("{0} trailing bytes after last value")]
    TrailingBytes(usize),

    #[error("tuple declares {expected} values, payload holds {found}")]
    CountMismatch { expected: usize, found: usize },

    #[error("tuple declares {count} values, {types} target types given")]
    TypeCount { count: usize, types: usize },

    #[error("{value} out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Array codec built from the process configuration
pub fn default_arrays() -> ZstdArrayCodec {
    ZstdArrayCodec::new(config::get().numeric.compression_level)
}

/// Encode values in order with the default array codec
pub fn encode(values: &[Value]) -> Result<Vec<u8>, CodecError> {
    let arrays = default_arrays();
    let mut encoder = Encoder::new(&arrays);
    for value in values {
        encoder.write_value(value)?;
    }
    Ok(encoder.finish())
}

/// Decode exactly one value per target type
pub fn decode(bytes: &[u8], types: &[TypeDesc]) -> Result<Vec<Value>, CodecError> {
    let arrays = default_arrays();
    let mut decoder = Decoder::new(bytes, &arrays);
    let values = types
        .iter()
        .map(|ty| decoder.read_value(ty))
        .collect::<Result<Vec<_>, _>>()?;
    decoder.finish()?;
    Ok(values)
}

/// Decode a payload without a schema, checking the declared count
pub fn decode_all(bytes: &[u8], count: usize) -> Result<Vec<Value>, CodecError> {
    let arrays = default_arrays();
    let mut decoder = Decoder::new(bytes, &arrays);
    let mut values = Vec::with_capacity(count.min(bytes.len()));
    while !decoder.is_empty() {
        values.push(decoder.read_any()?);
    }
    if values.len() != count {
        return Err(CodecError::CountMismatch {
            expected: count,
            found: values.len(),
        });
    }
    Ok(values)
}

// ============================================================================
// Encoding
// ============================================================================

/// Appends encoded values to an owned buffer
pub struct Encoder<'a> {
    buf: Vec<u8>,
    arrays: &'a dyn ArrayCodec,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(arrays: &'a dyn ArrayCodec) -> Self {
        Self {
            buf: Vec::new(),
            arrays,
            depth: 0,
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Append one self-describing value
    pub fn write_value(&mut self, value: &Value) -> Result<(), CodecError> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::TooDeep);
        }
        self.depth += 1;
        let result = self.write_tagged(value);
        self.depth -= 1;
        result
    }

    fn write_tagged(&mut self, value: &Value) -> Result<(), CodecError> {
        self.buf.push(value.kind().tag());
        match value {
            Value::Bool(b) => varint::write_uint(&mut self.buf, u64::from(*b)),
            Value::Int(n) => varint::write_int(&mut self.buf, *n),
            Value::Uint(n) => varint::write_uint(&mut self.buf, *n),
            Value::Float(f) => varint::write_float(&mut self.buf, *f),
            Value::Str(s) => self.write_bytes(s.as_bytes()),
            Value::Bytes(b) => self.write_bytes(b),
            Value::List(items) => {
                varint::write_uint(&mut self.buf, items.len() as u64);
                for item in items {
                    self.write_value(item)?;
                }
            }
            Value::Map(entries) => {
                let mut seen = HashSet::with_capacity(entries.len());
                varint::write_uint(&mut self.buf, entries.len() as u64);
                for (key, elem) in entries {
                    let scalar = ScalarKey::from_value(key)?;
                    if !seen.insert(scalar) {
                        return Err(CodecError::DuplicateKey(describe_key(key)));
                    }
                    self.write_value(key)?;
                    self.write_value(elem)?;
                }
            }
            Value::Record(record) => {
                self.write_bytes(record.name.as_bytes());
                varint::write_uint(&mut self.buf, record.fields.len() as u64);
                for field in &record.fields {
                    match field {
                        Some(value) => {
                            self.buf.push(1);
                            self.write_value(value)?;
                        }
                        None => self.buf.push(0),
                    }
                }
            }
            Value::Int64s(values) => {
                let blob = self.arrays.encode(&NumericArray::Int64(values.clone()))?;
                self.write_bytes(&blob);
            }
            Value::Float64s(values) => {
                let blob = self.arrays.encode(&NumericArray::Float64(values.clone()))?;
                self.write_bytes(&blob);
            }
            Value::Any(dynamic) => {
                self.write_bytes(dynamic.type_name.as_bytes());
                self.write_value(&dynamic.value)?;
            }
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        varint::write_uint(&mut self.buf, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }
}

/// Hashable view of a map key
#[derive(Debug, PartialEq, Eq, Hash)]
enum ScalarKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Str(String),
}

impl ScalarKey {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Int(n) => Ok(Self::Int(*n)),
            Value::Uint(n) => Ok(Self::Uint(*n)),
            Value::Str(s) => Ok(Self::Str(s.clone())),
            other => Err(CodecError::UnsupportedKey(other.type_name())),
        }
    }
}

fn describe_key(key: &Value) -> String {
    match key {
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Uint(n) => n.to_string(),
        Value::Str(s) => format!("{:?}", s),
        other => other.type_name(),
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Reads values from a borrowed payload
pub struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    arrays: &'a dyn ArrayCodec,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8], arrays: &'a dyn ArrayCodec) -> Self {
        Self {
            input,
            pos: 0,
            arrays,
            depth: 0,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail if anything is left after the last value
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    /// Read one value, checking it against `ty`
    pub fn read_value(&mut self, ty: &TypeDesc) -> Result<Value, CodecError> {
        self.read_slot(Some(ty))
    }

    /// Read one value using only the tags in the payload
    pub fn read_any(&mut self) -> Result<Value, CodecError> {
        self.read_slot(None)
    }

    fn read_slot(&mut self, ty: Option<&TypeDesc>) -> Result<Value, CodecError> {
        let tag = self.read_u8()?;
        let kind = Kind::from_tag(tag).ok_or(CodecError::UnknownKind(tag))?;
        if let Some(ty) = ty {
            if kind != ty.kind() {
                return Err(CodecError::KindMismatch {
                    expected: ty.to_string(),
                    found: kind.to_string(),
                });
            }
        }

        if self.depth >= MAX_DEPTH {
            return Err(CodecError::TooDeep);
        }
        self.depth += 1;
        let result = self.read_payload(kind, ty);
        self.depth -= 1;
        result
    }

    fn read_payload(&mut self, kind: Kind, ty: Option<&TypeDesc>) -> Result<Value, CodecError> {
        let value = match kind {
            Kind::Bool => match self.read_uint()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                n => return Err(CodecError::BadBool(n)),
            },
            Kind::Int => Value::Int(varint::unfold_int(self.read_uint()?)),
            Kind::Uint => Value::Uint(self.read_uint()?),
            Kind::Float => Value::Float(varint::float_from_wire(self.read_uint()?)),
            Kind::Str => Value::Str(self.read_string()?),
            Kind::Bytes => Value::Bytes(self.read_bytes()?.to_vec()),
            Kind::List => {
                let elem = match ty {
                    Some(TypeDesc::List(elem)) => Some(&**elem),
                    _ => None,
                };
                let count = self.read_count()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_slot(elem)?);
                }
                Value::List(items)
            }
            Kind::Map => {
                let (key_ty, elem_ty) = match ty {
                    Some(TypeDesc::Map(key, elem)) => (Some(&**key), Some(&**elem)),
                    _ => (None, None),
                };
                let count = self.read_count()?;
                let mut seen = HashSet::with_capacity(count);
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.read_slot(key_ty)?;
                    if !seen.insert(ScalarKey::from_value(&key)?) {
                        return Err(CodecError::DuplicateKey(describe_key(&key)));
                    }
                    let elem = self.read_slot(elem_ty)?;
                    entries.push((key, elem));
                }
                Value::Map(entries)
            }
            Kind::Record => self.read_record(ty)?,
            Kind::Numeric => {
                let blob = self.read_bytes()?;
                let array = self.arrays.decode(blob)?;
                match (ty, array) {
                    (None | Some(TypeDesc::Int64s), NumericArray::Int64(values)) => {
                        Value::Int64s(values)
                    }
                    (None | Some(TypeDesc::Float64s), NumericArray::Float64(values)) => {
                        Value::Float64s(values)
                    }
                    (Some(ty), array) => {
                        return Err(CodecError::KindMismatch {
                            expected: ty.to_string(),
                            found: array.to_string(),
                        })
                    }
                }
            }
            Kind::Any => {
                let type_name = self.read_string()?;
                let value = self.read_slot(None)?;
                Value::Any(Box::new(Dynamic::new(type_name, value)))
            }
        };
        Ok(value)
    }

    fn read_record(&mut self, ty: Option<&TypeDesc>) -> Result<Value, CodecError> {
        let layout = match ty {
            Some(TypeDesc::Record(layout)) => Some(layout),
            _ => None,
        };

        let name = self.read_string()?;
        if let Some(layout) = layout {
            if name != layout.name {
                return Err(CodecError::RecordMismatch {
                    expected: layout.name.clone(),
                    found: name,
                });
            }
        }

        let count = self.read_count()?;
        if let Some(layout) = layout {
            if count != layout.fields.len() {
                return Err(CodecError::FieldCount {
                    record: name,
                    expected: layout.fields.len(),
                    found: count,
                });
            }
        }

        let mut fields = Vec::with_capacity(count);
        for i in 0..count {
            let field_ty = layout.map(|layout| &layout.fields[i].1);
            let field = match self.read_u8()? {
                0 => None,
                1 => Some(self.read_slot(field_ty)?),
                other => return Err(CodecError::BadPresence(other)),
            };
            fields.push(field);
        }
        Ok(Value::Record(Record::new(name, fields)))
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self.input.get(self.pos).ok_or(CodecError::UnexpectedEof {
            needed: 1,
            remaining: 0,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let input: &'a [u8] = self.input;
        let bytes = &input[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_uint(&mut self) -> Result<u64, CodecError> {
        let first = self.read_u8()?;
        match varint::payload_len(first) {
            Some(0) => Ok(u64::from(first)),
            Some(len) => Ok(varint::from_be_payload(self.read_exact(len)?)),
            None => Err(CodecError::BadVarint(first)),
        }
    }

    /// Length prefix, bounded by the bytes left
    fn read_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_uint()?;
        match usize::try_from(len) {
            Ok(len) if len <= self.remaining() => Ok(len),
            _ => Err(CodecError::UnexpectedEof {
                needed: usize::try_from(len).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            }),
        }
    }

    /// Element count; every element takes at least one byte
    fn read_count(&mut self) -> Result<usize, CodecError> {
        self.read_len()
    }

    fn read_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_len()?;
        self.read_exact(len)
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}
