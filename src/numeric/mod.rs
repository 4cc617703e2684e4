//! Bulk numeric arrays
//!
//! Containers of `i64`/`f64` skip element-by-element encoding and go
//! through an `ArrayCodec` instead. The default codec writes
//! `callbridge.numeric:` followed by a zstd-compressed bincode document
//! holding a dtype string, the shape and the little-endian element bytes.

mod counting;

use std::fmt;
use std::io::Read;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic prefix identifying the sub-format
pub const NUMERIC_PREFIX: &[u8] = b"callbridge.numeric:";

/// Default zstd level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Upper bound on a decompressed array document
pub const MAX_DOCUMENT_BYTES: u64 = 1 << 30;

const DTYPE_I64: &str = "<i8";
const DTYPE_F64: &str = "<f8";

/// `[]int64` container encoded through the numeric sub-format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Int64s(pub Vec<i64>);

/// `[]float64` container encoded through the numeric sub-format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Float64s(pub Vec<f64>);

macro_rules! impl_container {
    ($name:ident, $elem:ty) => {
        impl Deref for $name {
            type Target = Vec<$elem>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl From<Vec<$elem>> for $name {
            fn from(values: Vec<$elem>) -> Self {
                Self(values)
            }
        }

        impl FromIterator<$elem> for $name {
            fn from_iter<I: IntoIterator<Item = $elem>>(iter: I) -> Self {
                Self(iter.into_iter().collect())
            }
        }
    };
}

impl_container!(Int64s, i64);
impl_container!(Float64s, f64);

/// Decoded array, tagged by element type
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    Int64(Int64s),
    Float64(Float64s),
}

impl NumericArray {
    pub const fn dtype(&self) -> &'static str {
        match self {
            Self::Int64(_) => DTYPE_I64,
            Self::Float64(_) => DTYPE_F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int64(values) => values.len(),
            Self::Float64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for NumericArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(_) => f.write_str("int64s"),
            Self::Float64(_) => f.write_str("float64s"),
        }
    }
}

/// Numeric sub-format errors
#[derive(Debug, Error)]
pub enum ArrayError {
    #[error("numeric array: missing \"callbridge.numeric:\" prefix")]
    MissingPrefix,

    #[error("numeric array: compression: {0}")]
    Compression(#[from] std::io::Error),

    #[error("numeric array: document: {0}")]
    Document(#[from] bincode::Error),

    #[error("numeric array: document exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("numeric array: unsupported dtype {0:?}")]
    UnsupportedDtype(String),

    #[error("numeric array: shape {shape:?} needs {expected} bytes, found {found}")]
    ShapeMismatch {
        shape: Vec<u64>,
        expected: u64,
        found: usize,
    },
}

/// Encoder/decoder pair for bulk numeric payloads
pub trait ArrayCodec: Send + Sync {
    fn encode(&self, array: &NumericArray) -> Result<Vec<u8>, ArrayError>;

    fn decode(&self, blob: &[u8]) -> Result<NumericArray, ArrayError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ArrayDocument {
    dtype: String,
    shape: Vec<u64>,
    data: Vec<u8>,
}

/// Default array codec: prefix + zstd(bincode(document))
#[derive(Debug, Clone, Copy)]
pub struct ZstdArrayCodec {
    level: i32,
    max_document: u64,
}

impl ZstdArrayCodec {
    pub const fn new(level: i32) -> Self {
        Self {
            level,
            max_document: MAX_DOCUMENT_BYTES,
        }
    }

    /// Reject documents that decompress past `limit` bytes
    pub const fn with_max_document(mut self, limit: u64) -> Self {
        self.max_document = limit;
        self
    }

    pub const fn level(&self) -> i32 {
        self.level
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, ArrayError> {
        let mut serialized = Vec::new();
        zstd::stream::read::Decoder::new(compressed)?
            .take(self.max_document.saturating_add(1))
            .read_to_end(&mut serialized)?;
        if serialized.len() as u64 > self.max_document {
            return Err(ArrayError::TooLarge {
                limit: self.max_document,
            });
        }
        Ok(serialized)
    }
}

impl Default for ZstdArrayCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl ArrayCodec for ZstdArrayCodec {
    fn encode(&self, array: &NumericArray) -> Result<Vec<u8>, ArrayError> {
        let data: Vec<u8> = match array {
            NumericArray::Int64(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            NumericArray::Float64(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        };
        let document = ArrayDocument {
            dtype: array.dtype().to_string(),
            shape: vec![array.len() as u64],
            data,
        };

        let serialized = bincode::serialize(&document)?;
        let compressed = zstd::encode_all(&serialized[..], self.level)?;

        let mut blob = Vec::with_capacity(NUMERIC_PREFIX.len() + compressed.len());
        blob.extend_from_slice(NUMERIC_PREFIX);
        blob.extend_from_slice(&compressed);
        Ok(blob)
    }

    fn decode(&self, blob: &[u8]) -> Result<NumericArray, ArrayError> {
        let compressed = blob
            .strip_prefix(NUMERIC_PREFIX)
            .ok_or(ArrayError::MissingPrefix)?;
        let serialized = self.decompress(compressed)?;
        let document: ArrayDocument = bincode::deserialize(&serialized)?;

        let count = document
            .shape
            .iter()
            .try_fold(1u64, |acc, dim| acc.checked_mul(*dim));
        let expected = count.and_then(|n| n.checked_mul(8));
        if expected != Some(document.data.len() as u64) {
            return Err(ArrayError::ShapeMismatch {
                expected: expected.unwrap_or(u64::MAX),
                found: document.data.len(),
                shape: document.shape,
            });
        }

        let words = document
            .data
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                word
            });
        match document.dtype.as_str() {
            DTYPE_I64 => Ok(NumericArray::Int64(words.map(i64::from_le_bytes).collect())),
            DTYPE_F64 => Ok(NumericArray::Float64(words.map(f64::from_le_bytes).collect())),
            other => Err(ArrayError::UnsupportedDtype(other.to_string())),
        }
    }
}
