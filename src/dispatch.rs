//! Call dispatch
//!
//! Resolves a function by name, checks the argument count, decodes the
//! arguments with the declared parameter types, invokes the function behind
//! the fault barrier and encodes its results.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::codec::{self, CodecError, Decoder, Encoder};
use crate::fault::{self, Fault};
use crate::numeric::ArrayCodec;
use crate::registry::{Descriptor, Registry};
use crate::stats;
use crate::value::{TypeDesc, Value};

/// Outcome of one call: the result tuple or the error, never both
pub type CallResult = Result<Tuple, CallError>;

/// Encoded values plus their count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple {
    count: usize,
    payload: Vec<u8>,
}

impl Tuple {
    pub fn new(count: usize, payload: Vec<u8>) -> Self {
        Self { count, payload }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Encode `values` with the default array codec
    pub fn from_values(values: &[Value]) -> Result<Self, CodecError> {
        Ok(Self::new(values.len(), codec::encode(values)?))
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.payload.is_empty()
    }

    /// Decode with one target type per value
    pub fn decode(&self, types: &[TypeDesc]) -> Result<Vec<Value>, CodecError> {
        if types.len() != self.count {
            return Err(CodecError::TypeCount {
                count: self.count,
                types: types.len(),
            });
        }
        codec::decode(&self.payload, types)
    }

    /// Decode using only the tags in the payload
    pub fn values(&self) -> Result<Vec<Value>, CodecError> {
        codec::decode_all(&self.payload, self.count)
    }
}

/// Call-level errors, reported to the host as strings
#[derive(Debug, Error)]
pub enum CallError {
    #[error("callbridge: function {name:?} not found (did you register it?)")]
    NotFound { name: String },

    #[error("callbridge: wrong number of arguments: got {got}, want {expected}")]
    Arity { expected: usize, got: usize },

    #[error("callbridge: error decoding argument {position}: {source}")]
    Decode { position: usize, source: CodecError },

    #[error("callbridge: malformed argument tuple: {0}")]
    Payload(#[source] CodecError),

    #[error(transparent)]
    Fault(#[from] Fault),

    #[error("callbridge: function returned {got} values, declared {expected}")]
    Results { expected: usize, got: usize },

    #[error("callbridge: error encoding return {position}: {source}")]
    Encode { position: usize, source: CodecError },

    #[error("callbridge: invalid request: {0}")]
    InvalidRequest(String),
}

impl CallError {
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

/// Dispatches calls against one registry
pub struct Dispatcher<'r> {
    registry: &'r Registry,
    arrays: Arc<dyn ArrayCodec>,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_arrays(registry, Arc::new(codec::default_arrays()))
    }

    /// Dispatcher with a replacement numeric array codec
    pub fn with_arrays(registry: &'r Registry, arrays: Arc<dyn ArrayCodec>) -> Self {
        Self { registry, arrays }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn dispatch(&self, name: &str, input: &Tuple) -> CallResult {
        self.dispatch_bytes(name, input.count(), input.payload())
    }

    /// Dispatch from a borrowed argument payload
    pub fn dispatch_bytes(&self, name: &str, count: usize, payload: &[u8]) -> CallResult {
        let counters = stats::counters();
        counters.record_call(payload.len());

        let result = self.call(name, count, payload);
        match &result {
            Ok(output) => {
                counters.record_success(output.payload().len());
                trace!(
                    function = name,
                    results = output.count(),
                    bytes = output.payload().len(),
                    "call returned"
                );
            }
            Err(err) => {
                counters.record_failure(err.is_fault());
                warn!(function = name, error = %err, "call failed");
            }
        }
        result
    }

    fn call(&self, name: &str, count: usize, payload: &[u8]) -> CallResult {
        let descriptor = self
            .registry
            .lookup(name)
            .ok_or_else(|| CallError::NotFound {
                name: name.to_string(),
            })?;

        let params = descriptor.params();
        if count != params.len() {
            return Err(CallError::Arity {
                expected: params.len(),
                got: count,
            });
        }
        debug!(function = name, args = count, bytes = payload.len(), "dispatching call");

        let args = self.decode_args(params, payload)?;
        let returns = fault::contain(name, || descriptor.invoke(args))??;
        self.encode_returns(&descriptor, &returns)
    }

    fn decode_args(&self, params: &[TypeDesc], payload: &[u8]) -> Result<Vec<Value>, CallError> {
        let mut decoder = Decoder::new(payload, self.arrays.as_ref());
        let mut args = Vec::with_capacity(params.len());
        for (position, ty) in params.iter().enumerate() {
            let arg = decoder
                .read_value(ty)
                .map_err(|source| CallError::Decode { position, source })?;
            args.push(arg);
        }
        decoder.finish().map_err(CallError::Payload)?;
        Ok(args)
    }

    fn encode_returns(&self, descriptor: &Descriptor, values: &[Value]) -> CallResult {
        let declared = descriptor.returns();
        if values.len() != declared.len() {
            return Err(CallError::Results {
                expected: declared.len(),
                got: values.len(),
            });
        }

        let mut encoder = Encoder::new(self.arrays.as_ref());
        for (position, (value, ty)) in values.iter().zip(declared).enumerate() {
            if !value.conforms_to(ty) {
                return Err(CallError::Encode {
                    position,
                    source: CodecError::KindMismatch {
                        expected: ty.to_string(),
                        found: value.type_name(),
                    },
                });
            }
            encoder
                .write_value(value)
                .map_err(|source| CallError::Encode { position, source })?;
        }
        Ok(Tuple::new(values.len(), encoder.finish()))
    }
}

#[cfg(test)]
mod tests;
