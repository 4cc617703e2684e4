//! callbridge - call registered Rust functions from a foreign host
//!
//! A host process (any runtime that can call C) looks functions up by name
//! and passes arguments as a self-describing encoded tuple. The bridge
//! checks the argument count and types, runs the function behind a fault
//! barrier and hands an encoded result tuple back, owned by the host until
//! released.
//!
//! ```
//! use callbridge::{Dispatcher, Registry, Tuple, Value};
//!
//! let registry = Registry::new();
//! registry.register("add", |a: i64, b: i64| a + b);
//!
//! let input = Tuple::from_values(&[Value::Int(3), Value::Int(4)]).unwrap();
//! let output = Dispatcher::new(&registry).dispatch("add", &input).unwrap();
//! assert_eq!(output.values().unwrap(), vec![Value::Int(7)]);
//! ```
//!
//! Inside a shipped library, functions reach the process-wide registry
//! through link-time [`INITIALIZERS`] entries, drained before the first
//! call and before the main hook runs.

// Core modules
pub mod codec;
pub mod convert;
pub mod numeric;
pub mod value;

// Calls
pub mod dispatch;
pub mod fault;
pub mod ffi;
pub mod registry;

// Process plumbing
pub mod builtins;
pub mod config;
pub mod hook;
pub mod logging;
pub mod stats;
pub mod worker;

pub use linkme;

// Re-export commonly used items
pub use codec::{decode, decode_all, encode, CodecError};
pub use config::{BridgeConfig, ConfigError};
pub use convert::{Bytes, FromValue, IntoReturns, IntoValue, Typed};
pub use dispatch::{CallError, CallResult, Dispatcher, Tuple};
pub use fault::{contain, Fault};
pub use ffi::{BridgeRequest, BridgeTuple};
pub use hook::{run_main, set_main, HookError};
pub use numeric::{ArrayCodec, ArrayError, Float64s, Int64s, NumericArray, ZstdArrayCodec};
pub use registry::{
    register, Descriptor, Initializer, IntoCallable, Registry, RegistryError, INITIALIZERS,
};
pub use stats::{stats, BridgeStats};
pub use value::{Dynamic, Record, RecordType, TypeDesc, Value};
