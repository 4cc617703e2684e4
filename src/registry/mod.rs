//! Function registry
//!
//! Maps names to callable descriptors. Registration is expected during
//! process or module initialization; dispatch afterwards only reads. A
//! duplicate or malformed registration is a wiring bug and panics
//! immediately instead of surfacing as a call error later.
//!
//! Crates linked into the host library register through [`INITIALIZERS`],
//! a link-time table drained into the process-wide registry on first use:
//!
//! ```ignore
//! use callbridge::linkme::distributed_slice;
//! use callbridge::{Initializer, Registry, INITIALIZERS};
//!
//! #[distributed_slice(INITIALIZERS)]
//! #[linkme(crate = callbridge::linkme)]
//! static GEOMETRY: Initializer = Initializer {
//!     name: "geometry",
//!     init: |registry: &Registry| registry.register("geometry.Area", |w: f64, h: f64| w * h),
//! };
//! ```

mod callable;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

pub use callable::IntoCallable;

use crate::dispatch::CallError;
use crate::value::{TypeDesc, Value};

/// Invocation entry point stored in a descriptor
pub type Invoke = Box<dyn Fn(Vec<Value>) -> Result<Vec<Value>, CallError> + Send + Sync>;

/// Registration failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("callbridge: duplicate registration for name: {0}")]
    Duplicate(String),

    #[error("callbridge: {name:?} is not callable: {reason}")]
    NotCallable { name: String, reason: String },
}

/// Registered function: name, signature and entry point
pub struct Descriptor {
    name: String,
    params: Vec<TypeDesc>,
    returns: Vec<TypeDesc>,
    invoke: Invoke,
}

impl Descriptor {
    /// Descriptor for a dynamically typed entry point
    pub fn new(
        name: impl Into<String>,
        params: Vec<TypeDesc>,
        returns: Vec<TypeDesc>,
        invoke: Invoke,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            invoke,
        }
    }

    /// Descriptor for a typed Rust function
    pub fn from_fn<Args, F: IntoCallable<Args>>(name: &str, f: F) -> Self {
        f.into_descriptor(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    pub fn returns(&self) -> &[TypeDesc] {
        &self.returns
    }

    /// Run the entry point; no fault barrier here
    pub fn invoke(&self, args: Vec<Value>) -> Result<Vec<Value>, CallError> {
        (self.invoke)(args)
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let not_callable = |reason: String| RegistryError::NotCallable {
            name: self.name.clone(),
            reason,
        };
        if self.name.is_empty() {
            return Err(not_callable("name is empty".to_string()));
        }
        if self.name.contains('\0') {
            return Err(not_callable("name contains a NUL byte".to_string()));
        }
        for (i, ty) in self.params.iter().enumerate() {
            ty.validate()
                .map_err(|reason| not_callable(format!("parameter {}: {}", i, reason)))?;
        }
        for (i, ty) in self.returns.iter().enumerate() {
            ty.validate()
                .map_err(|reason| not_callable(format!("return {}: {}", i, reason)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, ty) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", ty)?;
        }
        f.write_str(")")?;
        match self.returns.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " -> {}", single),
            many => {
                f.write_str(" -> (")?;
                for (i, ty) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Name -> descriptor table
#[derive(Default)]
pub struct Registry {
    functions: RwLock<HashMap<String, Arc<Descriptor>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed function.
    ///
    /// # Panics
    /// On a duplicate name or an unsupported signature.
    pub fn register<Args, F: IntoCallable<Args>>(&self, name: &str, f: F) {
        self.register_descriptor(f.into_descriptor(name));
    }

    /// Register a typed function, reporting failures
    pub fn try_register<Args, F: IntoCallable<Args>>(
        &self,
        name: &str,
        f: F,
    ) -> Result<(), RegistryError> {
        self.try_register_descriptor(f.into_descriptor(name))
    }

    /// Register a prepared descriptor.
    ///
    /// # Panics
    /// On a duplicate name or an unsupported signature.
    pub fn register_descriptor(&self, descriptor: Descriptor) {
        if let Err(err) = self.try_register_descriptor(descriptor) {
            panic!("{}", err);
        }
    }

    /// Register a prepared descriptor, reporting failures
    pub fn try_register_descriptor(&self, descriptor: Descriptor) -> Result<(), RegistryError> {
        self.try_register_all(vec![descriptor])
    }

    /// Register a group of descriptors.
    ///
    /// # Panics
    /// On a duplicate name or an unsupported signature; nothing from the
    /// group is registered then.
    pub fn register_all(&self, descriptors: Vec<Descriptor>) {
        if let Err(err) = self.try_register_all(descriptors) {
            panic!("{}", err);
        }
    }

    /// Register a group of descriptors under one write lock: either every
    /// descriptor is registered or none is
    pub fn try_register_all(&self, descriptors: Vec<Descriptor>) -> Result<(), RegistryError> {
        for descriptor in &descriptors {
            descriptor.validate()?;
        }

        let mut functions = self.functions.write();
        {
            let mut names = HashSet::with_capacity(descriptors.len());
            for descriptor in &descriptors {
                if functions.contains_key(descriptor.name()) || !names.insert(descriptor.name()) {
                    return Err(RegistryError::Duplicate(descriptor.name.clone()));
                }
            }
        }
        for descriptor in descriptors {
            debug!(
                function = %descriptor.name,
                params = descriptor.params.len(),
                returns = descriptor.returns.len(),
                "function registered"
            );
            functions.insert(descriptor.name.clone(), Arc::new(descriptor));
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Descriptor>> {
        self.functions.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.read().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Link-time registration entry
pub struct Initializer {
    /// Label used in logs
    pub name: &'static str,
    /// Registers functions on the registry passed in. It may also override
    /// the main hook. The process-wide registry is still being built while
    /// this runs and must not be touched.
    pub init: fn(&Registry),
}

/// Initializers contributed by every crate linked into the library
#[distributed_slice]
pub static INITIALIZERS: [Initializer] = [..];

static GLOBAL: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for initializer in INITIALIZERS {
        debug!(initializer = initializer.name, "running initializer");
        (initializer.init)(&registry);
    }
    registry
});

/// Process-wide registry served by the C ABI, filled by [`INITIALIZERS`]
/// on first access
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Register a typed function in the process-wide registry.
///
/// # Panics
/// On a duplicate name or an unsupported signature.
pub fn register<Args, F: IntoCallable<Args>>(name: &str, f: F) {
    global().register(name, f);
}
