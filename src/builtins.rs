//! Stock functions for smoke-testing a host binding

use crate::numeric::Int64s;
use crate::registry::{Descriptor, Registry, RegistryError};

/// Descriptors of the stock functions
pub fn builtins() -> Vec<Descriptor> {
    vec![
        Descriptor::from_fn("math.Abs", f64::abs),
        Descriptor::from_fn("strings.Contains", |s: String, substr: String| {
            s.contains(&substr)
        }),
        Descriptor::from_fn("strings.HasPrefix", |s: String, prefix: String| {
            s.starts_with(&prefix)
        }),
        Descriptor::from_fn("strings.HasSuffix", |s: String, suffix: String| {
            s.ends_with(&suffix)
        }),
        Descriptor::from_fn("counting.Max", |counts: Int64s| counts.max()),
        Descriptor::from_fn("counting.Add", |mut counts: Int64s, other: Int64s| {
            counts.add(&other);
            counts
        }),
    ]
}

/// Register the stock functions on `registry`.
///
/// # Panics
/// If any of the names is already registered; none are registered then.
pub fn register_builtins(registry: &Registry) {
    registry.register_all(builtins());
}

/// Register the stock functions, all or none
pub fn try_register_builtins(registry: &Registry) -> Result<(), RegistryError> {
    registry.try_register_all(builtins())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Dispatcher, Tuple};
    use crate::value::Value;

    fn call(registry: &Registry, name: &str, args: &[Value]) -> Vec<Value> {
        let input = Tuple::from_values(args).unwrap();
        Dispatcher::new(registry)
            .dispatch(name, &input)
            .unwrap()
            .values()
            .unwrap()
    }

    #[test]
    fn test_builtins() {
        let registry = Registry::new();
        register_builtins(&registry);

        assert_eq!(call(&registry, "math.Abs", &[Value::Float(-2.5)]), vec![Value::Float(2.5)]);
        let s = |v: &str| Value::Str(v.to_string());
        assert_eq!(
            call(&registry, "strings.Contains", &[s("seafood"), s("foo")]),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            call(&registry, "strings.HasPrefix", &[s("golang"), s("go")]),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            call(&registry, "strings.HasSuffix", &[s("golang"), s("go")]),
            vec![Value::Bool(false)]
        );
    }

    #[test]
    fn test_counting() {
        let registry = Registry::new();
        register_builtins(&registry);

        let counts = Value::Int64s(Int64s(vec![3, 9, 4]));
        assert_eq!(call(&registry, "counting.Max", &[counts]), vec![Value::Int(9)]);
        assert_eq!(
            call(&registry, "counting.Max", &[Value::Int64s(Int64s::default())]),
            vec![Value::Int(-1)]
        );
        assert_eq!(
            call(
                &registry,
                "counting.Add",
                &[
                    Value::Int64s(Int64s(vec![1, 2])),
                    Value::Int64s(Int64s(vec![10, 20, 30])),
                ]
            ),
            vec![Value::Int64s(Int64s(vec![11, 22, 30]))]
        );
    }

    #[test]
    fn test_conflict_registers_nothing() {
        let registry = Registry::new();
        registry.register("counting.Max", |counts: Int64s| counts.len() as i64);

        assert_eq!(
            try_register_builtins(&registry),
            Err(RegistryError::Duplicate("counting.Max".to_string()))
        );
        assert!(!registry.contains("math.Abs"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[should_panic(expected = "math.Abs")]
    fn test_registering_twice_panics() {
        let registry = Registry::new();
        register_builtins(&registry);
        register_builtins(&registry);
    }
}
