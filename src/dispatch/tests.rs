//! Dispatcher tests

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::numeric::{ArrayError, Int64s, NumericArray};
use crate::registry::Descriptor;

fn registry() -> Registry {
    let registry = Registry::new();
    registry.register("add", |a: i64, b: i64| a + b);
    registry.register("one_arg", |s: String| s.len() as i64);
    registry.register("sqrt", |n: i64| {
        if n < 0 {
            panic!("cannot take the square root of {}", n);
        }
        (n as f64).sqrt()
    });
    registry.register("divmod", |a: i64, b: i64| (a / b, a % b));
    registry.register("nothing", || ());
    registry
}

fn tuple(values: &[Value]) -> Tuple {
    Tuple::from_values(values).unwrap()
}

#[test]
fn test_add() {
    let registry = registry();
    let dispatcher = Dispatcher::new(&registry);
    let output = dispatcher
        .dispatch("add", &tuple(&[Value::Int(3), Value::Int(4)]))
        .unwrap();
    assert_eq!(output.count(), 1);
    assert_eq!(output.decode(&[TypeDesc::Int]).unwrap(), vec![Value::Int(7)]);
}

#[test]
fn test_missing_function() {
    let registry = registry();
    let err = Dispatcher::new(&registry)
        .dispatch("missing_fn", &Tuple::empty())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("missing_fn"));
    assert!(message.contains("not found"));
}

#[test]
fn test_arity_mismatch_cites_both_counts() {
    let registry = registry();
    let err = Dispatcher::new(&registry)
        .dispatch("one_arg", &Tuple::empty())
        .unwrap_err();
    assert!(matches!(err, CallError::Arity { expected: 1, got: 0 }));
    assert_eq!(
        err.to_string(),
        "callbridge: wrong number of arguments: got 0, want 1"
    );
}

#[test]
fn test_arity_mismatch_never_invokes() {
    let calls = std::sync::Arc::new(AtomicUsize::new(0));
    let registry = Registry::new();
    let counter = calls.clone();
    registry.register("counted", move |n: i64| {
        counter.fetch_add(1, Ordering::SeqCst);
        n
    });
    let dispatcher = Dispatcher::new(&registry);

    for values in [vec![], vec![Value::Int(1), Value::Int(2)]] {
        assert!(dispatcher.dispatch("counted", &tuple(&values)).is_err());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    dispatcher.dispatch("counted", &tuple(&[Value::Int(1)])).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fault_then_next_call_succeeds() {
    let registry = registry();
    let dispatcher = Dispatcher::new(&registry);

    let err = dispatcher
        .dispatch("sqrt", &tuple(&[Value::Int(-4)]))
        .unwrap_err();
    assert!(err.is_fault());
    let message = err.to_string();
    assert!(message.starts_with("callbridge: panic during call to \"sqrt\""));
    assert!(message.contains("cannot take the square root of -4"));

    let output = dispatcher
        .dispatch("sqrt", &tuple(&[Value::Int(16)]))
        .unwrap();
    assert_eq!(output.values().unwrap(), vec![Value::Float(4.0)]);
    let output = dispatcher
        .dispatch("add", &tuple(&[Value::Int(1), Value::Int(1)]))
        .unwrap();
    assert_eq!(output.values().unwrap(), vec![Value::Int(2)]);
}

#[test]
fn test_decode_error_cites_position() {
    let registry = registry();
    let err = Dispatcher::new(&registry)
        .dispatch("add", &tuple(&[Value::Int(1), Value::Str("2".into())]))
        .unwrap_err();
    assert!(matches!(err, CallError::Decode { position: 1, .. }));
    assert_eq!(
        err.to_string(),
        "callbridge: error decoding argument 1: type mismatch: expected int, found str"
    );
}

#[test]
fn test_count_disagreeing_with_payload() {
    let registry = registry();
    let dispatcher = Dispatcher::new(&registry);

    // Count says two, payload holds three
    let payload = codec::encode(&[Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap();
    let err = dispatcher.dispatch_bytes("add", 2, &payload).unwrap_err();
    assert!(matches!(err, CallError::Payload(CodecError::TrailingBytes(_))));

    // Count says two, payload holds one
    let payload = codec::encode(&[Value::Int(1)]).unwrap();
    let err = dispatcher.dispatch_bytes("add", 2, &payload).unwrap_err();
    assert!(matches!(err, CallError::Decode { position: 1, .. }));
}

#[test]
fn test_multiple_and_empty_returns() {
    let registry = registry();
    let dispatcher = Dispatcher::new(&registry);

    let output = dispatcher
        .dispatch("divmod", &tuple(&[Value::Int(17), Value::Int(5)]))
        .unwrap();
    assert_eq!(output.values().unwrap(), vec![Value::Int(3), Value::Int(2)]);

    let output = dispatcher.dispatch("nothing", &Tuple::empty()).unwrap();
    assert!(output.is_empty());
}

#[test]
fn test_conversion_failure_is_a_decode_error() {
    let registry = Registry::new();
    registry.register("small", |n: u8| u64::from(n) * 2);
    let err = Dispatcher::new(&registry)
        .dispatch("small", &tuple(&[Value::Uint(300)]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "callbridge: error decoding argument 0: 300 out of range for u8"
    );
}

#[test]
fn test_float_overflow_is_a_decode_error() {
    let registry = Registry::new();
    registry.register("widen", |x: f32| f64::from(x));
    let dispatcher = Dispatcher::new(&registry);

    let err = dispatcher
        .dispatch("widen", &tuple(&[Value::Float(1e300)]))
        .unwrap_err();
    assert!(matches!(err, CallError::Decode { position: 0, .. }));
    assert_eq!(
        err.to_string(),
        "callbridge: error decoding argument 0: 1e300 out of range for f32"
    );

    let output = dispatcher
        .dispatch("widen", &tuple(&[Value::Float(0.25)]))
        .unwrap();
    assert_eq!(output.values().unwrap(), vec![Value::Float(0.25)]);
}

#[test]
fn test_tuple_decode_checks_type_count() {
    let output = tuple(&[Value::Int(1), Value::Int(2)]);
    let err = output.decode(&[TypeDesc::Int]).unwrap_err();
    assert!(matches!(err, CodecError::TypeCount { count: 2, types: 1 }));
    assert_eq!(err.to_string(), "tuple declares 2 values, 1 target types given");
}

#[test]
fn test_encode_error_cites_position() {
    let registry = Registry::new();
    registry.register_descriptor(Descriptor::new(
        "liar",
        vec![],
        vec![TypeDesc::Int, TypeDesc::Int],
        Box::new(|_| Ok(vec![Value::Int(1), Value::Str("two".into())])),
    ));
    registry.register_descriptor(Descriptor::new(
        "float_keys",
        vec![],
        vec![TypeDesc::Any],
        Box::new(|_| {
            let map = Value::Map(vec![(Value::Float(1.0), Value::Int(1))]);
            Ok(vec![Value::Any(Box::new(crate::value::Dynamic::new("map", map)))])
        }),
    ));
    registry.register_descriptor(Descriptor::new(
        "short",
        vec![],
        vec![TypeDesc::Int],
        Box::new(|_| Ok(vec![])),
    ));
    let dispatcher = Dispatcher::new(&registry);

    let err = dispatcher.dispatch("liar", &Tuple::empty()).unwrap_err();
    assert!(matches!(err, CallError::Encode { position: 1, .. }));
    assert!(err.to_string().starts_with("callbridge: error encoding return 1:"));

    let err = dispatcher.dispatch("float_keys", &Tuple::empty()).unwrap_err();
    assert!(matches!(
        err,
        CallError::Encode {
            position: 0,
            source: CodecError::UnsupportedKey(_)
        }
    ));

    let err = dispatcher.dispatch("short", &Tuple::empty()).unwrap_err();
    assert!(matches!(err, CallError::Results { expected: 1, got: 0 }));
}

struct FailingArrays;

impl ArrayCodec for FailingArrays {
    fn encode(&self, _array: &NumericArray) -> Result<Vec<u8>, ArrayError> {
        Err(ArrayError::UnsupportedDtype("<i8".to_string()))
    }

    fn decode(&self, _bytes: &[u8]) -> Result<NumericArray, ArrayError> {
        Err(ArrayError::MissingPrefix)
    }
}

#[test]
fn test_array_codec_errors_propagate() {
    let registry = Registry::new();
    registry.register("counts", || Int64s(vec![1, 2, 3]));
    registry.register("total", |counts: Int64s| counts.iter().sum::<i64>());

    let dispatcher = Dispatcher::with_arrays(&registry, std::sync::Arc::new(FailingArrays));
    let err = dispatcher.dispatch("counts", &Tuple::empty()).unwrap_err();
    assert!(matches!(
        err,
        CallError::Encode {
            source: CodecError::Array(ArrayError::UnsupportedDtype(_)),
            ..
        }
    ));

    let input = tuple(&[Value::Int64s(Int64s(vec![4, 5]))]);
    let err = dispatcher.dispatch("total", &input).unwrap_err();
    assert!(matches!(
        err,
        CallError::Decode {
            position: 0,
            source: CodecError::Array(ArrayError::MissingPrefix)
        }
    ));

    let output = Dispatcher::new(&registry).dispatch("total", &input).unwrap();
    assert_eq!(output.values().unwrap(), vec![Value::Int(9)]);
}

#[test]
fn test_failures_are_counted() {
    let registry = registry();
    let dispatcher = Dispatcher::new(&registry);
    let before = stats::stats();
    let _ = dispatcher.dispatch("sqrt", &tuple(&[Value::Int(-1)]));
    let after = stats::stats();
    assert!(after.calls > before.calls);
    assert!(after.faults > before.faults);
}
