//! Tuple codec and dispatch benchmarks
//!
//! Measures encoding, typed decoding and a full dispatch round trip.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use callbridge::{decode, encode, Dispatcher, Int64s, Registry, Tuple, TypeDesc, Value};

fn generate_list(n: usize) -> Value {
    Value::List((0..n).map(|i| Value::Int(i as i64 * 31 - 500)).collect())
}

fn generate_map(n: usize) -> Value {
    Value::Map(
        (0..n)
            .map(|i| (Value::Str(format!("key{}", i)), Value::Float(i as f64 * 0.5)))
            .collect(),
    )
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("list", size), size, |b, &size| {
            let values = vec![generate_list(size)];
            b.iter(|| encode(black_box(&values)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("map", size), size, |b, &size| {
            let values = vec![generate_map(size)];
            b.iter(|| encode(black_box(&values)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("int64s", size), size, |b, &size| {
            let values = vec![Value::Int64s(Int64s((0..size as i64).collect()))];
            b.iter(|| encode(black_box(&values)).unwrap());
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("list", size), size, |b, &size| {
            let bytes = encode(&[generate_list(size)]).unwrap();
            let types = [TypeDesc::list(TypeDesc::Int)];
            b.iter(|| decode(black_box(&bytes), &types).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("map", size), size, |b, &size| {
            let bytes = encode(&[generate_map(size)]).unwrap();
            let types = [TypeDesc::map(TypeDesc::Str, TypeDesc::Float)];
            b.iter(|| decode(black_box(&bytes), &types).unwrap());
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let registry = Registry::new();
    registry.register("add", |a: i64, b: i64| a + b);
    registry.register("sum", |values: Vec<i64>| values.iter().sum::<i64>());
    let dispatcher = Dispatcher::new(&registry);

    let add = Tuple::from_values(&[Value::Int(3), Value::Int(4)]).unwrap();
    c.bench_function("dispatch_add", |b| {
        b.iter(|| dispatcher.dispatch("add", black_box(&add)).unwrap())
    });

    let sum = Tuple::from_values(&[generate_list(1000)]).unwrap();
    c.bench_function("dispatch_sum_1000", |b| {
        b.iter(|| dispatcher.dispatch("sum", black_box(&sum)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_dispatch);
criterion_main!(benches);
