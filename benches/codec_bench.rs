//! Criterion benchmark untuk WireCodec
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use parcel::protocol::{Record, Schema, SchemaRegistry, TypeDescriptor, Value, WireCodec};

fn codec() -> WireCodec {
    let mut registry = SchemaRegistry::new();
    registry
        .register(Schema::new("Entity").field("id", TypeDescriptor::Int64))
        .and_then(|r| {
            r.register(
                Schema::new("Order")
                    .field("symbol", TypeDescriptor::String)
                    .field("price", TypeDescriptor::Double)
                    .field("qty", TypeDescriptor::Int32)
                    .field("flags", TypeDescriptor::array(TypeDescriptor::Bool))
                    .extends("Entity"),
            )
        })
        .unwrap();
    WireCodec::new(registry)
}

fn order(i: i64) -> Value {
    Value::object(Record::new(
        "Order",
        vec![
            Value::from("ACME"),
            Value::Double(101.25),
            Value::Int32(500),
            Value::Array((0..13).map(|b| Value::Bool(b % 3 == 0)).collect()),
            Value::Int64(i),
        ],
    ))
}

fn bench_object(c: &mut Criterion) {
    let codec = codec();
    let descriptor = TypeDescriptor::composite("Order");
    let value = order(42);
    let bytes = codec.encode(&value, &descriptor).unwrap();

    let mut group = c.benchmark_group("object");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("size", |b| {
        b.iter(|| codec.size(black_box(&value), &descriptor).unwrap());
    });

    group.bench_function("encode", |b| {
        b.iter(|| codec.encode(black_box(&value), &descriptor).unwrap());
    });

    group.bench_function("decode", |b| {
        b.iter(|| codec.decode_exact(black_box(&bytes), &descriptor).unwrap());
    });

    group.finish();
}

fn bench_arrays(c: &mut Criterion) {
    let codec = codec();
    let mut group = c.benchmark_group("arrays");

    for len in [100usize, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*len as u64));

        let bools = Value::Array((0..*len).map(|i| Value::Bool(i % 2 == 0)).collect());
        let bool_desc = TypeDescriptor::array(TypeDescriptor::Bool);
        group.bench_function(format!("bool_{}", len), |b| {
            b.iter(|| codec.encode(black_box(&bools), &bool_desc).unwrap());
        });

        let orders = Value::Array((0..*len as i64).map(order).collect());
        let order_desc = TypeDescriptor::array(TypeDescriptor::composite("Order"));
        group.bench_function(format!("orders_{}", len), |b| {
            b.iter(|| codec.encode(black_box(&orders), &order_desc).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_object, bench_arrays);
criterion_main!(benches);
