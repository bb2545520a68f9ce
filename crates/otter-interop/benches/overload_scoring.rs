//! Overload resolution and proxy dispatch benchmarks
//!
//! Run with: cargo bench -p otter-interop

use criterion::{Criterion, criterion_group, criterion_main};
use otter_interop::descriptor::ProxyMode;
use otter_interop::scorer::{self, Invocation};
use otter_interop::{
    Bridge, HostClass, HostType, HostValue, InMemoryEngine, ScriptEngine, ScriptValue,
};
use std::hint::black_box;
use std::sync::Arc;

struct Vector {
    x: f64,
    y: f64,
}

fn vector_class() -> Arc<HostClass> {
    HostClass::builder::<Vector>("Vector")
        .field(
            "x",
            HostType::Double,
            |v| v.x.into(),
            |v, value| {
                v.x = value.as_f64().unwrap_or_default();
                Ok(())
            },
        )
        .method("scale", [HostType::Int], |v, call| {
            Ok((v.x * f64::from(call.int(0)?)).into())
        })
        .method("scale", [HostType::Double], |v, call| Ok((v.x * call.double(0)?).into()))
        .method("scale", [HostType::Double, HostType::Double], |v, call| {
            Ok((v.x * call.double(0)? + v.y * call.double(1)?).into())
        })
        .method("scale", [HostType::String], |_, _| Ok(HostValue::Null))
        .method("getLength", [], |v, _| Ok(v.x.hypot(v.y).into()))
        .build()
}

/// Benchmark: ranking a four-way overload set against two argument shapes
fn bench_rank_overloads(c: &mut Criterion) {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let class = vector_class();
    let target = class.instantiate(Vector { x: 3.0, y: 4.0 });
    let descriptor = bridge.descriptor(&class, ProxyMode::Object);
    let Some(scales) = descriptor.methods("scale") else {
        return;
    };
    let cx = Invocation::new(&engine, &bridge, "scale").with_target(&target);

    let ints = scorer::virtual_arguments(&[ScriptValue::Integer(2)]);
    c.bench_function("rank_scale_int", |b| {
        b.iter(|| scorer::rank(black_box(scales), black_box(&ints), &cx).unwrap())
    });

    let doubles = scorer::virtual_arguments(&[ScriptValue::Double(0.5), ScriptValue::Double(2.0)]);
    c.bench_function("execute_scale_two_doubles", |b| {
        b.iter(|| scorer::execute(black_box(scales), black_box(&doubles), &cx).unwrap())
    });
}

/// Benchmark: full trap round trip for field reads and getter calls
fn bench_proxy_get(c: &mut Criterion) {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let class = vector_class();
    let instance = class.instantiate(Vector { x: 3.0, y: 4.0 });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let x = ScriptValue::from("x");
    c.bench_function("proxy_get_field", |b| {
        b.iter(|| engine.get(black_box(&proxy), black_box(&x)).unwrap())
    });

    let length = ScriptValue::from("length");
    c.bench_function("proxy_get_named_getter", |b| {
        b.iter(|| engine.get(black_box(&proxy), black_box(&length)).unwrap())
    });

    engine.release(&proxy);
}

criterion_group!(benches, bench_rank_overloads, bench_proxy_get);
criterion_main!(benches);
