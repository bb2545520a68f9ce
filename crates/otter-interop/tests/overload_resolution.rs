//! Overload resolution through proxies: method calls, construction,
//! accessors and inherited members.

use otter_interop::{
    Bridge, HostClass, HostMap, HostType, HostValue, InMemoryEngine, InteropError, ScriptEngine,
    ScriptValue,
};
use std::sync::Arc;

struct Calculator {
    total: i32,
}

fn calculator() -> Arc<HostClass> {
    HostClass::builder::<Calculator>("Calculator")
        .field(
            "total",
            HostType::Int,
            |c| c.total.into(),
            |c, v| {
                c.total = v.as_i64().unwrap_or_default() as i32;
                Ok(())
            },
        )
        .method("add", [HostType::Int, HostType::Int], |_, call| {
            Ok((call.int(0)? + call.int(1)?).into())
        })
        .method("add", [HostType::String, HostType::String], |_, call| {
            Ok(format!("{}{}", call.str(0)?, call.str(1)?).into())
        })
        .method("getTotal", [], |c, _| Ok((c.total + 100).into()))
        .method("getDoubled", [], |c, _| Ok((c.total * 2).into()))
        .constructor([HostType::Int], |call| Ok(Calculator { total: call.int(0)? }))
        .static_varargs_method("sum", [HostType::array(HostType::Int)], |call| {
            let HostValue::Array(values) = call.arg(0) else {
                return Err(InteropError::host("expected an array"));
            };
            let total: i64 = values.snapshot().iter().filter_map(HostValue::as_i64).sum();
            Ok(HostValue::Long(total))
        })
        .static_field("VERSION", HostType::String, || "1.0".into())
        .build()
}

/// `proxy[name](...args)`
fn call_method(
    engine: &InMemoryEngine,
    proxy: &ScriptValue,
    name: &str,
    args: &[ScriptValue],
) -> Result<ScriptValue, InteropError> {
    let method = engine.get(proxy, &name.into())?;
    let result = engine.call(&method, proxy, args);
    engine.release(&method);
    result
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_overloads_pick_matching_types() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = calculator().instantiate(Calculator { total: 0 });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let ints = call_method(&engine, &proxy, "add", &[1.into(), 2.into()]).unwrap();
    assert_eq!(ints, ScriptValue::Integer(3));

    let strings = call_method(&engine, &proxy, "add", &["a".into(), "b".into()]).unwrap();
    assert_eq!(strings, ScriptValue::from("ab"));

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_unmatched_arguments_report_member() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = calculator().instantiate(Calculator { total: 0 });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let err = call_method(&engine, &proxy, "add", &[ScriptValue::Null, 1.into()]).unwrap_err();
    assert_eq!(err, InteropError::no_viable_overload("add"));

    engine.release(&proxy);
}

#[test]
fn test_static_varargs_are_packed() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let class = bridge
        .to_script(&engine, &HostValue::Class(calculator()))
        .unwrap();

    let total = call_method(&engine, &class, "sum", &[1.into(), 2.into(), 3.into()]).unwrap();
    assert_eq!(total, ScriptValue::Long(6));
    let empty = call_method(&engine, &class, "sum", &[]).unwrap();
    assert_eq!(empty, ScriptValue::Long(0));

    engine.release(&class);
    assert_eq!(engine.live_handles(), 0);
}

// ============================================================================
// Accessors
// ============================================================================

#[test]
fn test_field_wins_over_named_getter() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = calculator().instantiate(Calculator { total: 5 });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    assert_eq!(engine.get(&proxy, &"total".into()).unwrap(), ScriptValue::Integer(5));
    assert_eq!(engine.get(&proxy, &"doubled".into()).unwrap(), ScriptValue::Integer(10));
    assert_eq!(engine.get(&proxy, &"missing".into()).unwrap(), ScriptValue::Undefined);

    assert!(engine.set(&proxy, &"total".into(), &7.into()).unwrap());
    assert_eq!(engine.get(&proxy, &"total".into()).unwrap(), ScriptValue::Integer(7));

    engine.release(&proxy);
}

struct Settings {
    label: String,
    extra: HostMap,
}

fn settings() -> Arc<HostClass> {
    HostClass::builder::<Settings>("Settings")
        .method("setLabel", [HostType::String], |s, call| {
            s.label = format!("named:{}", call.str(0)?);
            Ok(HostValue::Null)
        })
        .method("getLabel", [], |s, _| Ok(s.label.clone().into()))
        .method("put", [HostType::String, HostType::Any], |s, call| {
            s.extra.insert(call.str(0)?, call.arg(1).clone())?;
            Ok(HostValue::Null)
        })
        .method("get", [HostType::String], |s, call| {
            Ok(s.extra.get(call.str(0)?).unwrap_or(HostValue::Null))
        })
        .build()
}

#[test]
fn test_named_setter_beats_generic_setter() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let extra = HostMap::new();
    let instance = settings().instantiate(Settings {
        label: String::new(),
        extra: extra.clone(),
    });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    assert!(engine.set(&proxy, &"label".into(), &"x".into()).unwrap());
    assert_eq!(engine.get(&proxy, &"label".into()).unwrap(), ScriptValue::from("named:x"));
    assert!(!extra.contains_key("label"));

    assert!(engine.set(&proxy, &"color".into(), &"red".into()).unwrap());
    assert_eq!(extra.get("color"), Some(HostValue::from("red")));
    assert_eq!(engine.get(&proxy, &"color".into()).unwrap(), ScriptValue::from("red"));
    assert!(engine.has(&proxy, &"color".into()).unwrap());
    assert!(!engine.has(&proxy, &"shape".into()).unwrap());

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

// ============================================================================
// Construction
// ============================================================================

struct Empty;

#[test]
fn test_construct_through_class_proxy() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let class = bridge
        .to_script(&engine, &HostValue::Class(calculator()))
        .unwrap();

    assert_eq!(engine.get(&class, &"VERSION".into()).unwrap(), ScriptValue::from("1.0"));

    let instance = engine.construct(&class, &[5.into()]).unwrap();
    assert!(instance.is_proxy());
    assert_eq!(engine.get(&instance, &"total".into()).unwrap(), ScriptValue::Integer(5));

    engine.release(&instance);
    engine.release(&class);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_construct_without_constructors_fails() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let empty = HostClass::builder::<Empty>("Empty").build();
    let class = bridge.to_script(&engine, &HostValue::Class(empty)).unwrap();

    let err = engine.construct(&class, &[]).unwrap_err();
    assert_eq!(err, InteropError::no_viable_overload("Empty"));

    engine.release(&class);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_instances_are_not_constructors() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = calculator().instantiate(Calculator { total: 1 });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let err = engine.construct(&proxy, &[]).unwrap_err();
    assert!(matches!(err, InteropError::TypeError(_)));

    engine.release(&proxy);
}

// ============================================================================
// Inheritance
// ============================================================================

struct Animal {
    name: String,
}

struct Dog {
    animal: Animal,
}

#[test]
fn test_own_overload_beats_inherited() {
    let animal = HostClass::builder::<Animal>("Animal")
        .method("describe", [HostType::Any], |a, _| Ok(format!("animal {}", a.name).into()))
        .method("getName", [], |a, _| Ok(a.name.clone().into()))
        .build();
    let dog = HostClass::builder::<Dog>("Dog")
        .extends(&animal, |d| &d.animal, |d| &mut d.animal)
        .method("describe", [HostType::Any], |d, _| {
            Ok(format!("dog {}", d.animal.name).into())
        })
        .build();

    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = dog.instantiate(Dog {
        animal: Animal {
            name: "Rex".to_string(),
        },
    });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let described = call_method(&engine, &proxy, "describe", &[1.into()]).unwrap();
    assert_eq!(described, ScriptValue::from("dog Rex"));
    assert_eq!(engine.get(&proxy, &"name".into()).unwrap(), ScriptValue::from("Rex"));

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}
