//! Trap behavior of reflection, collection, map and direct proxies.

use otter_interop::host::ArrayData;
use otter_interop::{
    BuiltinPrototype, Bridge, BridgeConfig, CallbackContext, DirectProxy, DirectTarget, HostArray,
    HostClass, HostList, HostMap, HostType, HostValue, InMemoryEngine, InteropResult,
    ScriptEngine, ScriptSymbol, ScriptValue,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

struct Person {
    name: String,
    age: i32,
}

fn person() -> Arc<HostClass> {
    HostClass::builder::<Person>("Person")
        .final_field("name", HostType::String, |p| p.name.clone().into())
        .method("getAge", [], |p, _| Ok(p.age.into()))
        .method("getURL", [], |p, _| Ok(format!("https://example.org/{}", p.name).into()))
        .method("greet", [HostType::String], |p, call| {
            Ok(format!("{}, {}", call.str(0)?, p.name).into())
        })
        .build()
}

fn collections_bridge() -> Bridge {
    Bridge::with_config(BridgeConfig::proxy_collections())
}

fn keys(engine: &InMemoryEngine, proxy: &ScriptValue) -> Vec<String> {
    engine
        .own_keys(proxy)
        .unwrap()
        .iter()
        .map(ScriptValue::to_display_string)
        .collect()
}

// ============================================================================
// Reflection proxies
// ============================================================================

#[test]
fn test_own_keys_are_stable() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = person().instantiate(Person {
        name: "Ada".to_string(),
        age: 36,
    });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let first = keys(&engine, &proxy);
    assert_eq!(first, ["name", "age", "urL"]);
    assert_eq!(keys(&engine, &proxy), first);

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_final_field_rejects_writes() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = person().instantiate(Person {
        name: "Ada".to_string(),
        age: 36,
    });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    assert!(!engine.set(&proxy, &"name".into(), &"Bob".into()).unwrap());
    assert_eq!(engine.get(&proxy, &"name".into()).unwrap(), ScriptValue::from("Ada"));
    assert!(!engine.delete(&proxy, &"name".into()).unwrap());

    engine.release(&proxy);
}

#[test]
fn test_descriptor_and_prototype() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = person().instantiate(Person {
        name: "Ada".to_string(),
        age: 36,
    });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let descriptor = engine
        .get_own_property_descriptor(&proxy, &"age".into())
        .unwrap();
    assert_eq!(engine.get(&descriptor, &"value".into()).unwrap(), ScriptValue::Integer(36));
    assert_eq!(engine.get(&descriptor, &"writable".into()).unwrap(), ScriptValue::Boolean(true));
    engine.release(&descriptor);

    let missing = engine
        .get_own_property_descriptor(&proxy, &"nope".into())
        .unwrap();
    assert_eq!(missing, ScriptValue::Undefined);

    let prototype = engine.get_prototype_of(&proxy).unwrap();
    let object = engine.prototype_of(BuiltinPrototype::Object).unwrap();
    assert_eq!(prototype, object);
    engine.release(&prototype);
    engine.release(&object);

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_method_reads_receiver_state() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let instance = person().instantiate(Person {
        name: "Ada".to_string(),
        age: 36,
    });
    let proxy = bridge.to_script(&engine, &instance).unwrap();

    let greet = engine.get(&proxy, &"greet".into()).unwrap();
    assert!(greet.is_function());
    let greeting = engine.call(&greet, &proxy, &["Hello".into()]).unwrap();
    assert_eq!(greeting, ScriptValue::from("Hello, Ada"));

    engine.release(&greet);
    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn test_primitive_array_delete_is_noop() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let ints = HostValue::Array(HostArray::new(ArrayData::Int(vec![1, 2, 3])));
    let proxy = bridge.to_script(&engine, &ints).unwrap();

    assert!(!engine.delete(&proxy, &"0".into()).unwrap());
    assert_eq!(engine.get(&proxy, &"0".into()).unwrap(), ScriptValue::Integer(1));
    assert_eq!(engine.get(&proxy, &"length".into()).unwrap(), ScriptValue::Integer(3));

    engine.release(&proxy);
}

#[test]
fn test_object_array_delete_nulls_slot() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let array = HostArray::new(ArrayData::Object(vec![HostValue::Int(1), "x".into()]));
    let proxy = bridge
        .to_script(&engine, &HostValue::Array(array.clone()))
        .unwrap();

    assert!(engine.delete(&proxy, &"1".into()).unwrap());
    assert_eq!(engine.get(&proxy, &"1".into()).unwrap(), ScriptValue::Null);
    assert_eq!(array.get(1), Some(HostValue::Null));
    assert_eq!(array.len(), 2);

    engine.release(&proxy);
}

#[test]
fn test_typed_array_writes_coerce() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let array = HostArray::new(ArrayData::Int(vec![0, 0]));
    let proxy = bridge
        .to_script(&engine, &HostValue::Array(array.clone()))
        .unwrap();

    assert!(engine.set(&proxy, &"1".into(), &ScriptValue::Double(4.0)).unwrap());
    assert_eq!(array.get(1), Some(HostValue::Int(4)));
    assert!(engine.set(&proxy, &"1".into(), &"text".into()).is_err());

    engine.release(&proxy);
}

#[test]
fn test_list_polyfills() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let list = HostList::from(vec![HostValue::Int(1), HostValue::Int(2), HostValue::Int(3)]);
    let proxy = bridge
        .to_script(&engine, &HostValue::List(list.clone()))
        .unwrap();

    let push = engine.get(&proxy, &"push".into()).unwrap();
    engine.call(&push, &proxy, &[4.into()]).unwrap();
    engine.release(&push);
    assert_eq!(list.len(), 4);
    assert_eq!(engine.get(&proxy, &"length".into()).unwrap(), ScriptValue::Integer(4));

    let join = engine.get(&proxy, &"join".into()).unwrap();
    let joined = engine.call(&join, &proxy, &["-".into()]).unwrap();
    engine.release(&join);
    assert_eq!(joined, ScriptValue::from("1-2-3-4"));

    let double = engine
        .create_function(CallbackContext::no_this_result("double", |_, args| {
            let n = args.first().and_then(ScriptValue::as_number).unwrap_or_default();
            Ok(ScriptValue::Double(n * 2.0))
        }))
        .unwrap();
    let map = engine.get(&proxy, &"map".into()).unwrap();
    let mapped = engine.call(&map, &proxy, &[double.clone()]).unwrap();
    assert_eq!(engine.array_length(&mapped).unwrap(), 4);
    assert_eq!(engine.array_get(&mapped, 3).unwrap(), ScriptValue::Double(8.0));
    engine.release(&mapped);
    engine.release(&map);
    engine.release(&double);

    // Registered members come before polyfills
    let contains = engine.get(&proxy, &"contains".into()).unwrap();
    let found = engine.call(&contains, &proxy, &[2.into()]).unwrap();
    engine.release(&contains);
    assert_eq!(found, ScriptValue::Boolean(true));

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_list_iterator_protocol() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let list = HostList::from(vec![HostValue::from("a"), HostValue::from("b")]);
    let proxy = bridge.to_script(&engine, &HostValue::List(list)).unwrap();

    let symbol = ScriptValue::Symbol(ScriptSymbol::iterator());
    let iterate = engine.get(&proxy, &symbol).unwrap();
    let iterator = engine.call(&iterate, &proxy, &[]).unwrap();
    let next = engine.get(&iterator, &"next".into()).unwrap();

    let mut seen = Vec::new();
    loop {
        let step = engine.call(&next, &iterator, &[]).unwrap();
        let done = engine.get(&step, &"done".into()).unwrap();
        let value = engine.get(&step, &"value".into()).unwrap();
        engine.release(&step);
        if done.is_truthy() {
            break;
        }
        seen.push(value.to_display_string());
    }
    assert_eq!(seen, ["a", "b"]);

    engine.release(&next);
    engine.release(&iterator);
    engine.release(&iterate);
    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_collection_prototypes() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let list = bridge
        .to_script(&engine, &HostValue::List(HostList::new()))
        .unwrap();
    let map = bridge
        .to_script(&engine, &HostValue::Map(HostMap::new()))
        .unwrap();

    let array_prototype = engine.prototype_of(BuiltinPrototype::Array).unwrap();
    let map_prototype = engine.prototype_of(BuiltinPrototype::Map).unwrap();
    let of_list = engine.get_prototype_of(&list).unwrap();
    let of_map = engine.get_prototype_of(&map).unwrap();
    assert_eq!(of_list, array_prototype);
    assert_eq!(of_map, map_prototype);

    for value in [&array_prototype, &map_prototype, &of_list, &of_map, &list, &map] {
        engine.release(value);
    }
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_empty_collections_enumerate_members() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let list = HostList::new();
    let proxy = bridge
        .to_script(&engine, &HostValue::List(list.clone()))
        .unwrap();

    assert_eq!(keys(&engine, &proxy), ["empty"]);

    list.push(HostValue::Int(1)).unwrap();
    assert_eq!(keys(&engine, &proxy), ["0"]);

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_callbacks_may_write_to_the_iterated_list() {
    let engine = InMemoryEngine::new();
    let bridge = collections_bridge();
    let list = HostList::from(vec![HostValue::Int(1), HostValue::Int(2)]);
    let proxy = bridge
        .to_script(&engine, &HostValue::List(list.clone()))
        .unwrap();

    let sink = list.clone();
    let append = engine
        .create_function(CallbackContext::no_this_result("append", move |_, args| {
            let n = args.first().and_then(ScriptValue::as_number).unwrap_or_default();
            sink.push(HostValue::Double(n * 10.0))?;
            Ok(ScriptValue::Undefined)
        }))
        .unwrap();
    let for_each = engine.get(&proxy, &"forEach".into()).unwrap();
    engine.call(&for_each, &proxy, &[append.clone()]).unwrap();
    assert_eq!(list.len(), 4);
    assert_eq!(list.get(3), Some(HostValue::Double(20.0)));

    let reverse = engine.get(&proxy, &"reverse".into()).unwrap();
    let reversed = engine.call(&reverse, &proxy, &[]).unwrap();
    assert_eq!(list.get(0), Some(HostValue::Double(20.0)));

    for value in [&reversed, &reverse, &for_each, &append, &proxy] {
        engine.release(value);
    }
    assert_eq!(engine.live_handles(), 0);
}

// ============================================================================
// Primitive proxies
// ============================================================================

#[test]
fn test_string_proxy_members() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let proxy = bridge
        .proxy_object(&engine, &HostValue::from("abc"))
        .unwrap();

    assert_eq!(engine.get(&proxy, &"length".into()).unwrap(), ScriptValue::Integer(3));
    assert_eq!(engine.get(&proxy, &"1".into()).unwrap(), ScriptValue::from("b"));
    assert!(engine.has(&proxy, &"2".into()).unwrap());
    assert_eq!(keys(&engine, &proxy), ["0", "1", "2"]);

    let upper = engine.get(&proxy, &"toUpperCase".into()).unwrap();
    assert_eq!(engine.call(&upper, &proxy, &[]).unwrap(), ScriptValue::from("ABC"));
    let char_at = engine.get(&proxy, &"charAt".into()).unwrap();
    assert_eq!(
        engine.call(&char_at, &proxy, &[2.into()]).unwrap(),
        ScriptValue::from("c")
    );
    let to_json = engine.get(&proxy, &"toJSON".into()).unwrap();
    assert_eq!(engine.call(&to_json, &proxy, &[]).unwrap(), ScriptValue::from("abc"));

    for value in [&to_json, &char_at, &upper, &proxy] {
        engine.release(value);
    }
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_number_proxy_converts_to_primitive() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let proxy = bridge.proxy_object(&engine, &HostValue::Int(7)).unwrap();

    let symbol = ScriptValue::Symbol(ScriptSymbol::to_primitive());
    let convert = engine.get(&proxy, &symbol).unwrap();
    assert_eq!(
        engine.call(&convert, &proxy, &["number".into()]).unwrap(),
        ScriptValue::Integer(7)
    );
    assert_eq!(
        engine.call(&convert, &proxy, &["string".into()]).unwrap(),
        ScriptValue::from("7")
    );

    let value_of = engine.get(&proxy, &"valueOf".into()).unwrap();
    assert_eq!(engine.call(&value_of, &proxy, &[]).unwrap(), ScriptValue::Integer(7));
    let to_json = engine.get(&proxy, &"toJSON".into()).unwrap();
    assert_eq!(engine.call(&to_json, &proxy, &[]).unwrap(), ScriptValue::Integer(7));
    assert_eq!(engine.get(&proxy, &"length".into()).unwrap(), ScriptValue::Undefined);

    let of_proxy = engine.get_prototype_of(&proxy).unwrap();
    let object_prototype = engine.prototype_of(BuiltinPrototype::Object).unwrap();
    assert_eq!(of_proxy, object_prototype);

    for value in [&object_prototype, &of_proxy, &to_json, &value_of, &convert, &proxy] {
        engine.release(value);
    }
    assert_eq!(engine.live_handles(), 0);
}

// ============================================================================
// Map and direct proxies
// ============================================================================

#[test]
fn test_map_proxy_entries() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let map: HostMap = [("a", HostValue::Int(1)), ("b", HostValue::from("x"))]
        .into_iter()
        .collect();
    let proxy = bridge.proxy_map(&engine, &map).unwrap();

    assert_eq!(engine.get(&proxy, &"a".into()).unwrap(), ScriptValue::Integer(1));
    assert_eq!(engine.get(&proxy, &"size".into()).unwrap(), ScriptValue::Undefined);
    assert!(engine.set(&proxy, &"c".into(), &true.into()).unwrap());
    assert_eq!(map.get("c"), Some(HostValue::Bool(true)));
    assert!(engine.delete(&proxy, &"a".into()).unwrap());
    assert!(!engine.has(&proxy, &"a".into()).unwrap());
    assert_eq!(keys(&engine, &proxy), ["b", "c"]);

    let prototype = engine.get_prototype_of(&proxy).unwrap();
    let map_prototype = engine.prototype_of(BuiltinPrototype::Map).unwrap();
    assert_eq!(prototype, map_prototype);
    engine.release(&prototype);
    engine.release(&map_prototype);

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}

struct Environment {
    vars: RefCell<Vec<(String, String)>>,
}

impl DirectProxy for Environment {
    fn proxy_get(&self, key: &ScriptValue) -> InteropResult<Option<HostValue>> {
        let key = key.to_display_string();
        Ok(self
            .vars
            .borrow()
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str().into()))
    }

    fn proxy_set(&self, key: &ScriptValue, value: HostValue) -> InteropResult<bool> {
        self.vars
            .borrow_mut()
            .push((key.to_display_string(), value.to_display_string()));
        Ok(true)
    }

    fn proxy_own_keys(&self) -> InteropResult<Vec<ScriptValue>> {
        Ok(self
            .vars
            .borrow()
            .iter()
            .map(|(name, _)| ScriptValue::from(name.as_str()))
            .collect())
    }
}

#[test]
fn test_direct_proxy_delegates() {
    let engine = InMemoryEngine::new();
    let bridge = Bridge::new();
    let env = Rc::new(Environment {
        vars: RefCell::new(vec![("HOME".to_string(), "/home/otter".to_string())]),
    });
    let proxy = bridge
        .to_script(&engine, &HostValue::Direct(DirectTarget::new(env.clone())))
        .unwrap();

    assert_eq!(engine.get(&proxy, &"HOME".into()).unwrap(), ScriptValue::from("/home/otter"));
    assert!(!engine.has(&proxy, &"SHELL".into()).unwrap());
    assert!(engine.set(&proxy, &"SHELL".into(), &"zsh".into()).unwrap());
    assert!(engine.has(&proxy, &"SHELL".into()).unwrap());
    assert_eq!(keys(&engine, &proxy), ["HOME", "SHELL"]);
    assert!(!engine.delete(&proxy, &"HOME".into()).unwrap());
    assert!(engine.call(&proxy, &ScriptValue::Undefined, &[]).is_err());

    engine.release(&proxy);
    assert_eq!(engine.live_handles(), 0);
}
