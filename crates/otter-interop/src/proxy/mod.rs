//! Proxy trap handlers.
//!
//! A [`ProxyHandler`] answers the engine's proxy protocol for one host
//! target. [`install`] builds the handler's trap table once, binds it onto
//! a fresh handler object and wraps a dummy target in an engine proxy. The
//! proxy's host-data slot carries the original host value so conversion
//! can unwrap it again.
//!
//! The engine side only ever holds the handler through the trap closures;
//! handlers never hold engine values, so there is no cycle between a proxy
//! and its handler.

pub mod direct;
pub mod map;
pub mod reflection;

use crate::dispatch::{CallbackContext, CallbackTable, arg, bind};
use crate::engine::{BuiltinPrototype, Scoped, ScopedList, ScriptEngine};
use crate::error::{InteropError, InteropResult};
use crate::host::HostValue;
use crate::script::ScriptValue;
use std::rc::Rc;
use tracing::debug;

pub use direct::{DirectHandler, DirectProxy};
pub use map::MapHandler;
pub use reflection::ReflectionHandler;

/// Trap names, in the order they are bound
pub const TRAP_NAMES: [&str; 9] = [
    "get",
    "set",
    "has",
    "deleteProperty",
    "ownKeys",
    "apply",
    "construct",
    "getOwnPropertyDescriptor",
    "getPrototypeOf",
];

fn not_implemented<T>(trap: &str) -> InteropResult<T> {
    Err(InteropError::type_error(format!("{trap} is not implemented")))
}

/// Host-side implementation of the proxy protocol.
///
/// Keys arrive as script strings or symbols. Every returned script value
/// is owned by the caller. Traps a handler does not override fail with a
/// type error, except the two descriptor traps which derive their answer
/// from `has`, `get` and [`ProxyHandler::prototype`].
pub trait ProxyHandler {
    /// Host value behind the proxy
    fn target(&self) -> &HostValue;

    /// Whether the proxy needs a callable target (`apply` / `construct`)
    fn is_callable(&self) -> bool {
        false
    }

    /// Built-in prototype reported by `getPrototypeOf`
    fn prototype(&self) -> BuiltinPrototype {
        BuiltinPrototype::Object
    }

    /// `proxy[key]`; misses return `undefined`
    fn get(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        receiver: &ScriptValue,
    ) -> InteropResult<ScriptValue> {
        let _ = (engine, key, receiver);
        not_implemented("get")
    }

    /// `proxy[key] = value`; returns whether the write happened
    fn set(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        value: &ScriptValue,
        receiver: &ScriptValue,
    ) -> InteropResult<bool> {
        let _ = (engine, key, value, receiver);
        not_implemented("set")
    }

    /// `key in proxy`
    fn has(&self, engine: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        let _ = (engine, key);
        not_implemented("has")
    }

    /// `delete proxy[key]`
    fn delete_property(&self, engine: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        let _ = (engine, key);
        not_implemented("deleteProperty")
    }

    /// `Reflect.ownKeys(proxy)`
    fn own_keys(&self, engine: &dyn ScriptEngine) -> InteropResult<Vec<ScriptValue>> {
        let _ = engine;
        not_implemented("ownKeys")
    }

    /// `proxy(...args)`
    fn apply(
        &self,
        engine: &dyn ScriptEngine,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        let _ = (engine, this, args);
        not_implemented("apply")
    }

    /// `new proxy(...args)`
    fn construct(
        &self,
        engine: &dyn ScriptEngine,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        let _ = (engine, args);
        not_implemented("construct")
    }

    /// Data descriptor `{value, writable, enumerable, configurable}` for
    /// present keys, `undefined` otherwise
    fn get_own_property_descriptor(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
    ) -> InteropResult<ScriptValue> {
        if !self.has(engine, key)? {
            return Ok(ScriptValue::Undefined);
        }
        let value = Scoped::new(engine, self.get(engine, key, &ScriptValue::Undefined)?);
        let descriptor = Scoped::new(engine, engine.create_object()?);
        engine.set(descriptor.value(), &"value".into(), value.value())?;
        for flag in ["writable", "enumerable", "configurable"] {
            engine.set(descriptor.value(), &flag.into(), &ScriptValue::Boolean(true))?;
        }
        Ok(descriptor.escape())
    }

    /// `Object.getPrototypeOf(proxy)`
    fn get_prototype_of(&self, engine: &dyn ScriptEngine) -> InteropResult<ScriptValue> {
        engine.prototype_of(self.prototype())
    }
}

/// Expand a script array argument into owned elements
fn spread<'e>(engine: &'e dyn ScriptEngine, array: &ScriptValue) -> InteropResult<ScopedList<'e>> {
    let mut items = ScopedList::empty(engine);
    if array.is_nullish() {
        return Ok(items);
    }
    for index in 0..engine.array_length(array)? {
        items.push(engine.array_get(array, index)?);
    }
    Ok(items)
}

/// Trap table of `handler`, in engine calling convention: the proxy
/// target comes first in every trap's argument list.
pub fn trap_table(handler: Rc<dyn ProxyHandler>) -> CallbackTable {
    let mut table = CallbackTable::new();

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result("get", move |engine, args| {
        h.get(engine, arg(args, 1), arg(args, 2))
    }));

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result("set", move |engine, args| {
        let written = h.set(engine, arg(args, 1), arg(args, 2), arg(args, 3))?;
        Ok(ScriptValue::Boolean(written))
    }));

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result("has", move |engine, args| {
        h.has(engine, arg(args, 1)).map(ScriptValue::Boolean)
    }));

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result("deleteProperty", move |engine, args| {
        let deleted = h.delete_property(engine, arg(args, 1))?;
        Ok(ScriptValue::Boolean(deleted))
    }));

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result("ownKeys", move |engine, _| {
        let keys = h.own_keys(engine)?;
        let array = Scoped::new(engine, engine.create_array()?);
        for key in &keys {
            engine.array_push(array.value(), key)?;
        }
        Ok(array.escape())
    }));

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result("apply", move |engine, args| {
        let spread = spread(engine, arg(args, 2))?;
        h.apply(engine, arg(args, 1), spread.values())
    }));

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result("construct", move |engine, args| {
        let spread = spread(engine, arg(args, 1))?;
        h.construct(engine, spread.values())
    }));

    let h = handler.clone();
    table.insert(CallbackContext::no_this_result(
        "getOwnPropertyDescriptor",
        move |engine, args| h.get_own_property_descriptor(engine, arg(args, 1)),
    ));

    table.insert(CallbackContext::no_this_result("getPrototypeOf", move |engine, _| {
        handler.get_prototype_of(engine)
    }));

    table
}

/// Create an engine proxy driven by `handler`.
///
/// Callable handlers get a function target so `apply` and `construct`
/// reach the traps. The returned proxy is owned by the caller.
pub fn install(
    engine: &dyn ScriptEngine,
    handler: Rc<dyn ProxyHandler>,
) -> InteropResult<ScriptValue> {
    let target = if handler.is_callable() {
        engine.create_function(CallbackContext::no_this_result("target", |_, _| {
            Ok(ScriptValue::Undefined)
        }))?
    } else {
        engine.create_object()?
    };
    let target = Scoped::new(engine, target);

    let traps = Scoped::new(engine, engine.create_object()?);
    bind(engine, traps.value(), &trap_table(handler.clone()))?;

    let proxy = Scoped::new(engine, engine.create_proxy(target.value(), traps.value())?);
    let host: Rc<dyn std::any::Any> = Rc::new(handler.target().clone());
    engine.set_host_data(proxy.value(), host)?;

    debug!(
        target = handler.target().type_name(),
        callable = handler.is_callable(),
        "created proxy"
    );
    Ok(proxy.escape())
}
