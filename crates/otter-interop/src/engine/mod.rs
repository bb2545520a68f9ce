//! The engine capability surface the bridge is built on.
//!
//! The bridge never owns an engine. Every trap, conversion and call
//! receives `&dyn ScriptEngine` from whoever is driving the engine thread.
//!
//! Ownership: every reference value an engine method returns is owned by
//! the caller, and every argument is borrowed. Owned values are released
//! through [`ScriptEngine::release`], usually by wrapping them in a
//! [`Scoped`] guard.

pub mod memory;

use crate::dispatch::CallbackContext;
use crate::error::{InteropError, InteropResult};
use crate::host::HostValue;
use crate::script::ScriptValue;
use std::any::Any;
use std::rc::Rc;

/// Built-in prototypes handed out by `getPrototypeOf`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinPrototype {
    /// `Object.prototype`
    Object,
    /// `Array.prototype`
    Array,
    /// `Function.prototype`
    Function,
    /// `Map.prototype`
    Map,
    /// `Set.prototype`
    Set,
}

/// Operations the bridge needs from a script engine.
pub trait ScriptEngine {
    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create an empty plain object
    fn create_object(&self) -> InteropResult<ScriptValue>;

    /// Create an empty array
    fn create_array(&self) -> InteropResult<ScriptValue>;

    /// Create an empty map
    fn create_map(&self) -> InteropResult<ScriptValue>;

    /// Create an empty set
    fn create_set(&self) -> InteropResult<ScriptValue>;

    /// Create a function backed by a native callback
    fn create_function(&self, callback: CallbackContext) -> InteropResult<ScriptValue>;

    /// Create a proxy over `target` whose traps are the functions found on `handler`
    fn create_proxy(&self, target: &ScriptValue, handler: &ScriptValue)
    -> InteropResult<ScriptValue>;

    /// Create a primitive script value from a host primitive.
    ///
    /// Non-primitive host values are rejected.
    fn create_primitive(&self, value: &HostValue) -> InteropResult<ScriptValue> {
        Ok(match value {
            HostValue::Null => ScriptValue::Null,
            HostValue::Bool(b) => ScriptValue::Boolean(*b),
            HostValue::Byte(n) => ScriptValue::Integer(i32::from(*n)),
            HostValue::Short(n) => ScriptValue::Integer(i32::from(*n)),
            HostValue::Int(n) => ScriptValue::Integer(*n),
            HostValue::Long(n) => ScriptValue::Long(*n),
            HostValue::Float(n) => ScriptValue::Double(f64::from(*n)),
            HostValue::Double(n) => ScriptValue::Double(*n),
            HostValue::Char(c) => ScriptValue::String(c.to_string()),
            HostValue::String(s) => ScriptValue::String(s.clone()),
            HostValue::DateTime(d) => ScriptValue::Date(*d),
            other => {
                return Err(InteropError::conversion(format!(
                    "{} is not a primitive",
                    other.type_name()
                )));
            }
        })
    }

    /// Convert a primitive script value into its host counterpart.
    ///
    /// Returns `None` for references and symbols.
    fn to_host_primitive(&self, value: &ScriptValue) -> Option<HostValue> {
        match value {
            ScriptValue::Undefined | ScriptValue::Null => Some(HostValue::Null),
            ScriptValue::Boolean(b) => Some(HostValue::Bool(*b)),
            ScriptValue::Integer(n) => Some(HostValue::Int(*n)),
            ScriptValue::Long(n) => Some(HostValue::Long(*n)),
            ScriptValue::Double(n) => Some(HostValue::Double(*n)),
            ScriptValue::String(s) => Some(HostValue::String(s.clone())),
            ScriptValue::Date(d) => Some(HostValue::DateTime(*d)),
            ScriptValue::Symbol(_) | ScriptValue::Reference(_) => None,
        }
    }

    // ------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------

    /// Take an additional reference to `value` (no-op for primitives)
    fn retain(&self, value: &ScriptValue) -> InteropResult<()>;

    /// Drop one reference to `value` (no-op for primitives)
    fn release(&self, value: &ScriptValue);

    // ------------------------------------------------------------------
    // Object protocol
    // ------------------------------------------------------------------

    /// `object[key]`
    fn get(&self, object: &ScriptValue, key: &ScriptValue) -> InteropResult<ScriptValue>;

    /// `object[key] = value`, returning whether the write happened
    fn set(&self, object: &ScriptValue, key: &ScriptValue, value: &ScriptValue)
    -> InteropResult<bool>;

    /// `key in object`
    fn has(&self, object: &ScriptValue, key: &ScriptValue) -> InteropResult<bool>;

    /// `delete object[key]`
    fn delete(&self, object: &ScriptValue, key: &ScriptValue) -> InteropResult<bool>;

    /// Own enumerable keys (strings and symbols)
    fn own_keys(&self, object: &ScriptValue) -> InteropResult<Vec<ScriptValue>>;

    /// Define an accessor property backed by native callbacks
    fn define_accessor(
        &self,
        object: &ScriptValue,
        name: &str,
        getter: Option<CallbackContext>,
        setter: Option<CallbackContext>,
    ) -> InteropResult<()>;

    // ------------------------------------------------------------------
    // Arrays, maps and sets
    // ------------------------------------------------------------------

    /// Array length
    fn array_length(&self, array: &ScriptValue) -> InteropResult<usize>;

    /// Array element (owned by the caller)
    fn array_get(&self, array: &ScriptValue, index: usize) -> InteropResult<ScriptValue>;

    /// Append to an array
    fn array_push(&self, array: &ScriptValue, value: &ScriptValue) -> InteropResult<()>;

    /// `map.set(key, value)`
    fn map_set(&self, map: &ScriptValue, key: &ScriptValue, value: &ScriptValue)
    -> InteropResult<()>;

    /// Map entries in insertion order (owned by the caller)
    fn map_entries(&self, map: &ScriptValue) -> InteropResult<Vec<(ScriptValue, ScriptValue)>>;

    /// `set.add(value)`
    fn set_add(&self, set: &ScriptValue, value: &ScriptValue) -> InteropResult<()>;

    /// Set values in insertion order (owned by the caller)
    fn set_values(&self, set: &ScriptValue) -> InteropResult<Vec<ScriptValue>>;

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Call a function (or a callable proxy)
    fn call(
        &self,
        function: &ScriptValue,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue>;

    /// `new constructor(...args)`
    fn construct(&self, constructor: &ScriptValue, args: &[ScriptValue])
    -> InteropResult<ScriptValue>;

    // ------------------------------------------------------------------
    // Embedder data
    // ------------------------------------------------------------------

    /// Attach host data to an object
    fn set_host_data(&self, object: &ScriptValue, data: Rc<dyn Any>) -> InteropResult<()>;

    /// Host data previously attached to an object
    fn host_data(&self, object: &ScriptValue) -> Option<Rc<dyn Any>>;

    /// A built-in prototype (owned by the caller)
    fn prototype_of(&self, prototype: BuiltinPrototype) -> InteropResult<ScriptValue>;
}

static UNDEFINED: ScriptValue = ScriptValue::Undefined;

/// RAII guard over an owned engine value.
///
/// Dropping the guard releases the value; [`Scoped::escape`] hands
/// ownership to the caller instead.
pub struct Scoped<'e> {
    engine: &'e dyn ScriptEngine,
    value: Option<ScriptValue>,
}

impl<'e> Scoped<'e> {
    /// Guard an owned value
    pub fn new(engine: &'e dyn ScriptEngine, value: ScriptValue) -> Self {
        Self {
            engine,
            value: Some(value),
        }
    }

    /// The guarded value
    pub fn value(&self) -> &ScriptValue {
        // The slot is only emptied by `escape`, which consumes the guard.
        self.value.as_ref().unwrap_or(&UNDEFINED)
    }

    /// Hand ownership to the caller
    pub fn escape(mut self) -> ScriptValue {
        self.value.take().unwrap_or(ScriptValue::Undefined)
    }
}

impl Drop for Scoped<'_> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.engine.release(&value);
        }
    }
}

/// Guard a list of owned values, releasing all of them on drop
pub struct ScopedList<'e> {
    engine: &'e dyn ScriptEngine,
    values: Vec<ScriptValue>,
}

impl<'e> ScopedList<'e> {
    /// Guard owned values
    pub fn new(engine: &'e dyn ScriptEngine, values: Vec<ScriptValue>) -> Self {
        Self { engine, values }
    }

    /// Empty guard
    pub fn empty(engine: &'e dyn ScriptEngine) -> Self {
        Self::new(engine, Vec::new())
    }

    /// Take ownership of one more value
    pub fn push(&mut self, value: ScriptValue) {
        self.values.push(value);
    }

    /// The guarded values
    pub fn values(&self) -> &[ScriptValue] {
        &self.values
    }
}

impl Drop for ScopedList<'_> {
    fn drop(&mut self) {
        for value in self.values.drain(..) {
            self.engine.release(&value);
        }
    }
}
