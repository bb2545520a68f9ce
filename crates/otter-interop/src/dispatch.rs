//! Native callback registration and routing.
//!
//! A [`CallbackContext`] pairs an exposed name with a closure of one of
//! eight calling shapes. Engines invoke contexts through
//! [`CallbackContext::invoke`], which routes straight to the closure with
//! no lookup in between. A [`CallbackTable`] is the flat name → context
//! table built once per receiver, and [`bind`] / [`unbind`] install or
//! remove such a table on an engine object.

use crate::engine::{Scoped, ScriptEngine};
use crate::error::{InteropError, InteropResult};
use crate::script::ScriptValue;
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Calling shape of a native callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// Arguments only, no return value
    NoThisAndNoResult,
    /// Arguments only, returns a value
    NoThisAndResult,
    /// Receiver and arguments, no return value
    ThisAndNoResult,
    /// Receiver and arguments, returns a value
    ThisAndResult,
    /// Property getter ignoring the receiver
    GetterAndNoThis,
    /// Property getter taking the receiver
    GetterAndThis,
    /// Property setter ignoring the receiver
    SetterAndNoThis,
    /// Property setter taking the receiver
    SetterAndThis,
}

impl CallbackKind {
    /// Getter shapes
    pub fn is_getter(self) -> bool {
        matches!(self, CallbackKind::GetterAndNoThis | CallbackKind::GetterAndThis)
    }

    /// Setter shapes
    pub fn is_setter(self) -> bool {
        matches!(self, CallbackKind::SetterAndNoThis | CallbackKind::SetterAndThis)
    }
}

type ArgsFn<R> = Rc<dyn Fn(&dyn ScriptEngine, &[ScriptValue]) -> InteropResult<R>>;
type ThisArgsFn<R> =
    Rc<dyn Fn(&dyn ScriptEngine, &ScriptValue, &[ScriptValue]) -> InteropResult<R>>;
type GetterFn = Rc<dyn Fn(&dyn ScriptEngine) -> InteropResult<ScriptValue>>;
type ThisGetterFn = Rc<dyn Fn(&dyn ScriptEngine, &ScriptValue) -> InteropResult<ScriptValue>>;
type SetterFn = Rc<dyn Fn(&dyn ScriptEngine, &ScriptValue) -> InteropResult<()>>;
type ThisSetterFn = Rc<dyn Fn(&dyn ScriptEngine, &ScriptValue, &ScriptValue) -> InteropResult<()>>;

/// Closure of one calling shape.
///
/// Returned script values are owned by the engine once the callback
/// returns; arguments are borrowed for the duration of the call.
#[derive(Clone)]
pub enum DirectCall {
    /// See [`CallbackKind::NoThisAndNoResult`]
    NoThisAndNoResult(ArgsFn<()>),
    /// See [`CallbackKind::NoThisAndResult`]
    NoThisAndResult(ArgsFn<ScriptValue>),
    /// See [`CallbackKind::ThisAndNoResult`]
    ThisAndNoResult(ThisArgsFn<()>),
    /// See [`CallbackKind::ThisAndResult`]
    ThisAndResult(ThisArgsFn<ScriptValue>),
    /// See [`CallbackKind::GetterAndNoThis`]
    GetterAndNoThis(GetterFn),
    /// See [`CallbackKind::GetterAndThis`]
    GetterAndThis(ThisGetterFn),
    /// See [`CallbackKind::SetterAndNoThis`]
    SetterAndNoThis(SetterFn),
    /// See [`CallbackKind::SetterAndThis`]
    SetterAndThis(ThisSetterFn),
}

impl DirectCall {
    /// Calling shape
    pub fn kind(&self) -> CallbackKind {
        match self {
            DirectCall::NoThisAndNoResult(_) => CallbackKind::NoThisAndNoResult,
            DirectCall::NoThisAndResult(_) => CallbackKind::NoThisAndResult,
            DirectCall::ThisAndNoResult(_) => CallbackKind::ThisAndNoResult,
            DirectCall::ThisAndResult(_) => CallbackKind::ThisAndResult,
            DirectCall::GetterAndNoThis(_) => CallbackKind::GetterAndNoThis,
            DirectCall::GetterAndThis(_) => CallbackKind::GetterAndThis,
            DirectCall::SetterAndNoThis(_) => CallbackKind::SetterAndNoThis,
            DirectCall::SetterAndThis(_) => CallbackKind::SetterAndThis,
        }
    }
}

/// A named native callback
#[derive(Clone)]
pub struct CallbackContext {
    name: Rc<str>,
    call: DirectCall,
}

impl CallbackContext {
    /// Create a context from a closure of any shape
    pub fn new(name: impl Into<Rc<str>>, call: DirectCall) -> Self {
        Self {
            name: name.into(),
            call,
        }
    }

    /// `fn(args) -> ()`
    pub fn no_this_no_result(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine, &[ScriptValue]) -> InteropResult<()> + 'static,
    ) -> Self {
        Self::new(name, DirectCall::NoThisAndNoResult(Rc::new(f)))
    }

    /// `fn(args) -> value`
    pub fn no_this_result(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine, &[ScriptValue]) -> InteropResult<ScriptValue> + 'static,
    ) -> Self {
        Self::new(name, DirectCall::NoThisAndResult(Rc::new(f)))
    }

    /// `fn(this, args) -> ()`
    pub fn this_no_result(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine, &ScriptValue, &[ScriptValue]) -> InteropResult<()> + 'static,
    ) -> Self {
        Self::new(name, DirectCall::ThisAndNoResult(Rc::new(f)))
    }

    /// `fn(this, args) -> value`
    pub fn this_result(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine, &ScriptValue, &[ScriptValue]) -> InteropResult<ScriptValue>
        + 'static,
    ) -> Self {
        Self::new(name, DirectCall::ThisAndResult(Rc::new(f)))
    }

    /// Getter without receiver
    pub fn getter(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine) -> InteropResult<ScriptValue> + 'static,
    ) -> Self {
        Self::new(name, DirectCall::GetterAndNoThis(Rc::new(f)))
    }

    /// Getter with receiver
    pub fn getter_with_this(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine, &ScriptValue) -> InteropResult<ScriptValue> + 'static,
    ) -> Self {
        Self::new(name, DirectCall::GetterAndThis(Rc::new(f)))
    }

    /// Setter without receiver
    pub fn setter(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine, &ScriptValue) -> InteropResult<()> + 'static,
    ) -> Self {
        Self::new(name, DirectCall::SetterAndNoThis(Rc::new(f)))
    }

    /// Setter with receiver
    pub fn setter_with_this(
        name: impl Into<Rc<str>>,
        f: impl Fn(&dyn ScriptEngine, &ScriptValue, &ScriptValue) -> InteropResult<()> + 'static,
    ) -> Self {
        Self::new(name, DirectCall::SetterAndThis(Rc::new(f)))
    }

    /// Exposed name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calling shape
    pub fn kind(&self) -> CallbackKind {
        self.call.kind()
    }

    /// The closure
    pub fn call(&self) -> &DirectCall {
        &self.call
    }

    /// Entry point used by engines.
    ///
    /// Getters ignore `args`, setters read the assigned value from
    /// `args[0]`, and shapes without a result return `undefined`.
    pub fn invoke(
        &self,
        engine: &dyn ScriptEngine,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        match &self.call {
            DirectCall::NoThisAndNoResult(f) => f(engine, args).map(|_| ScriptValue::Undefined),
            DirectCall::NoThisAndResult(f) => f(engine, args),
            DirectCall::ThisAndNoResult(f) => f(engine, this, args).map(|_| ScriptValue::Undefined),
            DirectCall::ThisAndResult(f) => f(engine, this, args),
            DirectCall::GetterAndNoThis(f) => f(engine),
            DirectCall::GetterAndThis(f) => f(engine, this),
            DirectCall::SetterAndNoThis(f) => {
                f(engine, arg(args, 0))
                    .map(|_| ScriptValue::Undefined)
            }
            DirectCall::SetterAndThis(f) => {
                f(engine, this, arg(args, 0))
                    .map(|_| ScriptValue::Undefined)
            }
        }
    }
}

impl fmt::Debug for CallbackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackContext")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Flat name → callback table.
///
/// A getter and a setter may share a name; every other shape must be
/// unique per name. Later registrations under a taken slot replace it.
#[derive(Clone, Default)]
pub struct CallbackTable {
    contexts: Vec<CallbackContext>,
    index: FxHashMap<(Rc<str>, Slot), usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Call,
    Getter,
    Setter,
}

impl Slot {
    fn of(kind: CallbackKind) -> Self {
        if kind.is_getter() {
            Slot::Getter
        } else if kind.is_setter() {
            Slot::Setter
        } else {
            Slot::Call
        }
    }
}

impl CallbackTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a context
    pub fn insert(&mut self, context: CallbackContext) {
        let key = (context.name.clone(), Slot::of(context.kind()));
        match self.index.get(&key) {
            Some(&position) => self.contexts[position] = context,
            None => {
                self.index.insert(key, self.contexts.len());
                self.contexts.push(context);
            }
        }
    }

    /// Builder-style [`CallbackTable::insert`]
    pub fn with(mut self, context: CallbackContext) -> Self {
        self.insert(context);
        self
    }

    /// Callable context registered under `name`
    pub fn get(&self, name: &str) -> Option<&CallbackContext> {
        self.index
            .get(&(Rc::from(name), Slot::Call))
            .map(|&position| &self.contexts[position])
    }

    /// Getter registered under `name`
    pub fn getter(&self, name: &str) -> Option<&CallbackContext> {
        self.index
            .get(&(Rc::from(name), Slot::Getter))
            .map(|&position| &self.contexts[position])
    }

    /// Setter registered under `name`
    pub fn setter(&self, name: &str) -> Option<&CallbackContext> {
        self.index
            .get(&(Rc::from(name), Slot::Setter))
            .map(|&position| &self.contexts[position])
    }

    /// All contexts in registration order
    pub fn contexts(&self) -> &[CallbackContext] {
        &self.contexts
    }

    /// Number of contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// No contexts
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Distinct names in registration order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for context in &self.contexts {
            if !names.contains(&context.name()) {
                names.push(context.name());
            }
        }
        names
    }
}

/// Anything that can hand out a callback table for [`bind`]
pub trait CallbackReceiver {
    /// The receiver's callbacks
    fn callback_table(&self) -> &CallbackTable;
}

impl CallbackReceiver for CallbackTable {
    fn callback_table(&self) -> &CallbackTable {
        self
    }
}

/// Install a receiver's callbacks on `object`.
///
/// Callable shapes become function-valued properties; getters and setters
/// sharing a name become one accessor property. Returns the contexts that
/// were registered.
pub fn bind(
    engine: &dyn ScriptEngine,
    object: &ScriptValue,
    receiver: &dyn CallbackReceiver,
) -> InteropResult<Vec<CallbackContext>> {
    let table = receiver.callback_table();
    let mut registered = Vec::with_capacity(table.len());
    for name in table.names() {
        let getter = table.getter(name).cloned();
        let setter = table.setter(name).cloned();
        if getter.is_some() || setter.is_some() {
            engine.define_accessor(object, name, getter.clone(), setter.clone())?;
            registered.extend(getter);
            registered.extend(setter);
        }
        if let Some(context) = table.get(name) {
            let function = Scoped::new(engine, engine.create_function(context.clone())?);
            let key = ScriptValue::from(name);
            if !engine.set(object, &key, function.value())? {
                return Err(InteropError::engine(format!("cannot bind '{name}'")));
            }
            registered.push(context.clone());
        }
    }
    debug!(count = registered.len(), "bound callbacks");
    Ok(registered)
}

/// Remove a receiver's callbacks from `object`, returning how many
/// properties were deleted.
pub fn unbind(
    engine: &dyn ScriptEngine,
    object: &ScriptValue,
    receiver: &dyn CallbackReceiver,
) -> InteropResult<usize> {
    let mut removed = 0;
    for name in receiver.callback_table().names() {
        let key = ScriptValue::from(name);
        if engine.has(object, &key)? && engine.delete(object, &key)? {
            removed += 1;
        }
    }
    debug!(count = removed, "unbound callbacks");
    Ok(removed)
}

/// Argument at `index`, `undefined` when absent
pub(crate) fn arg(args: &[ScriptValue], index: usize) -> &ScriptValue {
    static UNDEFINED: ScriptValue = ScriptValue::Undefined;
    args.get(index).unwrap_or(&UNDEFINED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_keeps_getter_and_setter_apart() {
        let table = CallbackTable::new()
            .with(CallbackContext::getter("level", |_| Ok(ScriptValue::Integer(1))))
            .with(CallbackContext::setter("level", |_, _| Ok(())))
            .with(CallbackContext::no_this_result("log", |_, _| Ok(ScriptValue::Undefined)));
        assert_eq!(table.len(), 3);
        assert_eq!(table.names(), vec!["level", "log"]);
        assert_eq!(table.getter("level").map(|c| c.kind()), Some(CallbackKind::GetterAndNoThis));
        assert_eq!(table.setter("level").map(|c| c.kind()), Some(CallbackKind::SetterAndNoThis));
        assert!(table.get("level").is_none());
    }

    #[test]
    fn test_insert_replaces_same_slot() {
        let mut table = CallbackTable::new();
        table.insert(CallbackContext::no_this_result("f", |_, _| Ok(ScriptValue::Integer(1))));
        table.insert(CallbackContext::no_this_no_result("f", |_, _| Ok(())));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("f").map(|c| c.kind()), Some(CallbackKind::NoThisAndNoResult));
    }
}
