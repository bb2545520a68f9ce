//! Reference engine backed by a reference-counted handle heap.
//!
//! Every engine value is a slot with an explicit count. Values handed to
//! the caller carry one count; stored values (properties, elements, proxy
//! target and handler) carry one each for their container. A slot whose
//! count drops to zero is freed together with whatever it alone kept
//! alive, so [`InMemoryEngine::live_handles`] tells tests whether every
//! owned value was released.
//!
//! Proxies follow the trap protocol: each operation looks up the trap
//! function on the handler object and calls it with the handler as
//! receiver and the target first; a missing trap forwards to the target.
//! No heap borrow is held while native callbacks run.

use super::{BuiltinPrototype, Scoped, ScopedList, ScriptEngine};
use crate::dispatch::CallbackContext;
use crate::error::{InteropError, InteropResult};
use crate::script::{Handle, ReferenceKind, ScriptRef, ScriptSymbol, ScriptValue};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PropKey {
    String(String),
    Symbol(ScriptSymbol),
}

impl PropKey {
    fn of(key: &ScriptValue) -> Self {
        match key {
            ScriptValue::Symbol(symbol) => PropKey::Symbol(symbol.clone()),
            other => PropKey::String(other.to_display_string()),
        }
    }

    fn to_value(&self) -> ScriptValue {
        match self {
            PropKey::String(name) => ScriptValue::String(name.clone()),
            PropKey::Symbol(symbol) => ScriptValue::Symbol(symbol.clone()),
        }
    }
}

enum Property {
    Data(ScriptValue),
    Accessor {
        getter: Option<CallbackContext>,
        setter: Option<CallbackContext>,
    },
}

type Properties = IndexMap<PropKey, Property>;

enum Data {
    Object(Properties),
    Array(Vec<ScriptValue>),
    Map(Vec<(ScriptValue, ScriptValue)>),
    Set(Vec<ScriptValue>),
    Function {
        callback: CallbackContext,
        properties: Properties,
    },
    Proxy {
        target: ScriptValue,
        handler: ScriptValue,
    },
}

impl Data {
    fn properties(&self) -> Option<&Properties> {
        match self {
            Data::Object(properties) | Data::Function { properties, .. } => Some(properties),
            _ => None,
        }
    }

    fn properties_mut(&mut self) -> Option<&mut Properties> {
        match self {
            Data::Object(properties) | Data::Function { properties, .. } => Some(properties),
            _ => None,
        }
    }

    /// Values this slot holds a count on
    fn children(&self) -> Vec<ScriptValue> {
        let from_properties = |properties: &Properties| {
            properties
                .values()
                .filter_map(|p| match p {
                    Property::Data(value) => Some(value.clone()),
                    Property::Accessor { .. } => None,
                })
                .collect::<Vec<_>>()
        };
        match self {
            Data::Object(properties) | Data::Function { properties, .. } => {
                from_properties(properties)
            }
            Data::Array(items) | Data::Set(items) => items.clone(),
            Data::Map(entries) => entries
                .iter()
                .flat_map(|(k, v)| [k.clone(), v.clone()])
                .collect(),
            Data::Proxy { target, handler } => vec![target.clone(), handler.clone()],
        }
    }
}

struct Slot {
    refs: usize,
    data: Data,
    host_data: Option<Rc<dyn Any>>,
}

#[derive(Default)]
struct Heap {
    next: u64,
    slots: FxHashMap<u64, Slot>,
    prototypes: FxHashMap<BuiltinPrototype, ScriptValue>,
}

fn released(handle: Handle) -> InteropError {
    InteropError::engine(format!("handle {} was released", handle.raw()))
}

impl Heap {
    fn alloc(&mut self, kind: ReferenceKind, data: Data) -> ScriptValue {
        self.next += 1;
        self.slots.insert(
            self.next,
            Slot {
                refs: 1,
                data,
                host_data: None,
            },
        );
        ScriptValue::Reference(ScriptRef::new(Handle::new(self.next), kind))
    }

    fn slot(&self, value: &ScriptValue) -> InteropResult<&Slot> {
        let reference = value
            .as_reference()
            .ok_or_else(|| InteropError::type_error(format!("{value} is not an object")))?;
        self.slots
            .get(&reference.handle().raw())
            .ok_or_else(|| released(reference.handle()))
    }

    fn slot_mut(&mut self, value: &ScriptValue) -> InteropResult<&mut Slot> {
        let reference = value
            .as_reference()
            .ok_or_else(|| InteropError::type_error(format!("{value} is not an object")))?;
        self.slots
            .get_mut(&reference.handle().raw())
            .ok_or_else(|| released(reference.handle()))
    }

    fn retain(&mut self, value: &ScriptValue) -> InteropResult<()> {
        if value.as_reference().is_some() {
            self.slot_mut(value)?.refs += 1;
        }
        Ok(())
    }

    /// Drop one count, moving freed slots into `freed`
    fn release(&mut self, value: &ScriptValue, freed: &mut Vec<Slot>) {
        let mut pending = vec![value.clone()];
        while let Some(value) = pending.pop() {
            let Some(reference) = value.as_reference() else {
                continue;
            };
            let raw = reference.handle().raw();
            let Some(slot) = self.slots.get_mut(&raw) else {
                warn!(handle = raw, "release of a freed handle");
                continue;
            };
            slot.refs -= 1;
            if slot.refs == 0 {
                if let Some(slot) = self.slots.remove(&raw) {
                    pending.extend(slot.data.children());
                    freed.push(slot);
                }
            }
        }
    }

    fn proxy_parts(&self, value: &ScriptValue) -> Option<(ScriptValue, ScriptValue)> {
        match &self.slot(value).ok()?.data {
            Data::Proxy { target, handler } => Some((target.clone(), handler.clone())),
            _ => None,
        }
    }
}

/// How a non-proxy `set` is carried out
enum Write {
    Element(usize),
    Accessor(Option<CallbackContext>),
    Property,
}

/// What a property read found
enum Lookup {
    Value(ScriptValue),
    Getter(CallbackContext),
    Missing,
}

/// In-memory [`ScriptEngine`]
#[derive(Default)]
pub struct InMemoryEngine {
    heap: RefCell<Heap>,
}

impl InMemoryEngine {
    /// Empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated values, built-in prototypes excluded
    pub fn live_handles(&self) -> usize {
        let heap = self.heap.borrow();
        heap.slots.len() - heap.prototypes.len()
    }

    /// Current count of a reference value, 0 once freed
    pub fn ref_count(&self, value: &ScriptValue) -> usize {
        self.heap.borrow().slot(value).map_or(0, |slot| slot.refs)
    }

    /// `Object.getPrototypeOf(value)`, running the proxy trap if any
    pub fn get_prototype_of(&self, value: &ScriptValue) -> InteropResult<ScriptValue> {
        let proxy = self.heap.borrow().proxy_parts(value);
        if let Some((target, handler)) = proxy {
            if let Some(trap) = self.trap(&handler, "getPrototypeOf")? {
                return self.call(trap.value(), &handler, &[target]);
            }
            return self.get_prototype_of(&target);
        }
        let prototype = match value.as_reference().map(ScriptRef::kind) {
            Some(ReferenceKind::Array) => BuiltinPrototype::Array,
            Some(ReferenceKind::Function) => BuiltinPrototype::Function,
            Some(ReferenceKind::Map) => BuiltinPrototype::Map,
            Some(ReferenceKind::Set) => BuiltinPrototype::Set,
            _ => BuiltinPrototype::Object,
        };
        self.prototype_of(prototype)
    }

    /// `Object.getOwnPropertyDescriptor(value, key)`
    pub fn get_own_property_descriptor(
        &self,
        value: &ScriptValue,
        key: &ScriptValue,
    ) -> InteropResult<ScriptValue> {
        let proxy = self.heap.borrow().proxy_parts(value);
        if let Some((target, handler)) = proxy {
            if let Some(trap) = self.trap(&handler, "getOwnPropertyDescriptor")? {
                return self.call(trap.value(), &handler, &[target, key.clone()]);
            }
            return self.get_own_property_descriptor(&target, key);
        }
        if !self.has(value, key)? {
            return Ok(ScriptValue::Undefined);
        }
        let item = Scoped::new(self, self.get(value, key)?);
        let descriptor = Scoped::new(self, self.create_object()?);
        self.set(descriptor.value(), &"value".into(), item.value())?;
        for flag in ["writable", "enumerable", "configurable"] {
            self.set(descriptor.value(), &flag.into(), &true.into())?;
        }
        Ok(descriptor.escape())
    }

    fn alloc(&self, kind: ReferenceKind, data: Data) -> ScriptValue {
        self.heap.borrow_mut().alloc(kind, data)
    }

    /// Trap function named `name` on `handler`, if it is a function
    fn trap(&self, handler: &ScriptValue, name: &str) -> InteropResult<Option<Scoped<'_>>> {
        let trap = Scoped::new(self, self.get(handler, &name.into())?);
        Ok(trap.value().is_function().then_some(trap))
    }

    /// Fresh array holding copies of `items`
    fn array_of(&self, items: &[ScriptValue]) -> InteropResult<Scoped<'_>> {
        let array = Scoped::new(self, self.create_array()?);
        for item in items {
            self.array_push(array.value(), item)?;
        }
        Ok(array)
    }

    fn lookup(&self, object: &ScriptValue, key: &ScriptValue) -> InteropResult<Lookup> {
        let mut heap = self.heap.borrow_mut();
        let found = match &heap.slot(object)?.data {
            Data::Array(items) => match key.as_index() {
                Some(index) => items.get(index).cloned().map(Lookup::Value),
                None if key.as_str() == Some("length") => {
                    Some(Lookup::Value(ScriptValue::Integer(items.len() as i32)))
                }
                None => None,
            },
            Data::Map(entries) if key.as_str() == Some("size") => {
                Some(Lookup::Value(ScriptValue::Integer(entries.len() as i32)))
            }
            Data::Set(items) if key.as_str() == Some("size") => {
                Some(Lookup::Value(ScriptValue::Integer(items.len() as i32)))
            }
            data => data
                .properties()
                .and_then(|properties| properties.get(&PropKey::of(key)))
                .map(|property| match property {
                    Property::Data(value) => Lookup::Value(value.clone()),
                    Property::Accessor {
                        getter: Some(getter),
                        ..
                    } => Lookup::Getter(getter.clone()),
                    Property::Accessor { getter: None, .. } => {
                        Lookup::Value(ScriptValue::Undefined)
                    }
                }),
        };
        let found = found.unwrap_or(Lookup::Missing);
        if let Lookup::Value(value) = &found {
            heap.retain(value)?;
        }
        Ok(found)
    }

    /// Store `value` under `key`, replacing (and releasing) the old value
    fn store(&self, object: &ScriptValue, key: PropKey, value: Property) -> InteropResult<()> {
        let mut freed = Vec::new();
        {
            let mut heap = self.heap.borrow_mut();
            if heap.slot(object)?.data.properties().is_none() {
                return Err(InteropError::type_error("cannot define properties on this value"));
            }
            if let Property::Data(value) = &value {
                heap.retain(value)?;
            }
            let properties = heap
                .slot_mut(object)?
                .data
                .properties_mut()
                .ok_or_else(|| InteropError::type_error("cannot define properties on this value"))?;
            if let Some(Property::Data(old)) = properties.insert(key, value) {
                heap.release(&old, &mut freed);
            }
        }
        drop(freed);
        Ok(())
    }

    /// Write `array[index]`, padding holes with `undefined`
    fn store_element(
        &self,
        array: &ScriptValue,
        index: usize,
        value: &ScriptValue,
    ) -> InteropResult<()> {
        let mut freed = Vec::new();
        {
            let mut heap = self.heap.borrow_mut();
            heap.slot(array)?;
            heap.retain(value)?;
            let Data::Array(items) = &mut heap.slot_mut(array)?.data else {
                return Err(InteropError::type_error(format!("{array} is not an array")));
            };
            if index < items.len() {
                let old = std::mem::replace(&mut items[index], value.clone());
                heap.release(&old, &mut freed);
            } else {
                items.resize(index, ScriptValue::Undefined);
                items.push(value.clone());
            }
        }
        drop(freed);
        Ok(())
    }

    fn release_all(&self, values: &[ScriptValue]) {
        let mut freed = Vec::new();
        {
            let mut heap = self.heap.borrow_mut();
            for value in values {
                heap.release(value, &mut freed);
            }
        }
        drop(freed);
    }
}

impl ScriptEngine for InMemoryEngine {
    fn create_object(&self) -> InteropResult<ScriptValue> {
        Ok(self.alloc(ReferenceKind::Object, Data::Object(IndexMap::new())))
    }

    fn create_array(&self) -> InteropResult<ScriptValue> {
        Ok(self.alloc(ReferenceKind::Array, Data::Array(Vec::new())))
    }

    fn create_map(&self) -> InteropResult<ScriptValue> {
        Ok(self.alloc(ReferenceKind::Map, Data::Map(Vec::new())))
    }

    fn create_set(&self) -> InteropResult<ScriptValue> {
        Ok(self.alloc(ReferenceKind::Set, Data::Set(Vec::new())))
    }

    fn create_function(&self, callback: CallbackContext) -> InteropResult<ScriptValue> {
        Ok(self.alloc(
            ReferenceKind::Function,
            Data::Function {
                callback,
                properties: IndexMap::new(),
            },
        ))
    }

    fn create_proxy(
        &self,
        target: &ScriptValue,
        handler: &ScriptValue,
    ) -> InteropResult<ScriptValue> {
        let mut heap = self.heap.borrow_mut();
        heap.slot(handler)?;
        heap.retain(target)?;
        heap.retain(handler)?;
        Ok(heap.alloc(
            ReferenceKind::Proxy,
            Data::Proxy {
                target: target.clone(),
                handler: handler.clone(),
            },
        ))
    }

    fn retain(&self, value: &ScriptValue) -> InteropResult<()> {
        self.heap.borrow_mut().retain(value)
    }

    fn release(&self, value: &ScriptValue) {
        if value.as_reference().is_some() {
            self.release_all(std::slice::from_ref(value));
        }
    }

    fn get(&self, object: &ScriptValue, key: &ScriptValue) -> InteropResult<ScriptValue> {
        let proxy = self.heap.borrow().proxy_parts(object);
        if let Some((target, handler)) = proxy {
            return match self.trap(&handler, "get")? {
                Some(trap) => {
                    self.call(trap.value(), &handler, &[target, key.clone(), object.clone()])
                }
                None => self.get(&target, key),
            };
        }
        match self.lookup(object, key)? {
            Lookup::Value(value) => Ok(value),
            Lookup::Getter(getter) => getter.invoke(self, object, &[]),
            Lookup::Missing => Ok(ScriptValue::Undefined),
        }
    }

    fn set(
        &self,
        object: &ScriptValue,
        key: &ScriptValue,
        value: &ScriptValue,
    ) -> InteropResult<bool> {
        let proxy = self.heap.borrow().proxy_parts(object);
        if let Some((target, handler)) = proxy {
            return match self.trap(&handler, "set")? {
                Some(trap) => {
                    let args = [target, key.clone(), value.clone(), object.clone()];
                    let result = Scoped::new(self, self.call(trap.value(), &handler, &args)?);
                    Ok(result.value().is_truthy())
                }
                None => self.set(&target, key, value),
            };
        }

        let write = {
            let heap = self.heap.borrow();
            match &heap.slot(object)?.data {
                Data::Array(_) => match key.as_index() {
                    Some(index) => Write::Element(index),
                    None => return Ok(false),
                },
                Data::Map(_) | Data::Set(_) | Data::Proxy { .. } => return Ok(false),
                data => match data.properties().and_then(|p| p.get(&PropKey::of(key))) {
                    Some(Property::Accessor { setter, .. }) => Write::Accessor(setter.clone()),
                    _ => Write::Property,
                },
            }
        };

        match write {
            Write::Element(index) => {
                self.store_element(object, index, value)?;
                Ok(true)
            }
            Write::Accessor(Some(setter)) => {
                setter.invoke(self, object, std::slice::from_ref(value))?;
                Ok(true)
            }
            Write::Accessor(None) => Ok(false),
            Write::Property => {
                self.store(object, PropKey::of(key), Property::Data(value.clone()))?;
                Ok(true)
            }
        }
    }

    fn has(&self, object: &ScriptValue, key: &ScriptValue) -> InteropResult<bool> {
        let proxy = self.heap.borrow().proxy_parts(object);
        if let Some((target, handler)) = proxy {
            return match self.trap(&handler, "has")? {
                Some(trap) => {
                    let result = self.call(trap.value(), &handler, &[target, key.clone()])?;
                    let result = Scoped::new(self, result);
                    Ok(result.value().is_truthy())
                }
                None => self.has(&target, key),
            };
        }
        let heap = self.heap.borrow();
        Ok(match &heap.slot(object)?.data {
            Data::Array(items) => {
                key.as_str() == Some("length") || key.as_index().is_some_and(|i| i < items.len())
            }
            data => data
                .properties()
                .is_some_and(|properties| properties.contains_key(&PropKey::of(key))),
        })
    }

    fn delete(&self, object: &ScriptValue, key: &ScriptValue) -> InteropResult<bool> {
        let proxy = self.heap.borrow().proxy_parts(object);
        if let Some((target, handler)) = proxy {
            return match self.trap(&handler, "deleteProperty")? {
                Some(trap) => {
                    let result = self.call(trap.value(), &handler, &[target, key.clone()])?;
                    let result = Scoped::new(self, result);
                    Ok(result.value().is_truthy())
                }
                None => self.delete(&target, key),
            };
        }
        let mut freed = Vec::new();
        let removed = {
            let mut heap = self.heap.borrow_mut();
            let old = match &mut heap.slot_mut(object)?.data {
                Data::Array(items) => key
                    .as_index()
                    .and_then(|i| items.get_mut(i))
                    .map(|slot| std::mem::replace(slot, ScriptValue::Undefined)),
                data => match data
                    .properties_mut()
                    .and_then(|properties| properties.shift_remove(&PropKey::of(key)))
                {
                    Some(Property::Data(value)) => Some(value),
                    Some(Property::Accessor { .. }) => Some(ScriptValue::Undefined),
                    None => None,
                },
            };
            if let Some(old) = &old {
                heap.release(old, &mut freed);
            }
            old.is_some()
        };
        drop(freed);
        Ok(removed)
    }

    fn own_keys(&self, object: &ScriptValue) -> InteropResult<Vec<ScriptValue>> {
        let proxy = self.heap.borrow().proxy_parts(object);
        if let Some((target, handler)) = proxy {
            let Some(trap) = self.trap(&handler, "ownKeys")? else {
                return self.own_keys(&target);
            };
            let keys = Scoped::new(self, self.call(trap.value(), &handler, &[target])?);
            let length = self.array_length(keys.value())?;
            let mut owned = ScopedList::empty(self);
            for index in 0..length {
                owned.push(self.array_get(keys.value(), index)?);
            }
            // Keys are strings and symbols, which carry no count
            return Ok(owned.values().to_vec());
        }
        let heap = self.heap.borrow();
        Ok(match &heap.slot(object)?.data {
            Data::Array(items) => (0..items.len())
                .map(|i| ScriptValue::String(i.to_string()))
                .collect(),
            data => data
                .properties()
                .map(|properties| properties.keys().map(PropKey::to_value).collect())
                .unwrap_or_default(),
        })
    }

    fn define_accessor(
        &self,
        object: &ScriptValue,
        name: &str,
        getter: Option<CallbackContext>,
        setter: Option<CallbackContext>,
    ) -> InteropResult<()> {
        self.store(
            object,
            PropKey::String(name.to_string()),
            Property::Accessor { getter, setter },
        )
    }

    fn array_length(&self, array: &ScriptValue) -> InteropResult<usize> {
        match &self.heap.borrow().slot(array)?.data {
            Data::Array(items) => Ok(items.len()),
            _ => Err(InteropError::type_error(format!("{array} is not an array"))),
        }
    }

    fn array_get(&self, array: &ScriptValue, index: usize) -> InteropResult<ScriptValue> {
        let mut heap = self.heap.borrow_mut();
        let item = match &heap.slot(array)?.data {
            Data::Array(items) => items.get(index).cloned().unwrap_or(ScriptValue::Undefined),
            _ => return Err(InteropError::type_error(format!("{array} is not an array"))),
        };
        heap.retain(&item)?;
        Ok(item)
    }

    fn array_push(&self, array: &ScriptValue, value: &ScriptValue) -> InteropResult<()> {
        let mut heap = self.heap.borrow_mut();
        heap.retain(value)?;
        match &mut heap.slot_mut(array)?.data {
            Data::Array(items) => {
                items.push(value.clone());
                Ok(())
            }
            _ => Err(InteropError::type_error(format!("{array} is not an array"))),
        }
    }

    fn map_set(
        &self,
        map: &ScriptValue,
        key: &ScriptValue,
        value: &ScriptValue,
    ) -> InteropResult<()> {
        let mut freed = Vec::new();
        {
            let mut heap = self.heap.borrow_mut();
            if !matches!(heap.slot(map)?.data, Data::Map(_)) {
                return Err(InteropError::type_error(format!("{map} is not a map")));
            }
            heap.retain(value)?;
            let Data::Map(entries) = &mut heap.slot_mut(map)?.data else {
                return Ok(());
            };
            let old = match entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => Some(std::mem::replace(slot, value.clone())),
                None => {
                    entries.push((key.clone(), value.clone()));
                    None
                }
            };
            match old {
                Some(old) => heap.release(&old, &mut freed),
                None => heap.retain(key)?,
            }
        }
        drop(freed);
        Ok(())
    }

    fn map_entries(&self, map: &ScriptValue) -> InteropResult<Vec<(ScriptValue, ScriptValue)>> {
        let mut heap = self.heap.borrow_mut();
        let entries = match &heap.slot(map)?.data {
            Data::Map(entries) => entries.clone(),
            _ => return Err(InteropError::type_error(format!("{map} is not a map"))),
        };
        for (key, value) in &entries {
            heap.retain(key)?;
            heap.retain(value)?;
        }
        Ok(entries)
    }

    fn set_add(&self, set: &ScriptValue, value: &ScriptValue) -> InteropResult<()> {
        let mut heap = self.heap.borrow_mut();
        let Data::Set(items) = &heap.slot(set)?.data else {
            return Err(InteropError::type_error(format!("{set} is not a set")));
        };
        if items.contains(value) {
            return Ok(());
        }
        heap.retain(value)?;
        if let Data::Set(items) = &mut heap.slot_mut(set)?.data {
            items.push(value.clone());
        }
        Ok(())
    }

    fn set_values(&self, set: &ScriptValue) -> InteropResult<Vec<ScriptValue>> {
        let mut heap = self.heap.borrow_mut();
        let items = match &heap.slot(set)?.data {
            Data::Set(items) => items.clone(),
            _ => return Err(InteropError::type_error(format!("{set} is not a set"))),
        };
        for item in &items {
            heap.retain(item)?;
        }
        Ok(items)
    }

    fn call(
        &self,
        function: &ScriptValue,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        let proxy = self.heap.borrow().proxy_parts(function);
        if let Some((target, handler)) = proxy {
            if !target.is_function() {
                return Err(InteropError::type_error(format!("{function} is not a function")));
            }
            return match self.trap(&handler, "apply")? {
                Some(trap) => {
                    let args = self.array_of(args)?;
                    self.call(
                        trap.value(),
                        &handler,
                        &[target, this.clone(), args.value().clone()],
                    )
                }
                None => self.call(&target, this, args),
            };
        }
        let callback = match &self.heap.borrow().slot(function)?.data {
            Data::Function { callback, .. } => callback.clone(),
            _ => return Err(InteropError::type_error(format!("{function} is not a function"))),
        };
        trace!(name = callback.name(), args = args.len(), "native call");
        callback.invoke(self, this, args)
    }

    fn construct(
        &self,
        constructor: &ScriptValue,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        let proxy = self.heap.borrow().proxy_parts(constructor);
        if let Some((target, handler)) = proxy {
            if !target.is_function() {
                return Err(InteropError::type_error(format!("{constructor} is not a constructor")));
            }
            return match self.trap(&handler, "construct")? {
                Some(trap) => {
                    let args = self.array_of(args)?;
                    self.call(
                        trap.value(),
                        &handler,
                        &[target, args.value().clone(), constructor.clone()],
                    )
                }
                None => self.construct(&target, args),
            };
        }
        let instance = Scoped::new(self, self.create_object()?);
        let result = self.call(constructor, instance.value(), args)?;
        if result.as_reference().is_some() {
            return Ok(result);
        }
        Ok(instance.escape())
    }

    fn set_host_data(&self, object: &ScriptValue, data: Rc<dyn Any>) -> InteropResult<()> {
        self.heap.borrow_mut().slot_mut(object)?.host_data = Some(data);
        Ok(())
    }

    fn host_data(&self, object: &ScriptValue) -> Option<Rc<dyn Any>> {
        self.heap.borrow().slot(object).ok()?.host_data.clone()
    }

    fn prototype_of(&self, prototype: BuiltinPrototype) -> InteropResult<ScriptValue> {
        let mut heap = self.heap.borrow_mut();
        let value = match heap.prototypes.get(&prototype).cloned() {
            Some(value) => value,
            None => {
                let value = heap.alloc(ReferenceKind::Object, Data::Object(IndexMap::new()));
                heap.prototypes.insert(prototype, value.clone());
                value
            }
        };
        heap.retain(&value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_frees_children() {
        let engine = InMemoryEngine::new();
        let object = engine.create_object().unwrap();
        let array = engine.create_array().unwrap();
        engine.set(&object, &"items".into(), &array).unwrap();
        engine.release(&array);
        assert_eq!(engine.live_handles(), 2);
        engine.release(&object);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn test_overwrite_releases_old_value() {
        let engine = InMemoryEngine::new();
        let object = engine.create_object().unwrap();
        let first = engine.create_object().unwrap();
        engine.set(&object, &"x".into(), &first).unwrap();
        engine.release(&first);
        engine.set(&object, &"x".into(), &ScriptValue::Integer(1)).unwrap();
        assert_eq!(engine.live_handles(), 1);
        assert_eq!(engine.get(&object, &"x".into()).unwrap(), ScriptValue::Integer(1));
        engine.release(&object);
    }

    #[test]
    fn test_use_after_release_fails() {
        let engine = InMemoryEngine::new();
        let object = engine.create_object().unwrap();
        engine.release(&object);
        assert!(matches!(engine.retain(&object), Err(InteropError::Engine(_))));
        assert!(engine.get(&object, &"x".into()).is_err());
    }

    #[test]
    fn test_native_function_call() {
        let engine = InMemoryEngine::new();
        let add = engine
            .create_function(CallbackContext::no_this_result("add", |_, args| {
                let sum: f64 = args.iter().filter_map(ScriptValue::as_number).sum();
                Ok(ScriptValue::Double(sum))
            }))
            .unwrap();
        let result = engine
            .call(&add, &ScriptValue::Undefined, &[1.into(), 2.5.into()])
            .unwrap();
        assert_eq!(result, ScriptValue::Double(3.5));
        engine.release(&add);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn test_accessor_property() {
        let engine = InMemoryEngine::new();
        let object = engine.create_object().unwrap();
        engine
            .define_accessor(
                &object,
                "answer",
                Some(CallbackContext::getter("answer", |_| Ok(ScriptValue::Integer(42)))),
                None,
            )
            .unwrap();
        assert_eq!(engine.get(&object, &"answer".into()).unwrap(), ScriptValue::Integer(42));
        assert!(!engine.set(&object, &"answer".into(), &1.into()).unwrap());
        engine.release(&object);
    }

    #[test]
    fn test_proxy_without_traps_forwards() {
        let engine = InMemoryEngine::new();
        let target = engine.create_object().unwrap();
        let handler = engine.create_object().unwrap();
        engine.set(&target, &"a".into(), &1.into()).unwrap();
        let proxy = engine.create_proxy(&target, &handler).unwrap();
        assert_eq!(engine.get(&proxy, &"a".into()).unwrap(), ScriptValue::Integer(1));
        assert_eq!(engine.own_keys(&proxy).unwrap(), vec![ScriptValue::from("a")]);
        engine.release(&target);
        engine.release(&handler);
        assert_eq!(engine.live_handles(), 3);
        engine.release(&proxy);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn test_prototypes_are_shared_and_uncounted() {
        let engine = InMemoryEngine::new();
        let first = engine.prototype_of(BuiltinPrototype::Array).unwrap();
        let second = engine.prototype_of(BuiltinPrototype::Array).unwrap();
        assert_eq!(first, second);
        engine.release(&first);
        engine.release(&second);
        assert_eq!(engine.live_handles(), 0);
    }
}
