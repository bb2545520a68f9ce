//! Value conversion across the boundary.
//!
//! Host → script: primitives go through the engine's primitive table,
//! collections are copied element by element (or proxied when the bridge
//! config asks for it), registered objects and classes always become
//! proxies. Script → host: primitives unwrap, arrays and sets become host
//! lists and sets, maps and plain objects become string-keyed host maps,
//! bridge proxies unwrap to the host value they wrap and anything else is
//! passed through as an opaque [`HostValue::Script`].
//!
//! Every intermediate engine value is held in a [`Scoped`] guard, so a
//! failure halfway through a collection releases what was already built.

use crate::bridge::Bridge;
use crate::engine::{Scoped, ScopedList, ScriptEngine};
use crate::error::{InteropError, InteropResult};
use crate::host::{HostList, HostMap, HostSet, HostValue};
use crate::script::{ReferenceKind, ScriptValue};
use crate::symbols;
use tracing::trace;

/// Convert a host value into an engine value owned by the caller
pub fn to_script(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    value: &HostValue,
) -> InteropResult<ScriptValue> {
    ToScript {
        engine,
        bridge,
        copy_collections: false,
    }
    .convert(value, 0)
}

/// Like [`to_script`], but collections are always copied, never proxied
pub fn to_script_copy(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    value: &HostValue,
) -> InteropResult<ScriptValue> {
    ToScript {
        engine,
        bridge,
        copy_collections: true,
    }
    .convert(value, 0)
}

/// Build a script array from host values
pub fn to_script_array(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    values: &[HostValue],
) -> InteropResult<ScriptValue> {
    ToScript {
        engine,
        bridge,
        copy_collections: false,
    }
    .array(values.iter(), 0)
}

/// Convert an engine value into a host value.
///
/// `value` is borrowed. Opaque references in the result stay valid only
/// while the caller's reference does.
pub fn to_host(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    value: &ScriptValue,
) -> InteropResult<HostValue> {
    ToHost { engine, bridge }.convert(value, 0)
}

fn check_depth(bridge: &Bridge, depth: usize) -> InteropResult<()> {
    let max = bridge.config().max_depth;
    if depth > max {
        return Err(InteropError::MaxDepthExceeded(max));
    }
    Ok(())
}

// ============================================================================
// Host → script
// ============================================================================

struct ToScript<'a> {
    engine: &'a dyn ScriptEngine,
    bridge: &'a Bridge,
    copy_collections: bool,
}

impl ToScript<'_> {
    fn convert(&self, value: &HostValue, depth: usize) -> InteropResult<ScriptValue> {
        let config = self.bridge.config();
        let proxy = |enabled: bool| enabled && !self.copy_collections;
        match value {
            HostValue::Null
            | HostValue::Bool(_)
            | HostValue::Byte(_)
            | HostValue::Short(_)
            | HostValue::Int(_)
            | HostValue::Long(_)
            | HostValue::Float(_)
            | HostValue::Double(_)
            | HostValue::Char(_)
            | HostValue::String(_)
            | HostValue::DateTime(_) => self.engine.create_primitive(value),
            HostValue::Script(script) => {
                self.engine.retain(script)?;
                Ok(script.clone())
            }
            HostValue::Map(_) if proxy(config.proxy_map_enabled) => {
                self.bridge.proxy_object(self.engine, value)
            }
            HostValue::Set(_) if proxy(config.proxy_set_enabled) => {
                self.bridge.proxy_object(self.engine, value)
            }
            HostValue::List(_) if proxy(config.proxy_list_enabled) => {
                self.bridge.proxy_object(self.engine, value)
            }
            HostValue::Array(_) if proxy(config.proxy_array_enabled) => {
                self.bridge.proxy_object(self.engine, value)
            }
            HostValue::Map(map) => self.object(map, depth),
            HostValue::Set(set) => self.set(set, depth),
            HostValue::List(list) => self.array(list.snapshot().iter(), depth),
            HostValue::Array(array) => self.array(array.snapshot().iter(), depth),
            HostValue::Object(_) => self.bridge.proxy_object(self.engine, value),
            HostValue::Class(class) => self.bridge.proxy_class(self.engine, class),
            HostValue::Direct(target) => self.bridge.proxy_direct(self.engine, target),
            HostValue::Iterator(_) => symbols::to_iterator(self.engine, self.bridge, value),
        }
    }

    fn object(&self, map: &HostMap, depth: usize) -> InteropResult<ScriptValue> {
        check_depth(self.bridge, depth + 1)?;
        let object = Scoped::new(self.engine, self.engine.create_object()?);
        for (key, item) in map.entries() {
            let item = Scoped::new(self.engine, self.convert(&item, depth + 1)?);
            self.engine
                .set(object.value(), &ScriptValue::String(key), item.value())?;
        }
        Ok(object.escape())
    }

    fn set(&self, set: &HostSet, depth: usize) -> InteropResult<ScriptValue> {
        check_depth(self.bridge, depth + 1)?;
        let target = Scoped::new(self.engine, self.engine.create_set()?);
        for item in set.snapshot() {
            let item = Scoped::new(self.engine, self.convert(&item, depth + 1)?);
            self.engine.set_add(target.value(), item.value())?;
        }
        Ok(target.escape())
    }

    fn array<'v>(
        &self,
        items: impl Iterator<Item = &'v HostValue>,
        depth: usize,
    ) -> InteropResult<ScriptValue> {
        check_depth(self.bridge, depth + 1)?;
        let array = Scoped::new(self.engine, self.engine.create_array()?);
        for item in items {
            let item = Scoped::new(self.engine, self.convert(item, depth + 1)?);
            self.engine.array_push(array.value(), item.value())?;
        }
        Ok(array.escape())
    }
}

// ============================================================================
// Script → host
// ============================================================================

struct ToHost<'a> {
    engine: &'a dyn ScriptEngine,
    bridge: &'a Bridge,
}

impl ToHost<'_> {
    fn convert(&self, value: &ScriptValue, depth: usize) -> InteropResult<HostValue> {
        let reference = match value {
            ScriptValue::Reference(reference) => reference,
            ScriptValue::Symbol(_) => return Ok(HostValue::Script(value.clone())),
            primitive => {
                return self.engine.to_host_primitive(primitive).ok_or_else(|| {
                    InteropError::conversion(format!("cannot convert {primitive:?}"))
                });
            }
        };

        if let Some(data) = self.engine.host_data(value) {
            if let Some(host) = data.downcast_ref::<HostValue>() {
                trace!(kind = host.type_name(), "unwrapped proxy");
                return Ok(host.clone());
            }
        }

        match reference.kind() {
            ReferenceKind::Array => self.list(value, depth),
            ReferenceKind::Set => self.set(value, depth),
            ReferenceKind::Map => self.map(value, depth),
            ReferenceKind::Object => self.object(value, depth),
            ReferenceKind::Function | ReferenceKind::Proxy => Ok(HostValue::Script(value.clone())),
        }
    }

    fn list(&self, array: &ScriptValue, depth: usize) -> InteropResult<HostValue> {
        check_depth(self.bridge, depth + 1)?;
        let length = self.engine.array_length(array)?;
        let mut items = Vec::with_capacity(length);
        for index in 0..length {
            let item = Scoped::new(self.engine, self.engine.array_get(array, index)?);
            items.push(self.convert(item.value(), depth + 1)?);
        }
        Ok(HostValue::List(HostList::from(items)))
    }

    fn set(&self, set: &ScriptValue, depth: usize) -> InteropResult<HostValue> {
        check_depth(self.bridge, depth + 1)?;
        let values = ScopedList::new(self.engine, self.engine.set_values(set)?);
        let target = HostSet::new();
        for item in values.values() {
            target.insert(self.convert(item, depth + 1)?)?;
        }
        Ok(HostValue::Set(target))
    }

    fn map(&self, map: &ScriptValue, depth: usize) -> InteropResult<HostValue> {
        check_depth(self.bridge, depth + 1)?;
        let entries = self.engine.map_entries(map)?;
        let _owned = ScopedList::new(
            self.engine,
            entries
                .iter()
                .flat_map(|(key, item)| [key.clone(), item.clone()])
                .collect(),
        );
        let target = HostMap::new();
        for (key, item) in &entries {
            target.insert(key.to_display_string(), self.convert(item, depth + 1)?)?;
        }
        Ok(HostValue::Map(target))
    }

    fn object(&self, object: &ScriptValue, depth: usize) -> InteropResult<HostValue> {
        check_depth(self.bridge, depth + 1)?;
        let skip_functions = self.bridge.config().skip_functions_in_object;
        let target = HostMap::new();
        for key in self.engine.own_keys(object)? {
            let Some(name) = key.as_str() else {
                continue;
            };
            let item = Scoped::new(self.engine, self.engine.get(object, &key)?);
            let item = item.value();
            if item.is_undefined() || (skip_functions && item.is_function()) {
                continue;
            }
            target.insert(name, self.convert(item, depth + 1)?)?;
        }
        Ok(HostValue::Map(target))
    }
}
