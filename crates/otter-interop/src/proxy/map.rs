//! Fast path for host maps: the proxy reads and writes entries directly,
//! with stringified keys, bypassing descriptors and overload scoring.

use super::ProxyHandler;
use crate::bridge::Bridge;
use crate::engine::{BuiltinPrototype, ScriptEngine};
use crate::error::InteropResult;
use crate::host::{HostMap, HostValue};
use crate::script::ScriptValue;

/// Handler exposing map entries as plain properties
pub struct MapHandler {
    bridge: Bridge,
    map: HostMap,
    target: HostValue,
}

impl MapHandler {
    /// Handler over `map`
    pub fn new(bridge: &Bridge, map: &HostMap) -> Self {
        Self {
            bridge: bridge.clone(),
            map: map.clone(),
            target: HostValue::Map(map.clone()),
        }
    }
}

/// Entry key of a property key; symbols never name entries
fn entry_key(key: &ScriptValue) -> Option<String> {
    match key {
        ScriptValue::Symbol(_) => None,
        other => Some(other.to_display_string()),
    }
}

impl ProxyHandler for MapHandler {
    fn target(&self) -> &HostValue {
        &self.target
    }

    fn prototype(&self) -> BuiltinPrototype {
        BuiltinPrototype::Map
    }

    fn get(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        _: &ScriptValue,
    ) -> InteropResult<ScriptValue> {
        match entry_key(key).and_then(|key| self.map.get(&key)) {
            Some(value) => self.bridge.to_script(engine, &value),
            None => Ok(ScriptValue::Undefined),
        }
    }

    fn set(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        value: &ScriptValue,
        _: &ScriptValue,
    ) -> InteropResult<bool> {
        let Some(key) = entry_key(key) else {
            return Ok(false);
        };
        let value = self.bridge.to_host(engine, value)?;
        self.map.insert(key, value)?;
        Ok(true)
    }

    fn has(&self, _: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        Ok(entry_key(key).is_some_and(|key| self.map.contains_key(&key)))
    }

    fn delete_property(&self, _: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        match entry_key(key) {
            Some(key) => Ok(self.map.remove(&key)?.is_some()),
            None => Ok(false),
        }
    }

    fn own_keys(&self, _: &dyn ScriptEngine) -> InteropResult<Vec<ScriptValue>> {
        Ok(self.map.keys().into_iter().map(ScriptValue::String).collect())
    }
}
