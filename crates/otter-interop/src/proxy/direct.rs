//! Direct-mode proxies: the host object implements the protocol itself.

use super::ProxyHandler;
use crate::bridge::Bridge;
use crate::engine::ScriptEngine;
use crate::error::{InteropError, InteropResult};
use crate::host::{DirectTarget, HostValue};
use crate::script::ScriptValue;

/// Capability object answering proxy operations without a descriptor.
///
/// Keys are passed as the script sees them; values cross as host values.
/// Every operation has a default, so an implementation only overrides
/// what it supports.
pub trait DirectProxy {
    /// Property value, `None` when absent
    fn proxy_get(&self, key: &ScriptValue) -> InteropResult<Option<HostValue>> {
        let _ = key;
        Ok(None)
    }

    /// Store a property; returns whether it was stored
    fn proxy_set(&self, key: &ScriptValue, value: HostValue) -> InteropResult<bool> {
        let _ = (key, value);
        Ok(false)
    }

    /// Whether the property exists
    fn proxy_has(&self, key: &ScriptValue) -> InteropResult<bool> {
        Ok(self.proxy_get(key)?.is_some())
    }

    /// Remove a property; returns whether it was removed
    fn proxy_delete(&self, key: &ScriptValue) -> InteropResult<bool> {
        let _ = key;
        Ok(false)
    }

    /// Property keys (strings or symbols)
    fn proxy_own_keys(&self) -> InteropResult<Vec<ScriptValue>> {
        Ok(Vec::new())
    }

    /// Whether the object can be called
    fn is_callable(&self) -> bool {
        false
    }

    /// Call the object
    fn proxy_apply(&self, this: HostValue, args: Vec<HostValue>) -> InteropResult<HostValue> {
        let _ = (this, args);
        Err(InteropError::type_error("object is not a function"))
    }
}

/// Handler delegating to a [`DirectProxy`]
pub struct DirectHandler {
    bridge: Bridge,
    direct: DirectTarget,
    target: HostValue,
}

impl DirectHandler {
    /// Handler over a capability object
    pub fn new(bridge: &Bridge, direct: &DirectTarget) -> Self {
        Self {
            bridge: bridge.clone(),
            direct: direct.clone(),
            target: HostValue::Direct(direct.clone()),
        }
    }
}

impl ProxyHandler for DirectHandler {
    fn target(&self) -> &HostValue {
        &self.target
    }

    fn is_callable(&self) -> bool {
        self.direct.inner().is_callable()
    }

    fn get(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        _: &ScriptValue,
    ) -> InteropResult<ScriptValue> {
        match self.direct.inner().proxy_get(key)? {
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
        let value = self.bridge.to_host(engine, value)?;
        self.direct.inner().proxy_set(key, value)
    }

    fn has(&self, _: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        self.direct.inner().proxy_has(key)
    }

    fn delete_property(&self, _: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        self.direct.inner().proxy_delete(key)
    }

    fn own_keys(&self, _: &dyn ScriptEngine) -> InteropResult<Vec<ScriptValue>> {
        self.direct.inner().proxy_own_keys()
    }

    fn apply(
        &self,
        engine: &dyn ScriptEngine,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        let this = self.bridge.to_host(engine, this)?;
        let args = args
            .iter()
            .map(|arg| self.bridge.to_host(engine, arg))
            .collect::<InteropResult<Vec<_>>>()?;
        let result = self.direct.inner().proxy_apply(this, args)?;
        self.bridge.to_script(engine, &result)
    }
}
