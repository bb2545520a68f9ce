//! The embedding context.
//!
//! A [`Bridge`] owns the descriptor registry handle and the converter
//! configuration. It is cheap to clone; clones share both. Bridges are
//! `Send + Sync`, so one registry can serve several engines on different
//! threads while each engine drives its own proxies.

use crate::config::BridgeConfig;
use crate::convert;
use crate::descriptor::{ClassDescriptor, DescriptorRegistry, ProxyMode};
use crate::engine::{Scoped, ScopedList, ScriptEngine};
use crate::error::InteropResult;
use crate::host::{DirectTarget, HostMap, HostValue};
use crate::proxy::{self, DirectHandler, MapHandler, ReflectionHandler};
use crate::registration::HostClass;
use crate::script::ScriptValue;
use std::rc::Rc;
use std::sync::Arc;

struct BridgeInner {
    registry: Arc<DescriptorRegistry>,
    config: BridgeConfig,
}

/// Registry plus configuration, passed to every trap and conversion
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    /// Bridge with a private registry and the default config
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Bridge with a private registry
    pub fn with_config(config: BridgeConfig) -> Self {
        Self::with_registry(Arc::new(DescriptorRegistry::new()), config)
    }

    /// Bridge sharing `registry` with other bridges
    pub fn with_registry(registry: Arc<DescriptorRegistry>, config: BridgeConfig) -> Self {
        Self {
            inner: Arc::new(BridgeInner { registry, config }),
        }
    }

    /// Descriptor registry
    pub fn registry(&self) -> &Arc<DescriptorRegistry> {
        &self.inner.registry
    }

    /// Converter configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Cached descriptor of `class` in `mode`
    pub fn descriptor(&self, class: &Arc<HostClass>, mode: ProxyMode) -> Arc<ClassDescriptor> {
        self.inner.registry.get(class, mode)
    }

    /// See [`convert::to_script`]
    pub fn to_script(
        &self,
        engine: &dyn ScriptEngine,
        value: &HostValue,
    ) -> InteropResult<ScriptValue> {
        convert::to_script(engine, self, value)
    }

    /// See [`convert::to_host`]
    pub fn to_host(
        &self,
        engine: &dyn ScriptEngine,
        value: &ScriptValue,
    ) -> InteropResult<HostValue> {
        convert::to_host(engine, self, value)
    }

    /// Call a script function with host arguments.
    ///
    /// Converted arguments are released after the call. A script value
    /// returned unconverted ([`HostValue::Script`]) is retained for the
    /// caller, who must release it.
    pub fn call_function(
        &self,
        engine: &dyn ScriptEngine,
        function: &ScriptValue,
        this: &ScriptValue,
        args: &[HostValue],
    ) -> InteropResult<HostValue> {
        let mut converted = ScopedList::empty(engine);
        for arg in args {
            converted.push(self.to_script(engine, arg)?);
        }
        let result = Scoped::new(engine, engine.call(function, this, converted.values())?);
        let host = self.to_host(engine, result.value())?;
        if let HostValue::Script(value) = &host {
            engine.retain(value)?;
        }
        Ok(host)
    }

    /// Reflection proxy over an instance or a host collection
    pub fn proxy_object(
        &self,
        engine: &dyn ScriptEngine,
        value: &HostValue,
    ) -> InteropResult<ScriptValue> {
        let handler = ReflectionHandler::for_object(self, value.clone())?;
        proxy::install(engine, Rc::new(handler))
    }

    /// Class proxy exposing static members and construction
    pub fn proxy_class(
        &self,
        engine: &dyn ScriptEngine,
        class: &Arc<HostClass>,
    ) -> InteropResult<ScriptValue> {
        proxy::install(engine, Rc::new(ReflectionHandler::for_class(self, class)))
    }

    /// Map proxy reading and writing entries as plain properties
    pub fn proxy_map(
        &self,
        engine: &dyn ScriptEngine,
        map: &HostMap,
    ) -> InteropResult<ScriptValue> {
        proxy::install(engine, Rc::new(MapHandler::new(self, map)))
    }

    /// Proxy delegating to a host capability object
    pub fn proxy_direct(
        &self,
        engine: &dyn ScriptEngine,
        target: &DirectTarget,
    ) -> InteropResult<ScriptValue> {
        proxy::install(engine, Rc::new(DirectHandler::new(self, target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_bridge_is_shareable() {
        assert_send_sync::<Bridge>();
    }

    #[test]
    fn test_shared_registry() {
        let registry = Arc::new(DescriptorRegistry::new());
        let a = Bridge::with_registry(registry.clone(), BridgeConfig::default());
        let b = Bridge::with_registry(registry.clone(), BridgeConfig::proxy_collections());
        let class = crate::collections::LIST_CLASS.clone();
        let first = a.descriptor(&class, ProxyMode::Object);
        let second = b.descriptor(&class, ProxyMode::Object);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(b.config().proxy_list_enabled);
    }
}
