//! Reflective handler over registered classes and their instances.
//!
//! Object mode proxies an instance (or a built-in collection) through the
//! instance descriptor of its class. Class mode proxies the class itself:
//! static fields and methods, `new` through the constructors and calls
//! through static apply-functions.
//!
//! Writes try a named setter before the generic setters.

use super::ProxyHandler;
use crate::bridge::Bridge;
use crate::collections;
use crate::descriptor::{ClassDescriptor, Overloads, ProxyMode, TargetKind};
use crate::dispatch::CallbackContext;
use crate::engine::{BuiltinPrototype, ScriptEngine};
use crate::error::{InteropError, InteropResult};
use crate::host::HostValue;
use crate::registration::{Callable, HostCall, HostClass};
use crate::scorer::{self, Invocation, VirtualArgument};
use crate::script::ScriptValue;
use crate::types::HostType;
use crate::{collection, polyfill, symbols};
use std::sync::Arc;
use tracing::trace;

/// Handler for reflection-mode and class-mode proxies
pub struct ReflectionHandler {
    bridge: Bridge,
    target: HostValue,
    descriptor: Arc<ClassDescriptor>,
}

impl ReflectionHandler {
    /// Handler over an instance or a built-in collection
    pub fn for_object(bridge: &Bridge, target: HostValue) -> InteropResult<Self> {
        let class = collections::class_of(&target).ok_or_else(|| {
            InteropError::type_error(format!("{} cannot be proxied", target.type_name()))
        })?;
        Ok(Self {
            bridge: bridge.clone(),
            descriptor: bridge.descriptor(&class, ProxyMode::Object),
            target,
        })
    }

    /// Handler over a class's static side
    pub fn for_class(bridge: &Bridge, class: &Arc<HostClass>) -> Self {
        Self {
            bridge: bridge.clone(),
            descriptor: bridge.descriptor(class, ProxyMode::Class),
            target: HostValue::Class(class.clone()),
        }
    }

    /// Descriptor driving this handler
    pub fn descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.descriptor
    }

    fn is_object_mode(&self) -> bool {
        self.descriptor.mode() == ProxyMode::Object
    }

    fn invocation<'a>(
        &'a self,
        engine: &'a dyn ScriptEngine,
        member: &'a str,
        this: &'a ScriptValue,
    ) -> Invocation<'a> {
        Invocation::new(engine, &self.bridge, member)
            .with_target(&self.target)
            .with_this(this)
    }

    fn receiver(&self, callable: &Callable) -> HostValue {
        if callable.is_static() {
            HostValue::Null
        } else {
            self.target.clone()
        }
    }

    /// The overload set as a script function bound to this target
    fn method_function(
        &self,
        engine: &dyn ScriptEngine,
        name: &str,
        methods: &Overloads,
    ) -> InteropResult<ScriptValue> {
        let bridge = self.bridge.clone();
        let target = self.target.clone();
        let methods = methods.clone();
        let member = name.to_string();
        engine.create_function(CallbackContext::this_result(
            name,
            move |engine, this, args| {
                let args = scorer::virtual_arguments(args);
                let cx = Invocation::new(engine, &bridge, &member)
                    .with_target(&target)
                    .with_this(this);
                let result = scorer::execute(&methods, &args, &cx)?;
                bridge.to_script(engine, &result)
            },
        ))
    }

    /// Host form of `value` for a parameter of type `param`, if it fits.
    ///
    /// Tries the raw script value for script-typed parameters, then the
    /// converted value when assignable, then exact and approximate
    /// primitive coercion. `allow_null` admits null for non-primitive
    /// parameters.
    fn fit(
        &self,
        engine: &dyn ScriptEngine,
        param: &HostType,
        value: &ScriptValue,
        allow_null: bool,
    ) -> InteropResult<Option<HostValue>> {
        if let HostType::Script(kind) = param {
            return Ok(kind
                .accepts(value.kind())
                .then(|| HostValue::Script(value.clone())));
        }
        let host = self.bridge.to_host(engine, value)?;
        match host {
            HostValue::Null if allow_null && !param.is_primitive() => Ok(Some(HostValue::Null)),
            HostValue::Null | HostValue::Script(_) => Ok(None),
            host if param.is_assignable_from(&host) => Ok(Some(host)),
            host => Ok(param
                .coerce_exact(&host)
                .or_else(|| param.coerce_approximate(&host))),
        }
    }

    /// First non-null result of a generic getter accepting `key`
    fn generic_get(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
    ) -> InteropResult<Option<HostValue>> {
        for getter in self.descriptor.generic_getters() {
            let Some(param) = getter.params().first() else {
                continue;
            };
            let Some(host_key) = self.fit(engine, param, key, false)? else {
                continue;
            };
            let mut call =
                HostCall::new(engine, &self.bridge, self.receiver(getter), vec![host_key]);
            let value = getter.invoke(&mut call)?;
            if !value.is_null() {
                trace!(getter = getter.name(), key = %key, "generic getter hit");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Write through the first generic setter accepting `key` and `value`
    fn generic_set(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        value: &ScriptValue,
    ) -> InteropResult<bool> {
        for setter in self.descriptor.generic_setters() {
            let [key_param, value_param] = setter.params() else {
                continue;
            };
            let Some(host_key) = self.fit(engine, key_param, key, false)? else {
                continue;
            };
            let Some(host_value) = self.fit(engine, value_param, value, true)? else {
                continue;
            };
            let mut call = HostCall::new(
                engine,
                &self.bridge,
                self.receiver(setter),
                vec![host_key, host_value],
            );
            setter.invoke(&mut call)?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl ProxyHandler for ReflectionHandler {
    fn target(&self) -> &HostValue {
        &self.target
    }

    fn is_callable(&self) -> bool {
        !self.is_object_mode() || !self.descriptor.apply_functions().is_empty()
    }

    fn prototype(&self) -> BuiltinPrototype {
        match self.descriptor.target_kind() {
            TargetKind::List | TargetKind::Array => BuiltinPrototype::Array,
            TargetKind::Map => BuiltinPrototype::Map,
            TargetKind::Set => BuiltinPrototype::Set,
            TargetKind::Class => BuiltinPrototype::Function,
            TargetKind::Object | TargetKind::Primitive => BuiltinPrototype::Object,
        }
    }

    fn get(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        receiver: &ScriptValue,
    ) -> InteropResult<ScriptValue> {
        let object_mode = self.is_object_mode();
        if object_mode {
            if let Some(value) = collection::get(&self.target, key) {
                return self.bridge.to_script(engine, &value);
            }
        }

        let mut null_field = false;
        if let Some(name) = key.as_str() {
            if let Some(field) = self.descriptor.field(name) {
                let value = field.read(&self.target)?;
                if !value.is_null() {
                    return self.bridge.to_script(engine, &value);
                }
                null_field = true;
            }
            if let Some(methods) = self.descriptor.methods(name) {
                return self.method_function(engine, name, methods);
            }
            if let Some(getters) = self.descriptor.getters(name) {
                let cx = self.invocation(engine, name, receiver);
                return match scorer::execute(getters, &[], &cx) {
                    Ok(value) => self.bridge.to_script(engine, &value),
                    Err(InteropError::NoViableOverload { .. }) => Ok(ScriptValue::Undefined),
                    Err(err) => Err(err),
                };
            }
        }

        if object_mode {
            if let ScriptValue::Symbol(symbol) = key {
                let function = symbols::protocol(engine, &self.bridge, &self.target, symbol)?;
                if let Some(function) = function {
                    return Ok(function);
                }
            }
            if let Some(value) = self.generic_get(engine, key)? {
                return self.bridge.to_script(engine, &value);
            }
            if let Some((name, polyfill)) = polyfill::lookup(self.descriptor.target_kind(), key) {
                return polyfill::resolve(engine, &self.bridge, &self.target, name, polyfill);
            }
        }

        Ok(if null_field {
            ScriptValue::Null
        } else {
            ScriptValue::Undefined
        })
    }

    fn set(
        &self,
        engine: &dyn ScriptEngine,
        key: &ScriptValue,
        value: &ScriptValue,
        receiver: &ScriptValue,
    ) -> InteropResult<bool> {
        if self.is_object_mode() && key.as_index().is_some() {
            let host = self.bridge.to_host(engine, value)?;
            if collection::set(&self.target, key, host)? {
                return Ok(true);
            }
        }

        if let Some(name) = key.as_str() {
            if let Some(field) = self.descriptor.field(name).filter(|f| !f.is_final()) {
                let host = self.bridge.to_host(engine, value)?;
                field.write(&self.target, host)?;
                return Ok(true);
            }
            if let Some(setters) = self.descriptor.setters(name) {
                let args = [VirtualArgument::from_script(value.clone())];
                let cx = self.invocation(engine, name, receiver);
                match scorer::execute(setters, &args, &cx) {
                    Ok(_) => return Ok(true),
                    Err(InteropError::NoViableOverload { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
        }

        self.generic_set(engine, key, value)
    }

    fn has(&self, engine: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        if self.is_object_mode() && collection::has(&self.target, key) {
            return Ok(true);
        }
        if key.as_str().is_some_and(|name| self.descriptor.has_member(name)) {
            return Ok(true);
        }
        // A throwing indexer only means the key is absent
        Ok(matches!(self.generic_get(engine, key), Ok(Some(_))))
    }

    fn delete_property(&self, _: &dyn ScriptEngine, key: &ScriptValue) -> InteropResult<bool> {
        if !self.is_object_mode() {
            return Ok(false);
        }
        collection::delete(&self.target, key)
    }

    fn own_keys(&self, _: &dyn ScriptEngine) -> InteropResult<Vec<ScriptValue>> {
        // An empty collection still enumerates its members
        let keys = if self.is_object_mode() {
            collection::keys(&self.target).filter(|keys| !keys.is_empty())
        } else {
            None
        };
        Ok(match keys {
            Some(keys) => keys.into_iter().map(ScriptValue::String).collect(),
            None => self
                .descriptor
                .unique_keys()
                .iter()
                .map(|key| ScriptValue::from(key.as_str()))
                .collect(),
        })
    }

    fn apply(
        &self,
        engine: &dyn ScriptEngine,
        this: &ScriptValue,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        let args = scorer::virtual_arguments(args);
        let cx = self.invocation(engine, "apply", this);
        let result = scorer::execute(self.descriptor.apply_functions(), &args, &cx)?;
        self.bridge.to_script(engine, &result)
    }

    fn construct(
        &self,
        engine: &dyn ScriptEngine,
        args: &[ScriptValue],
    ) -> InteropResult<ScriptValue> {
        let name = self.descriptor.class().name();
        if self.is_object_mode() {
            return Err(InteropError::type_error(format!("{name} is not a constructor")));
        }
        let args = scorer::virtual_arguments(args);
        let cx = Invocation::new(engine, &self.bridge, name);
        let instance = scorer::execute(self.descriptor.constructors(), &args, &cx)?;
        self.bridge.to_script(engine, &instance)
    }
}
