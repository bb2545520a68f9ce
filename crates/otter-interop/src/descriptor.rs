//! Member descriptors and their registry.
//!
//! A [`ClassDescriptor`] is the flattened member table of one registered
//! class as seen through one proxy mode: fields, overload sets keyed by
//! exposed name, indexers, apply-functions, constructors and the
//! enumerable key set. Descriptors are built once per
//! (class, proxy mode, conversion mode) and shared through the
//! [`DescriptorRegistry`].

use crate::naming;
use crate::registration::{Callable, Field, HostClass};
use crate::types::ClassId;
use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Shape of a proxied target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A class proxied for static access and construction
    Class,
    /// Arbitrary object instance
    Object,
    /// Ordered growable collection
    List,
    /// String-keyed mapping
    Map,
    /// Unique-element collection
    Set,
    /// Fixed-length typed array
    Array,
    /// Primitive wrapper
    Primitive,
}

impl TargetKind {
    /// List and array targets support numeric indexes
    pub fn is_indexed(self) -> bool {
        matches!(self, TargetKind::List | TargetKind::Array)
    }

    /// Map and set targets enumerate their contents instead of members
    pub fn is_keyed_collection(self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::Set)
    }
}

/// Which members a class exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConversionMode {
    /// Every registered member
    #[default]
    Transparent,
    /// Only members marked `allow`
    AllowOnly,
    /// Every member not marked `block`
    BlockOnly,
}

/// How a descriptor views its class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyMode {
    /// Static members and constructors
    Class,
    /// Instance and static members
    Object,
}

/// Overload set: candidates sharing one exposed name, in discovery order
pub type Overloads = Vec<Arc<Callable>>;

/// Flattened member table of one class
#[derive(Debug)]
pub struct ClassDescriptor {
    class: Arc<HostClass>,
    mode: ProxyMode,
    conversion_mode: ConversionMode,
    target_kind: TargetKind,
    fields: IndexMap<String, Arc<Field>>,
    methods: IndexMap<String, Overloads>,
    getters: IndexMap<String, Overloads>,
    setters: IndexMap<String, Overloads>,
    generic_getters: Overloads,
    generic_setters: Overloads,
    apply_functions: Overloads,
    constructors: Overloads,
    unique_keys: IndexSet<String>,
}

impl ClassDescriptor {
    /// Build the descriptor of `class` walking its ancestors, most-derived first.
    ///
    /// Duplicate field names keep the first discovery.
    pub fn build(class: &Arc<HostClass>, mode: ProxyMode, conversion_mode: ConversionMode) -> Self {
        let target_kind = match mode {
            ProxyMode::Class => TargetKind::Class,
            ProxyMode::Object => class.target_kind(),
        };
        let mut descriptor = Self {
            class: class.clone(),
            mode,
            conversion_mode,
            target_kind,
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            getters: IndexMap::new(),
            setters: IndexMap::new(),
            generic_getters: Vec::new(),
            generic_setters: Vec::new(),
            apply_functions: Vec::new(),
            constructors: Vec::new(),
            unique_keys: IndexSet::new(),
        };

        if mode == ProxyMode::Class {
            descriptor.constructors = class
                .constructors()
                .iter()
                .filter(|c| c.markers().is_allowed(conversion_mode))
                .cloned()
                .collect();
        }

        let static_only = mode == ProxyMode::Class;
        for current in class.ancestors() {
            for field in current.fields() {
                if static_only && !field.is_static() {
                    continue;
                }
                if field.markers().is_allowed(conversion_mode) {
                    descriptor.add_field(field);
                }
            }
            for method in current.methods() {
                if static_only && !method.is_static() {
                    continue;
                }
                if method.markers().is_allowed(conversion_mode) {
                    descriptor.add_method(method);
                }
            }
        }
        descriptor
    }

    fn add_field(&mut self, field: &Arc<Field>) {
        let name = field.exposed_name();
        if self.fields.contains_key(name) {
            return;
        }
        self.fields.insert(name.to_string(), field.clone());
        if !self.target_kind.is_keyed_collection() {
            self.unique_keys.insert(name.to_string());
        }
    }

    fn add_method(&mut self, method: &Arc<Callable>) {
        let alias = method.markers().alias.as_deref();
        let arity = method.params().len();
        if naming::is_generic_getter(method) {
            self.generic_getters.push(method.clone());
        } else if naming::is_generic_setter(method) {
            self.generic_setters.push(method.clone());
        } else if method.markers().apply {
            self.apply_functions.push(method.clone());
        } else if let Some(start) = naming::getter_prefix_len(method.name(), arity) {
            insert_overload(&mut self.getters, method, start, alias);
            if !self.target_kind.is_keyed_collection() {
                if let Some(key) = naming::enumerated_key(method.name(), start) {
                    self.unique_keys.insert(key);
                }
            }
        } else if let Some(start) = naming::setter_prefix_len(method.name(), arity) {
            insert_overload(&mut self.setters, method, start, alias);
        }
        insert_overload(&mut self.methods, method, 0, alias);
    }

    /// The described class
    pub fn class(&self) -> &Arc<HostClass> {
        &self.class
    }

    /// Proxy mode the descriptor was built for
    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    /// Conversion mode the descriptor was built for
    pub fn conversion_mode(&self) -> ConversionMode {
        self.conversion_mode
    }

    /// Target shape
    pub fn target_kind(&self) -> TargetKind {
        self.target_kind
    }

    /// Field exposed under `name`
    pub fn field(&self, name: &str) -> Option<&Arc<Field>> {
        self.fields.get(name)
    }

    /// Methods exposed under `name`
    pub fn methods(&self, name: &str) -> Option<&Overloads> {
        self.methods.get(name)
    }

    /// Named getters exposed under `name`
    pub fn getters(&self, name: &str) -> Option<&Overloads> {
        self.getters.get(name)
    }

    /// Named setters exposed under `name`
    pub fn setters(&self, name: &str) -> Option<&Overloads> {
        self.setters.get(name)
    }

    /// Whether a field, method, getter or setter is exposed under `name`
    pub fn has_member(&self, name: &str) -> bool {
        self.fields.contains_key(name)
            || self.methods.contains_key(name)
            || self.getters.contains_key(name)
            || self.setters.contains_key(name)
    }

    /// All fields by exposed name
    pub fn field_map(&self) -> &IndexMap<String, Arc<Field>> {
        &self.fields
    }

    /// All method overload sets by exposed name
    pub fn methods_map(&self) -> &IndexMap<String, Overloads> {
        &self.methods
    }

    /// All getter overload sets by exposed name
    pub fn getters_map(&self) -> &IndexMap<String, Overloads> {
        &self.getters
    }

    /// All setter overload sets by exposed name
    pub fn setters_map(&self) -> &IndexMap<String, Overloads> {
        &self.setters
    }

    /// Indexer-style getters
    pub fn generic_getters(&self) -> &[Arc<Callable>] {
        &self.generic_getters
    }

    /// Indexer-style setters
    pub fn generic_setters(&self) -> &[Arc<Callable>] {
        &self.generic_setters
    }

    /// Callables invoked when the proxy is called as a function
    pub fn apply_functions(&self) -> &[Arc<Callable>] {
        &self.apply_functions
    }

    /// Constructors (class mode only)
    pub fn constructors(&self) -> &[Arc<Callable>] {
        &self.constructors
    }

    /// Keys reported by own-keys enumeration, in discovery order
    pub fn unique_keys(&self) -> &IndexSet<String> {
        &self.unique_keys
    }
}

fn insert_overload(
    map: &mut IndexMap<String, Overloads>,
    method: &Arc<Callable>,
    start: usize,
    alias: Option<&str>,
) {
    for name in naming::exposed_names(method.name(), start, alias) {
        map.entry(name).or_default().push(method.clone());
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Cache key of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorKey {
    /// Described class
    pub class: ClassId,
    /// Proxy mode
    pub mode: ProxyMode,
    /// Conversion mode
    pub conversion_mode: ConversionMode,
}

/// Thread-safe descriptor cache.
///
/// Owned by the embedding context (see [`crate::Bridge`]); several engines
/// on different threads may share one registry. A registry assumes one
/// [`HostClass`] per Rust type.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: DashMap<DescriptorKey, Arc<ClassDescriptor>>,
}

impl DescriptorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor of `class` under its own conversion mode
    pub fn get(&self, class: &Arc<HostClass>, mode: ProxyMode) -> Arc<ClassDescriptor> {
        self.get_or_build(class, mode, class.conversion_mode())
    }

    /// Cached descriptor for (class, mode, conversion mode), built on first use
    pub fn get_or_build(
        &self,
        class: &Arc<HostClass>,
        mode: ProxyMode,
        conversion_mode: ConversionMode,
    ) -> Arc<ClassDescriptor> {
        let key = DescriptorKey {
            class: class.id(),
            mode,
            conversion_mode,
        };
        if let Some(descriptor) = self.descriptors.get(&key) {
            trace!(class = class.name(), ?mode, "descriptor cache hit");
            return descriptor.clone();
        }
        self.descriptors
            .entry(key)
            .or_insert_with(|| {
                let descriptor = ClassDescriptor::build(class, mode, conversion_mode);
                debug!(
                    class = class.name(),
                    ?mode,
                    ?conversion_mode,
                    fields = descriptor.fields.len(),
                    methods = descriptor.methods.len(),
                    getters = descriptor.getters.len(),
                    setters = descriptor.setters.len(),
                    "built class descriptor"
                );
                Arc::new(descriptor)
            })
            .clone()
    }

    /// Drop every descriptor of `class`
    pub fn invalidate(&self, class: ClassId) -> usize {
        let before = self.descriptors.len();
        self.descriptors.retain(|key, _| key.class != class);
        let removed = before - self.descriptors.len();
        debug!(removed, "invalidated class descriptors");
        removed
    }

    /// Drop every descriptor
    pub fn clear(&self) {
        debug!(count = self.descriptors.len(), "cleared descriptor registry");
        self.descriptors.clear();
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// No cached descriptors
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostValue;
    use crate::registration::HostClass;
    use crate::types::HostType;

    struct Account {
        id: i32,
    }

    fn account_class() -> Arc<HostClass> {
        HostClass::builder::<Account>("Account")
            .final_field("id", HostType::Int, |a| a.id.into())
            .method("getId", [], |a, _| Ok(a.id.into()))
            .method("getHTTPCode", [], |_, _| Ok(HostValue::Int(200)))
            .method("setOwner", [HostType::String], |_, _| Ok(HostValue::Null))
            .method("get", [HostType::String], |_, _| Ok(HostValue::Null))
            .method("put", [HostType::String, HostType::Any], |_, _| Ok(HostValue::Null))
            .method("invoke", [HostType::Any], |_, _| Ok(HostValue::Null))
            .apply()
            .static_method("create", [], |_| Ok(HostValue::Null))
            .constructor([HostType::Int], |call| Ok(Account { id: call.int(0)? }))
            .build()
    }

    #[test]
    fn test_object_mode_classification() {
        let descriptor = ClassDescriptor::build(
            &account_class(),
            ProxyMode::Object,
            ConversionMode::Transparent,
        );

        assert!(descriptor.field("id").is_some());
        assert!(descriptor.getters("id").is_some());
        assert_eq!(descriptor.getters("httpCode").map(Vec::len), Some(1));
        assert!(descriptor.setters("owner").is_some());
        assert!(descriptor.methods("getId").is_some());
        assert!(descriptor.methods("setOwner").is_some());
        assert_eq!(descriptor.generic_getters().len(), 1);
        assert_eq!(descriptor.generic_setters().len(), 1);
        assert_eq!(descriptor.apply_functions().len(), 1);
        assert!(descriptor.methods("create").is_some());
        assert!(descriptor.constructors().is_empty());

        let keys: Vec<&str> = descriptor.unique_keys().iter().map(String::as_str).collect();
        assert_eq!(keys, ["id", "httpCode"]);
    }

    #[test]
    fn test_class_mode_sees_statics_and_constructors() {
        let descriptor = ClassDescriptor::build(
            &account_class(),
            ProxyMode::Class,
            ConversionMode::Transparent,
        );
        assert_eq!(descriptor.target_kind(), TargetKind::Class);
        assert_eq!(descriptor.constructors().len(), 1);
        assert!(descriptor.methods("create").is_some());
        assert!(descriptor.methods("getId").is_none());
        assert!(descriptor.field("id").is_none());
    }

    #[test]
    fn test_allow_only_hides_unmarked_members() {
        let class = HostClass::builder::<Account>("Account")
            .final_field("id", HostType::Int, |a| a.id.into())
            .allow()
            .method("getSecret", [], |_, _| Ok(HostValue::Null))
            .build();
        let descriptor =
            ClassDescriptor::build(&class, ProxyMode::Object, ConversionMode::AllowOnly);
        assert!(descriptor.field("id").is_some());
        assert!(descriptor.getters("secret").is_none());
        assert!(!descriptor.has_member("getSecret"));
    }

    #[test]
    fn test_registry_is_idempotent() {
        let registry = DescriptorRegistry::new();
        let class = account_class();
        let first = registry.get_or_build(&class, ProxyMode::Object, ConversionMode::Transparent);
        let second = registry.get_or_build(&class, ProxyMode::Object, ConversionMode::Transparent);
        assert!(Arc::ptr_eq(&first, &second));

        let blocked = registry.get_or_build(&class, ProxyMode::Object, ConversionMode::BlockOnly);
        assert!(!Arc::ptr_eq(&first, &blocked));
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.invalidate(class.id()), 2);
        assert!(registry.is_empty());
    }
}
