//! Explicit per-type member registration.
//!
//! Host code describes each exposed Rust type once with a [`ClassBuilder`]:
//! fields, methods, static methods and constructors in declaration order,
//! each carrying static parameter types and optional [`MemberMarkers`].
//! Members keep their literal names (`getX`, `setFoo`, `put`); descriptor
//! construction classifies them into getters, setters and indexers.
//!
//! ```ignore
//! let point = HostClass::builder::<Point>("Point")
//!     .field("x", HostType::Int, |p| p.x.into(), |p, v| { p.x = int_of(&v)?; Ok(()) })
//!     .method("getLength", [], |p, _| Ok(p.length().into()))
//!     .constructor([HostType::Int, HostType::Int], |call| {
//!         Ok(Point::new(call.int(0)?, call.int(1)?))
//!     })
//!     .build();
//! ```

use crate::bridge::Bridge;
use crate::descriptor::{ConversionMode, TargetKind};
use crate::engine::ScriptEngine;
use crate::error::{InteropError, InteropResult};
use crate::host::{HostObject, HostValue};
use crate::script::ScriptValue;
use crate::types::{ClassId, HostType};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tracing::warn;

/// Per-member markers: aliasing, exposure restriction and classification
/// overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberMarkers {
    /// Exposed name replacing the derived one
    pub alias: Option<String>,
    /// Exposed under [`ConversionMode::AllowOnly`]
    pub allow: bool,
    /// Hidden under [`ConversionMode::BlockOnly`]
    pub block: bool,
    /// Indexer-style getter taking an arbitrary key
    pub generic_getter: bool,
    /// Indexer-style setter taking a key and a value
    pub generic_setter: bool,
    /// Invoked when the proxy itself is called as a function
    pub apply: bool,
    /// Receives the script `this` as an implicit leading argument
    pub this_required: bool,
}

impl MemberMarkers {
    /// Whether a member with these markers is exposed under `mode`
    pub fn is_allowed(&self, mode: ConversionMode) -> bool {
        match mode {
            ConversionMode::Transparent => true,
            ConversionMode::AllowOnly => self.allow,
            ConversionMode::BlockOnly => !self.block,
        }
    }
}

// ============================================================================
// Call context
// ============================================================================

/// Arguments and environment handed to a member callable
pub struct HostCall<'a> {
    engine: &'a dyn ScriptEngine,
    bridge: &'a Bridge,
    this: HostValue,
    args: Vec<HostValue>,
}

impl<'a> HostCall<'a> {
    /// Create a call context; `this` is null for static members
    pub fn new(
        engine: &'a dyn ScriptEngine,
        bridge: &'a Bridge,
        this: HostValue,
        args: Vec<HostValue>,
    ) -> Self {
        Self {
            engine,
            bridge,
            this,
            args,
        }
    }

    /// Engine driving the call
    pub fn engine(&self) -> &'a dyn ScriptEngine {
        self.engine
    }

    /// Bridge the call came through
    pub fn bridge(&self) -> &'a Bridge {
        self.bridge
    }

    /// Receiver (null for static members and constructors)
    pub fn this(&self) -> &HostValue {
        &self.this
    }

    /// Coerced arguments, one per declared parameter. A variadic tail
    /// arrives packed into one array argument.
    pub fn args(&self) -> &[HostValue] {
        &self.args
    }

    /// Argument `index`, null when absent
    pub fn arg(&self, index: usize) -> &HostValue {
        self.args.get(index).unwrap_or(&HostValue::Null)
    }

    /// Take argument `index`, leaving null behind
    pub fn take(&mut self, index: usize) -> HostValue {
        self.args
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or(HostValue::Null)
    }

    /// Argument `index` as i32
    pub fn int(&self, index: usize) -> InteropResult<i32> {
        let value = self.arg(index);
        value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| expected("int", index, value))
    }

    /// Argument `index` as i64
    pub fn long(&self, index: usize) -> InteropResult<i64> {
        let value = self.arg(index);
        value.as_i64().ok_or_else(|| expected("long", index, value))
    }

    /// Argument `index` as f64
    pub fn double(&self, index: usize) -> InteropResult<f64> {
        let value = self.arg(index);
        value.as_f64().ok_or_else(|| expected("double", index, value))
    }

    /// Argument `index` as bool
    pub fn bool(&self, index: usize) -> InteropResult<bool> {
        let value = self.arg(index);
        value.as_bool().ok_or_else(|| expected("bool", index, value))
    }

    /// Argument `index` as a string slice
    pub fn str(&self, index: usize) -> InteropResult<&str> {
        let value = self.arg(index);
        value.as_str().ok_or_else(|| expected("string", index, value))
    }

    /// Call a script function argument with host arguments, converting
    /// both ways
    pub fn call_function(
        &self,
        function: &HostValue,
        args: &[HostValue],
    ) -> InteropResult<HostValue> {
        match function {
            HostValue::Script(f) if f.is_function() || f.is_proxy() => {
                self.bridge
                    .call_function(self.engine, f, &ScriptValue::Undefined, args)
            }
            other => Err(InteropError::type_error(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }
}

fn expected(kind: &str, index: usize, actual: &HostValue) -> InteropError {
    InteropError::type_error(format!(
        "argument {index}: expected {kind}, got {}",
        actual.type_name()
    ))
}

// ============================================================================
// Members
// ============================================================================

/// Native body of a method or constructor
pub type HostFn = Arc<dyn Fn(&mut HostCall<'_>) -> InteropResult<HostValue> + Send + Sync>;

/// Field reader. Receives null for static fields.
pub type FieldGetFn = Arc<dyn Fn(&HostValue) -> InteropResult<HostValue> + Send + Sync>;

/// Field writer. Receives null for static fields.
pub type FieldSetFn = Arc<dyn Fn(&HostValue, HostValue) -> InteropResult<()> + Send + Sync>;

/// Method or constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    /// Method (instance or static)
    Method,
    /// Constructor
    Constructor,
}

/// A registered method or constructor with its static signature
pub struct Callable {
    name: String,
    kind: CallableKind,
    params: Vec<HostType>,
    varargs: bool,
    is_static: bool,
    declaring: ClassId,
    declaring_name: Arc<str>,
    markers: MemberMarkers,
    body: HostFn,
}

impl Callable {
    /// Literal name; constructors carry the class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method or constructor
    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    /// Declared parameter types. The last one is the array type of a
    /// variadic tail.
    pub fn params(&self) -> &[HostType] {
        &self.params
    }

    /// Trailing parameter is variadic
    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// Static member
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Class that declared the member
    pub fn declaring(&self) -> ClassId {
        self.declaring
    }

    /// Name of the declaring class
    pub fn declaring_name(&self) -> &str {
        &self.declaring_name
    }

    /// Markers
    pub fn markers(&self) -> &MemberMarkers {
        &self.markers
    }

    /// Run the native body
    pub fn invoke(&self, call: &mut HostCall<'_>) -> InteropResult<HostValue> {
        (self.body)(call)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.declaring_name, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if self.varargs && i + 1 == self.params.len() {
                write!(f, "...{param}")?;
            } else {
                write!(f, "{param}")?;
            }
        }
        f.write_str(")")
    }
}

/// A registered field
pub struct Field {
    name: String,
    ty: HostType,
    is_static: bool,
    declaring: ClassId,
    markers: MemberMarkers,
    getter: FieldGetFn,
    setter: Option<FieldSetFn>,
}

impl Field {
    /// Literal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type
    pub fn ty(&self) -> &HostType {
        &self.ty
    }

    /// Static field
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Read-only field
    pub fn is_final(&self) -> bool {
        self.setter.is_none()
    }

    /// Class that declared the field
    pub fn declaring(&self) -> ClassId {
        self.declaring
    }

    /// Markers
    pub fn markers(&self) -> &MemberMarkers {
        &self.markers
    }

    /// Name exposed to scripts
    pub fn exposed_name(&self) -> &str {
        self.markers.alias.as_deref().unwrap_or(&self.name)
    }

    /// Read the field of `target`
    pub fn read(&self, target: &HostValue) -> InteropResult<HostValue> {
        if self.is_static {
            (self.getter)(&HostValue::Null)
        } else {
            (self.getter)(target)
        }
    }

    /// Write the field, coercing to the declared type. Fails on final fields.
    pub fn write(&self, target: &HostValue, value: HostValue) -> InteropResult<()> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| InteropError::type_error(format!("field '{}' is final", self.name)))?;
        let coerced = self.ty.coerce(&value).ok_or_else(|| {
            InteropError::conversion(format!(
                "cannot assign {} to field '{}' of type {}",
                value.type_name(),
                self.name,
                self.ty
            ))
        })?;
        if self.is_static {
            setter(&HostValue::Null, coerced)
        } else {
            setter(target, coerced)
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("static", &self.is_static)
            .field("final", &self.is_final())
            .finish()
    }
}

// ============================================================================
// Inheritance
// ============================================================================

/// Projection of a subclass state onto the state of its parent class
trait Upcast: Send + Sync {
    fn upcast_ref<'a>(&self, state: &'a dyn Any) -> Option<&'a dyn Any>;
    fn upcast_mut<'a>(&self, state: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

struct Projection<T, P> {
    as_ref: fn(&T) -> &P,
    as_mut: fn(&mut T) -> &mut P,
}

impl<T: Any, P: Any> Upcast for Projection<T, P> {
    fn upcast_ref<'a>(&self, state: &'a dyn Any) -> Option<&'a dyn Any> {
        let state = state.downcast_ref::<T>()?;
        Some((self.as_ref)(state))
    }

    fn upcast_mut<'a>(&self, state: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let state = state.downcast_mut::<T>()?;
        Some((self.as_mut)(state))
    }
}

/// Find the `T` inside an instance of `class`, walking up the parent chain
pub(crate) fn project_ref<'a, T: Any>(state: &'a dyn Any, class: &HostClass) -> Option<&'a T> {
    if state.is::<T>() {
        return state.downcast_ref::<T>();
    }
    let upcast = class.upcast.as_ref()?;
    let parent = class.parent.as_deref()?;
    project_ref(upcast.upcast_ref(state)?, parent)
}

/// Mutable counterpart of [`project_ref`]
pub(crate) fn project_mut<'a, T: Any>(
    state: &'a mut dyn Any,
    class: &HostClass,
) -> Option<&'a mut T> {
    if state.is::<T>() {
        return state.downcast_mut::<T>();
    }
    let upcast = class.upcast.as_ref()?;
    let parent = class.parent.as_deref()?;
    project_mut(upcast.upcast_mut(state)?, parent)
}

// ============================================================================
// Classes
// ============================================================================

/// Registration table of one exposed type
pub struct HostClass {
    id: ClassId,
    name: Arc<str>,
    parent: Option<Arc<HostClass>>,
    upcast: Option<Box<dyn Upcast>>,
    interfaces: Vec<&'static str>,
    target_kind: TargetKind,
    conversion_mode: ConversionMode,
    fields: Vec<Arc<Field>>,
    methods: Vec<Arc<Callable>>,
    constructors: Vec<Arc<Callable>>,
}

impl HostClass {
    /// Start registering `T` under `name`
    pub fn builder<T: Any>(name: &str) -> ClassBuilder<T> {
        ClassBuilder::new(name)
    }

    /// Class identity
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct ancestor
    pub fn parent(&self) -> Option<&Arc<HostClass>> {
        self.parent.as_ref()
    }

    /// This class followed by its ancestors, most-derived first
    pub fn ancestors(&self) -> impl Iterator<Item = &HostClass> {
        std::iter::successors(Some(self), |class| class.parent.as_deref())
    }

    /// Whether this class is `id` or descends from it
    pub fn is_subclass_of(&self, id: ClassId) -> bool {
        self.ancestors().any(|class| class.id == id)
    }

    /// Whether this class or an ancestor declares `interface`
    pub fn implements_interface(&self, interface: &str) -> bool {
        self.ancestors()
            .any(|class| class.interfaces.contains(&interface))
    }

    /// Target shape of instances
    pub fn target_kind(&self) -> TargetKind {
        self.target_kind
    }

    /// Member exposure mode
    pub fn conversion_mode(&self) -> ConversionMode {
        self.conversion_mode
    }

    /// Fields declared by this class, in declaration order
    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    /// Methods declared by this class, in declaration order
    pub fn methods(&self) -> &[Arc<Callable>] {
        &self.methods
    }

    /// Constructors declared by this class
    pub fn constructors(&self) -> &[Arc<Callable>] {
        &self.constructors
    }

    /// Wrap `value` as an instance of this class
    pub fn instantiate<T: Any>(self: &Arc<Self>, value: T) -> HostValue {
        HostValue::Object(HostObject::new(self.clone(), value))
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Clone, Copy)]
enum LastMember {
    Field(usize),
    Method(usize),
    Constructor(usize),
}

struct PendingField {
    name: String,
    ty: HostType,
    is_static: bool,
    markers: MemberMarkers,
    getter: FieldGetFn,
    setter: Option<FieldSetFn>,
}

struct PendingMethod {
    name: String,
    params: Vec<HostType>,
    varargs: bool,
    is_static: bool,
    markers: MemberMarkers,
    body: HostFn,
}

type MakeFn<T> = Arc<dyn Fn(&mut HostCall<'_>) -> InteropResult<T> + Send + Sync>;

struct PendingConstructor<T> {
    params: Vec<HostType>,
    varargs: bool,
    markers: MemberMarkers,
    make: MakeFn<T>,
}

/// Fluent registration of one Rust type.
///
/// Marker methods (`alias`, `allow`, `block`, ...) apply to the member
/// registered just before them.
pub struct ClassBuilder<T> {
    name: String,
    parent: Option<Arc<HostClass>>,
    upcast: Option<Box<dyn Upcast>>,
    interfaces: Vec<&'static str>,
    target_kind: TargetKind,
    conversion_mode: ConversionMode,
    fields: Vec<PendingField>,
    methods: Vec<PendingMethod>,
    constructors: Vec<PendingConstructor<T>>,
    last: Option<LastMember>,
    _marker: PhantomData<fn() -> T>,
}

fn instance_of<'v>(target: &'v HostValue, class: &str) -> InteropResult<&'v HostObject> {
    target.as_object().ok_or_else(|| {
        InteropError::type_error(format!(
            "{class} member used on {} instead of an instance",
            target.type_name()
        ))
    })
}

impl<T: Any> ClassBuilder<T> {
    /// Start registering `T` under `name`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            upcast: None,
            interfaces: Vec::new(),
            target_kind: TargetKind::Object,
            conversion_mode: ConversionMode::Transparent,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            last: None,
            _marker: PhantomData,
        }
    }

    /// Inherit the members of `parent`, whose state lives inside `T`
    pub fn extends<P: Any>(
        mut self,
        parent: &Arc<HostClass>,
        as_ref: fn(&T) -> &P,
        as_mut: fn(&mut T) -> &mut P,
    ) -> Self {
        self.parent = Some(parent.clone());
        self.upcast = Some(Box::new(Projection { as_ref, as_mut }));
        self
    }

    /// Declare a capability interface
    pub fn implements(mut self, interface: &'static str) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Member exposure mode
    pub fn conversion_mode(mut self, mode: ConversionMode) -> Self {
        self.conversion_mode = mode;
        self
    }

    /// Target shape of instances
    pub fn target_kind(mut self, kind: TargetKind) -> Self {
        self.target_kind = kind;
        self
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Mutable instance field
    pub fn field<G, S>(mut self, name: &str, ty: HostType, get: G, set: S) -> Self
    where
        G: Fn(&T) -> HostValue + Send + Sync + 'static,
        S: Fn(&mut T, HostValue) -> InteropResult<()> + Send + Sync + 'static,
    {
        let class = self.name.clone();
        let getter = Self::field_getter(class.clone(), get);
        let setter: FieldSetFn = Arc::new(move |target, value| {
            instance_of(target, &class)?.with_mut(|state: &mut T| set(state, value))?
        });
        self.push_field(name, ty, false, getter, Some(setter));
        self
    }

    /// Read-only instance field
    pub fn final_field<G>(mut self, name: &str, ty: HostType, get: G) -> Self
    where
        G: Fn(&T) -> HostValue + Send + Sync + 'static,
    {
        let getter = Self::field_getter(self.name.clone(), get);
        self.push_field(name, ty, false, getter, None);
        self
    }

    /// Static constant
    pub fn static_field<G>(mut self, name: &str, ty: HostType, get: G) -> Self
    where
        G: Fn() -> HostValue + Send + Sync + 'static,
    {
        self.push_field(name, ty, true, Arc::new(move |_| Ok(get())), None);
        self
    }

    /// Writable static field backed by host-provided storage
    pub fn static_field_mut<G, S>(mut self, name: &str, ty: HostType, get: G, set: S) -> Self
    where
        G: Fn() -> HostValue + Send + Sync + 'static,
        S: Fn(HostValue) -> InteropResult<()> + Send + Sync + 'static,
    {
        let setter: FieldSetFn = Arc::new(move |_, value| set(value));
        self.push_field(name, ty, true, Arc::new(move |_| Ok(get())), Some(setter));
        self
    }

    fn field_getter<G>(class: String, get: G) -> FieldGetFn
    where
        G: Fn(&T) -> HostValue + Send + Sync + 'static,
    {
        Arc::new(move |target| instance_of(target, &class)?.with(|state: &T| get(state)))
    }

    fn push_field(
        &mut self,
        name: &str,
        ty: HostType,
        is_static: bool,
        getter: FieldGetFn,
        setter: Option<FieldSetFn>,
    ) {
        self.last = Some(LastMember::Field(self.fields.len()));
        self.fields.push(PendingField {
            name: name.to_string(),
            ty,
            is_static,
            markers: MemberMarkers::default(),
            getter,
            setter,
        });
    }

    // ------------------------------------------------------------------
    // Methods
    // ------------------------------------------------------------------

    /// Instance method operating on the borrowed state.
    ///
    /// The state stays borrowed for the whole call; bodies that call back
    /// into scripts which may reach the same object should use
    /// [`ClassBuilder::native_method`].
    pub fn method<F>(self, name: &str, params: impl Into<Vec<HostType>>, f: F) -> Self
    where
        F: Fn(&mut T, &mut HostCall<'_>) -> InteropResult<HostValue> + Send + Sync + 'static,
    {
        self.instance_method(name, params.into(), false, f)
    }

    /// Instance method whose last parameter is a variadic tail, declared
    /// with its array type such as `HostType::array(HostType::Int)`
    pub fn varargs_method<F>(self, name: &str, params: impl Into<Vec<HostType>>, f: F) -> Self
    where
        F: Fn(&mut T, &mut HostCall<'_>) -> InteropResult<HostValue> + Send + Sync + 'static,
    {
        self.instance_method(name, params.into(), true, f)
    }

    fn instance_method<F>(mut self, name: &str, params: Vec<HostType>, varargs: bool, f: F) -> Self
    where
        F: Fn(&mut T, &mut HostCall<'_>) -> InteropResult<HostValue> + Send + Sync + 'static,
    {
        let class = self.name.clone();
        let body: HostFn = Arc::new(move |call| {
            let object = instance_of(call.this(), &class)?.clone();
            object.with_mut(|state: &mut T| f(state, call))?
        });
        self.push_method(name, params, varargs, false, body);
        self
    }

    /// Instance method receiving the raw receiver through [`HostCall::this`]
    pub fn native_method<F>(mut self, name: &str, params: impl Into<Vec<HostType>>, f: F) -> Self
    where
        F: Fn(&mut HostCall<'_>) -> InteropResult<HostValue> + Send + Sync + 'static,
    {
        self.push_method(name, params.into(), false, false, Arc::new(f));
        self
    }

    /// Static method
    pub fn static_method<F>(mut self, name: &str, params: impl Into<Vec<HostType>>, f: F) -> Self
    where
        F: Fn(&mut HostCall<'_>) -> InteropResult<HostValue> + Send + Sync + 'static,
    {
        self.push_method(name, params.into(), false, true, Arc::new(f));
        self
    }

    /// Static method with a variadic tail
    pub fn static_varargs_method<F>(
        mut self,
        name: &str,
        params: impl Into<Vec<HostType>>,
        f: F,
    ) -> Self
    where
        F: Fn(&mut HostCall<'_>) -> InteropResult<HostValue> + Send + Sync + 'static,
    {
        self.push_method(name, params.into(), true, true, Arc::new(f));
        self
    }

    fn push_method(
        &mut self,
        name: &str,
        params: Vec<HostType>,
        varargs: bool,
        is_static: bool,
        body: HostFn,
    ) {
        if varargs && params.is_empty() {
            warn!(class = %self.name, method = name, "variadic method without parameters");
        }
        self.last = Some(LastMember::Method(self.methods.len()));
        self.methods.push(PendingMethod {
            name: name.to_string(),
            varargs: varargs && !params.is_empty(),
            params,
            is_static,
            markers: MemberMarkers::default(),
            body,
        });
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Constructor producing a new `T`
    pub fn constructor<F>(mut self, params: impl Into<Vec<HostType>>, f: F) -> Self
    where
        F: Fn(&mut HostCall<'_>) -> InteropResult<T> + Send + Sync + 'static,
    {
        self.push_constructor(params.into(), false, Arc::new(f));
        self
    }

    /// Constructor with a variadic tail
    pub fn varargs_constructor<F>(mut self, params: impl Into<Vec<HostType>>, f: F) -> Self
    where
        F: Fn(&mut HostCall<'_>) -> InteropResult<T> + Send + Sync + 'static,
    {
        self.push_constructor(params.into(), true, Arc::new(f));
        self
    }

    fn push_constructor(&mut self, params: Vec<HostType>, varargs: bool, make: MakeFn<T>) {
        self.last = Some(LastMember::Constructor(self.constructors.len()));
        self.constructors.push(PendingConstructor {
            varargs: varargs && !params.is_empty(),
            params,
            markers: MemberMarkers::default(),
            make,
        });
    }

    // ------------------------------------------------------------------
    // Markers
    // ------------------------------------------------------------------

    fn mark(mut self, marker: &'static str, apply: impl FnOnce(&mut MemberMarkers)) -> Self {
        let markers = match self.last {
            Some(LastMember::Field(i)) => self.fields.get_mut(i).map(|m| &mut m.markers),
            Some(LastMember::Method(i)) => self.methods.get_mut(i).map(|m| &mut m.markers),
            Some(LastMember::Constructor(i)) => {
                self.constructors.get_mut(i).map(|m| &mut m.markers)
            }
            None => None,
        };
        match markers {
            Some(markers) => apply(markers),
            None => warn!(class = %self.name, marker, "marker without a preceding member ignored"),
        }
        self
    }

    /// Expose the previous member under `alias`
    pub fn alias(self, alias: &str) -> Self {
        let alias = alias.to_string();
        self.mark("alias", |m| m.alias = Some(alias))
    }

    /// Mark the previous member as allowed
    pub fn allow(self) -> Self {
        self.mark("allow", |m| m.allow = true)
    }

    /// Mark the previous member as blocked
    pub fn block(self) -> Self {
        self.mark("block", |m| m.block = true)
    }

    /// Mark the previous method as an indexer-style getter
    pub fn generic_getter(self) -> Self {
        self.mark("generic_getter", |m| m.generic_getter = true)
    }

    /// Mark the previous method as an indexer-style setter
    pub fn generic_setter(self) -> Self {
        self.mark("generic_setter", |m| m.generic_setter = true)
    }

    /// Mark the previous method as an apply-function
    pub fn apply(self) -> Self {
        self.mark("apply", |m| m.apply = true)
    }

    /// Pass the script `this` to the previous method as its first argument
    pub fn this_required(self) -> Self {
        self.mark("this_required", |m| m.this_required = true)
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    /// Finish registration
    pub fn build(self) -> Arc<HostClass> {
        let id = ClassId::of::<T>();
        let name: Arc<str> = Arc::from(self.name.as_str());

        let fields = self
            .fields
            .into_iter()
            .map(|f| {
                Arc::new(Field {
                    name: f.name,
                    ty: f.ty,
                    is_static: f.is_static,
                    declaring: id,
                    markers: f.markers,
                    getter: f.getter,
                    setter: f.setter,
                })
            })
            .collect();

        let methods = self
            .methods
            .into_iter()
            .map(|m| {
                Arc::new(Callable {
                    name: m.name,
                    kind: CallableKind::Method,
                    params: m.params,
                    varargs: m.varargs,
                    is_static: m.is_static,
                    declaring: id,
                    declaring_name: name.clone(),
                    markers: m.markers,
                    body: m.body,
                })
            })
            .collect();

        let pending = self.constructors;
        let parent = self.parent;
        let upcast = self.upcast;
        let interfaces = self.interfaces;
        let target_kind = self.target_kind;
        let conversion_mode = self.conversion_mode;

        // Constructors hold a weak handle to the class they instantiate.
        Arc::new_cyclic(|class: &Weak<HostClass>| {
            let constructors = pending
                .into_iter()
                .map(|c| {
                    let class = class.clone();
                    let make = c.make;
                    let body: HostFn = Arc::new(move |call| {
                        let value = make(call)?;
                        let class = class.upgrade().ok_or_else(|| {
                            InteropError::host("class dropped while constructing an instance")
                        })?;
                        Ok(HostValue::Object(HostObject::new(class, value)))
                    });
                    Arc::new(Callable {
                        name: name.to_string(),
                        kind: CallableKind::Constructor,
                        params: c.params,
                        varargs: c.varargs,
                        is_static: true,
                        declaring: id,
                        declaring_name: name.clone(),
                        markers: c.markers,
                        body,
                    })
                })
                .collect();

            HostClass {
                id,
                name: name.clone(),
                parent,
                upcast,
                interfaces,
                target_kind,
                conversion_mode,
                fields,
                methods,
                constructors,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base {
        id: i32,
    }

    struct Derived {
        base: Base,
        label: String,
    }

    fn base_class() -> Arc<HostClass> {
        HostClass::builder::<Base>("Base")
            .field(
                "id",
                HostType::Int,
                |b| b.id.into(),
                |b, v| {
                    b.id = v.as_i64().unwrap_or_default() as i32;
                    Ok(())
                },
            )
            .method("getId", [], |b, _| Ok(b.id.into()))
            .implements("Identified")
            .build()
    }

    #[test]
    fn test_markers_apply_to_previous_member() {
        let class = HostClass::builder::<Base>("Base")
            .method("lookup", [HostType::Any], |_, _| Ok(HostValue::Null))
            .generic_getter()
            .alias("find")
            .final_field("id", HostType::Int, |b| b.id.into())
            .block()
            .build();

        let lookup = &class.methods()[0];
        assert!(lookup.markers().generic_getter);
        assert_eq!(lookup.markers().alias.as_deref(), Some("find"));
        assert!(class.fields()[0].markers().block);
        assert!(class.fields()[0].is_final());
    }

    #[test]
    fn test_conversion_mode_filters_members() {
        let allowed = MemberMarkers {
            allow: true,
            ..Default::default()
        };
        let blocked = MemberMarkers {
            block: true,
            ..Default::default()
        };
        let plain = MemberMarkers::default();

        assert!(plain.is_allowed(ConversionMode::Transparent));
        assert!(!plain.is_allowed(ConversionMode::AllowOnly));
        assert!(allowed.is_allowed(ConversionMode::AllowOnly));
        assert!(!blocked.is_allowed(ConversionMode::BlockOnly));
        assert!(plain.is_allowed(ConversionMode::BlockOnly));
    }

    #[test]
    fn test_inherited_members_project_state() {
        let base = base_class();
        let derived = HostClass::builder::<Derived>("Derived")
            .extends(&base, |d| &d.base, |d| &mut d.base)
            .final_field("label", HostType::String, |d| d.label.clone().into())
            .build();

        assert!(derived.is_subclass_of(base.id()));
        assert!(!base.is_subclass_of(derived.id()));
        assert!(derived.implements_interface("Identified"));

        let instance = derived.instantiate(Derived {
            base: Base { id: 7 },
            label: "x".into(),
        });
        let id_field = &base.fields()[0];
        assert_eq!(id_field.read(&instance).unwrap(), HostValue::Int(7));
        id_field.write(&instance, HostValue::Int(9)).unwrap();
        assert_eq!(id_field.read(&instance).unwrap(), HostValue::Int(9));
        assert_eq!(
            derived.fields()[0].read(&instance).unwrap(),
            HostValue::from("x")
        );
    }

    #[test]
    fn test_final_field_rejects_writes() {
        let class = HostClass::builder::<Base>("Base")
            .final_field("id", HostType::Int, |b| b.id.into())
            .build();
        let instance = class.instantiate(Base { id: 1 });
        let err = class.fields()[0]
            .write(&instance, HostValue::Int(2))
            .unwrap_err();
        assert!(matches!(err, InteropError::TypeError(_)));
    }

    #[test]
    fn test_callable_debug_shows_signature() {
        let class = HostClass::builder::<Base>("Base")
            .varargs_method(
                "sum",
                [HostType::String, HostType::array(HostType::Int)],
                |_, _| Ok(HostValue::Null),
            )
            .build();
        assert_eq!(format!("{:?}", class.methods()[0]), "Base::sum(string, ...int[])");
    }
}
