//! Host-side values.
//!
//! Collections are shared and interior-mutable so a proxy and the host code
//! that created the collection observe the same contents. Mutable borrows
//! never outlive one method call and never run host or script code, so
//! reads cannot collide with a write. Writes made while the contents are
//! lent out through `with` fail with [`InteropError::Host`].

use crate::error::{InteropError, InteropResult};
use crate::registration::{HostClass, project_mut, project_ref};
use crate::script::{ScriptValue, format_number};
use crate::types::{ClassId, HostType};
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A value living on the host side of the boundary
#[derive(Clone)]
pub enum HostValue {
    /// Host null sentinel (script `null` and `undefined` both map here)
    Null,
    /// bool
    Bool(bool),
    /// i8
    Byte(i8),
    /// i16
    Short(i16),
    /// i32
    Int(i32),
    /// i64
    Long(i64),
    /// f32
    Float(f32),
    /// f64
    Double(f64),
    /// char
    Char(char),
    /// String
    String(String),
    /// Date/time
    DateTime(DateTime<Utc>),
    /// Ordered, growable collection
    List(HostList),
    /// String-keyed mapping
    Map(HostMap),
    /// Unique-element collection
    Set(HostSet),
    /// Fixed-length typed array
    Array(HostArray),
    /// Instance of a registered class
    Object(HostObject),
    /// A registered class itself (static members, construction)
    Class(Arc<HostClass>),
    /// Single-pass iterator
    Iterator(HostIterator),
    /// Capability object proxied in direct mode
    Direct(DirectTarget),
    /// Engine value passed through unconverted.
    ///
    /// The handle is borrowed for the duration of the current call; host
    /// code that keeps it longer must retain it through the engine.
    Script(ScriptValue),
}

impl Default for HostValue {
    fn default() -> Self {
        HostValue::Null
    }
}

impl HostValue {
    /// Null sentinel
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Short variant name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Byte(_) => "byte",
            HostValue::Short(_) => "short",
            HostValue::Int(_) => "int",
            HostValue::Long(_) => "long",
            HostValue::Float(_) => "float",
            HostValue::Double(_) => "double",
            HostValue::Char(_) => "char",
            HostValue::String(_) => "string",
            HostValue::DateTime(_) => "datetime",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "map",
            HostValue::Set(_) => "set",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
            HostValue::Class(_) => "class",
            HostValue::Iterator(_) => "iterator",
            HostValue::Direct(_) => "direct",
            HostValue::Script(_) => "script",
        }
    }

    /// Numeric value of numeric variants
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Byte(n) => Some(f64::from(*n)),
            HostValue::Short(n) => Some(f64::from(*n)),
            HostValue::Int(n) => Some(f64::from(*n)),
            HostValue::Long(n) => Some(*n as f64),
            HostValue::Float(n) => Some(f64::from(*n)),
            HostValue::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer value of integral variants
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Byte(n) => Some(i64::from(*n)),
            HostValue::Short(n) => Some(i64::from(*n)),
            HostValue::Int(n) => Some(i64::from(*n)),
            HostValue::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this is one of the numeric variants
    pub fn is_number(&self) -> bool {
        self.as_f64().is_some()
    }

    /// String contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// bool contents
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Host object contents
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Class of an object value
    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            HostValue::Object(o) => Some(o.class().id()),
            _ => None,
        }
    }

    /// Display string, the host counterpart of a `toString` call
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }

    /// JSON-like snapshot of the value.
    ///
    /// Objects, classes, iterators and engine values have no structural
    /// form and serialize as their display string.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            HostValue::Null => Json::Null,
            HostValue::Bool(b) => Json::Bool(*b),
            HostValue::Byte(n) => Json::from(*n),
            HostValue::Short(n) => Json::from(*n),
            HostValue::Int(n) => Json::from(*n),
            HostValue::Long(n) => Json::from(*n),
            HostValue::Float(n) => serde_json::Number::from_f64(f64::from(*n))
                .map(Json::Number)
                .unwrap_or(Json::Null),
            HostValue::Double(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            HostValue::Char(c) => Json::String(c.to_string()),
            HostValue::String(s) => Json::String(s.clone()),
            HostValue::DateTime(d) => {
                Json::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            HostValue::List(list) => {
                Json::Array(list.snapshot().iter().map(Self::to_json).collect())
            }
            HostValue::Set(set) => Json::Array(set.snapshot().iter().map(Self::to_json).collect()),
            HostValue::Array(array) => {
                Json::Array(array.snapshot().iter().map(Self::to_json).collect())
            }
            HostValue::Map(map) => Json::Object(
                map.entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
            other => Json::String(other.to_string()),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Byte(n) => write!(f, "{n}"),
            HostValue::Short(n) => write!(f, "{n}"),
            HostValue::Int(n) => write!(f, "{n}"),
            HostValue::Long(n) => write!(f, "{n}"),
            HostValue::Float(n) => f.write_str(&format_number(f64::from(*n))),
            HostValue::Double(n) => f.write_str(&format_number(*n)),
            HostValue::Char(c) => write!(f, "{c}"),
            HostValue::String(s) => f.write_str(s),
            HostValue::DateTime(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            HostValue::List(_) | HostValue::Set(_) | HostValue::Array(_) | HostValue::Map(_) => {
                f.write_str(&self.to_json().to_string())
            }
            HostValue::Object(o) => write!(f, "[object {}]", o.class().name()),
            HostValue::Class(c) => write!(f, "[class {}]", c.name()),
            HostValue::Iterator(_) => f.write_str("[object Iterator]"),
            HostValue::Direct(_) => f.write_str("[object Object]"),
            HostValue::Script(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("Null"),
            HostValue::String(s) => write!(f, "String({s:?})"),
            HostValue::List(list) => f.debug_tuple("List").field(&list.snapshot()).finish(),
            HostValue::Set(set) => f.debug_tuple("Set").field(&set.snapshot()).finish(),
            HostValue::Array(array) => f.debug_tuple("Array").field(&array.snapshot()).finish(),
            HostValue::Map(map) => f.debug_tuple("Map").field(&map.entries()).finish(),
            HostValue::Script(v) => f.debug_tuple("Script").field(v).finish(),
            other => write!(f, "{}({other})", other.type_name()),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Byte(a), HostValue::Byte(b)) => a == b,
            (HostValue::Short(a), HostValue::Short(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Long(a), HostValue::Long(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Double(a), HostValue::Double(b)) => a == b,
            (HostValue::Char(a), HostValue::Char(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::DateTime(a), HostValue::DateTime(b)) => a == b,
            (HostValue::List(a), HostValue::List(b)) => a.ptr_eq(b) || a.snapshot() == b.snapshot(),
            (HostValue::Set(a), HostValue::Set(b)) => a.ptr_eq(b) || a.snapshot() == b.snapshot(),
            (HostValue::Array(a), HostValue::Array(b)) => {
                a.ptr_eq(b) || a.snapshot() == b.snapshot()
            }
            (HostValue::Map(a), HostValue::Map(b)) => a.ptr_eq(b) || a.entries() == b.entries(),
            (HostValue::Object(a), HostValue::Object(b)) => a.ptr_eq(b),
            (HostValue::Class(a), HostValue::Class(b)) => a.id() == b.id(),
            (HostValue::Iterator(a), HostValue::Iterator(b)) => Rc::ptr_eq(&a.0, &b.0),
            (HostValue::Direct(a), HostValue::Direct(b)) => Rc::ptr_eq(&a.0, &b.0),
            (HostValue::Script(a), HostValue::Script(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! host_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for HostValue {
                fn from(value: $ty) -> Self {
                    HostValue::$variant(value)
                }
            }
        )*
    };
}

host_value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => String,
    DateTime<Utc> => DateTime,
    HostList => List,
    HostMap => Map,
    HostSet => Set,
    HostArray => Array,
    HostObject => Object,
    Arc<HostClass> => Class,
    HostIterator => Iterator,
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(HostValue::Null)
    }
}

// ============================================================================
// Collections
// ============================================================================

fn shared<'a, T>(cell: &'a RefCell<T>, what: &str) -> InteropResult<Ref<'a, T>> {
    cell.try_borrow()
        .map_err(|_| InteropError::host(format!("{what} is being modified")))
}

fn exclusive<'a, T>(cell: &'a RefCell<T>, what: &str) -> InteropResult<RefMut<'a, T>> {
    cell.try_borrow_mut()
        .map_err(|_| InteropError::host(format!("{what} is borrowed and cannot be modified")))
}

/// Shared ordered collection
#[derive(Clone, Default)]
pub struct HostList(Rc<RefCell<Vec<HostValue>>>);

impl HostList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles share storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// No elements
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.0.borrow().get(index).cloned()
    }

    /// Replace the element at `index`, returning whether the slot exists
    pub fn set(&self, index: usize, value: HostValue) -> InteropResult<bool> {
        let previous = match exclusive(&self.0, "list")?.get_mut(index) {
            Some(slot) => std::mem::replace(slot, value),
            None => return Ok(false),
        };
        drop(previous);
        Ok(true)
    }

    /// Append an element
    pub fn push(&self, value: HostValue) -> InteropResult<()> {
        exclusive(&self.0, "list")?.push(value);
        Ok(())
    }

    /// Remove the last element
    pub fn pop(&self) -> InteropResult<Option<HostValue>> {
        Ok(exclusive(&self.0, "list")?.pop())
    }

    /// Insert at `index` (clamped to the length)
    pub fn insert(&self, index: usize, value: HostValue) -> InteropResult<()> {
        let mut items = exclusive(&self.0, "list")?;
        let index = index.min(items.len());
        items.insert(index, value);
        Ok(())
    }

    /// Remove by index
    pub fn remove(&self, index: usize) -> InteropResult<Option<HostValue>> {
        let mut items = exclusive(&self.0, "list")?;
        Ok((index < items.len()).then(|| items.remove(index)))
    }

    /// Reverse in place
    pub fn reverse(&self) -> InteropResult<()> {
        exclusive(&self.0, "list")?.reverse();
        Ok(())
    }

    /// Remove every element
    pub fn clear(&self) -> InteropResult<()> {
        let items = std::mem::take(&mut *exclusive(&self.0, "list")?);
        drop(items);
        Ok(())
    }

    /// Whether an equal element exists
    pub fn contains(&self, value: &HostValue) -> bool {
        self.0.borrow().iter().any(|v| v == value)
    }

    /// Copy of the current elements
    pub fn snapshot(&self) -> Vec<HostValue> {
        self.0.borrow().clone()
    }

    /// Run `f` over the elements.
    ///
    /// Mutating the list from inside `f` fails with [`InteropError::Host`].
    pub fn with<R>(&self, f: impl FnOnce(&[HostValue]) -> R) -> InteropResult<R> {
        let items = shared(&self.0, "list")?;
        Ok(f(&items))
    }
}

impl From<Vec<HostValue>> for HostList {
    fn from(values: Vec<HostValue>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }
}

impl FromIterator<HostValue> for HostList {
    fn from_iter<I: IntoIterator<Item = HostValue>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

/// Shared string-keyed mapping, in insertion order
#[derive(Clone, Default)]
pub struct HostMap(Rc<RefCell<IndexMap<String, HostValue>>>);

impl HostMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles share storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// No entries
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Value for `key`
    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.0.borrow().get(key).cloned()
    }

    /// Insert or replace, returning the previous value
    pub fn insert(
        &self,
        key: impl Into<String>,
        value: HostValue,
    ) -> InteropResult<Option<HostValue>> {
        Ok(exclusive(&self.0, "map")?.insert(key.into(), value))
    }

    /// Remove `key`, keeping the order of the remaining entries
    pub fn remove(&self, key: &str) -> InteropResult<Option<HostValue>> {
        Ok(exclusive(&self.0, "map")?.shift_remove(key))
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Whether an equal value is present
    pub fn contains_value(&self, value: &HostValue) -> bool {
        self.0.borrow().values().any(|v| v == value)
    }

    /// Remove every entry
    pub fn clear(&self) -> InteropResult<()> {
        let entries = std::mem::take(&mut *exclusive(&self.0, "map")?);
        drop(entries);
        Ok(())
    }

    /// Keys in order
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Values in order
    pub fn values(&self) -> Vec<HostValue> {
        self.0.borrow().values().cloned().collect()
    }

    /// Entries in order
    pub fn entries(&self) -> Vec<(String, HostValue)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, HostValue)> for HostMap {
    fn from_iter<I: IntoIterator<Item = (K, HostValue)>>(iter: I) -> Self {
        let map: IndexMap<String, HostValue> =
            iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self(Rc::new(RefCell::new(map)))
    }
}

/// Shared collection of unique elements, in insertion order
#[derive(Clone, Default)]
pub struct HostSet(Rc<RefCell<Vec<HostValue>>>);

impl HostSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles share storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// No elements
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Insert, returning false when an equal element was already present
    pub fn insert(&self, value: HostValue) -> InteropResult<bool> {
        if self.contains(&value) {
            return Ok(false);
        }
        exclusive(&self.0, "set")?.push(value);
        Ok(true)
    }

    /// Whether an equal element is present
    pub fn contains(&self, value: &HostValue) -> bool {
        self.0.borrow().iter().any(|v| v == value)
    }

    /// Remove an equal element
    pub fn remove(&self, value: &HostValue) -> InteropResult<bool> {
        let Some(index) = self.0.borrow().iter().position(|v| v == value) else {
            return Ok(false);
        };
        let removed = exclusive(&self.0, "set")?.remove(index);
        drop(removed);
        Ok(true)
    }

    /// Remove every element
    pub fn clear(&self) -> InteropResult<()> {
        let items = std::mem::take(&mut *exclusive(&self.0, "set")?);
        drop(items);
        Ok(())
    }

    /// Copy of the current elements
    pub fn snapshot(&self) -> Vec<HostValue> {
        self.0.borrow().clone()
    }
}

impl FromIterator<HostValue> for HostSet {
    fn from_iter<I: IntoIterator<Item = HostValue>>(iter: I) -> Self {
        let mut items: Vec<HostValue> = Vec::new();
        for value in iter {
            if !items.contains(&value) {
                items.push(value);
            }
        }
        Self(Rc::new(RefCell::new(items)))
    }
}

// ============================================================================
// Typed arrays
// ============================================================================

/// Storage of a fixed-length typed array
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// `bool[]`
    Bool(Vec<bool>),
    /// `i8[]`
    Byte(Vec<i8>),
    /// `i16[]`
    Short(Vec<i16>),
    /// `i32[]`
    Int(Vec<i32>),
    /// `i64[]`
    Long(Vec<i64>),
    /// `f32[]`
    Float(Vec<f32>),
    /// `f64[]`
    Double(Vec<f64>),
    /// `char[]`
    Char(Vec<char>),
    /// `String[]`, nullable slots
    String(Vec<Option<String>>),
    /// Array of arbitrary host values
    Object(Vec<HostValue>),
}

impl ArrayData {
    /// Element type
    pub fn element_type(&self) -> HostType {
        match self {
            ArrayData::Bool(_) => HostType::Bool,
            ArrayData::Byte(_) => HostType::Byte,
            ArrayData::Short(_) => HostType::Short,
            ArrayData::Int(_) => HostType::Int,
            ArrayData::Long(_) => HostType::Long,
            ArrayData::Float(_) => HostType::Float,
            ArrayData::Double(_) => HostType::Double,
            ArrayData::Char(_) => HostType::Char,
            ArrayData::String(_) => HostType::String,
            ArrayData::Object(_) => HostType::Any,
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Byte(v) => v.len(),
            ArrayData::Short(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::Long(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::Char(v) => v.len(),
            ArrayData::String(v) => v.len(),
            ArrayData::Object(v) => v.len(),
        }
    }

    /// No slots
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<HostValue> {
        match self {
            ArrayData::Bool(v) => v.get(index).copied().map(HostValue::Bool),
            ArrayData::Byte(v) => v.get(index).copied().map(HostValue::Byte),
            ArrayData::Short(v) => v.get(index).copied().map(HostValue::Short),
            ArrayData::Int(v) => v.get(index).copied().map(HostValue::Int),
            ArrayData::Long(v) => v.get(index).copied().map(HostValue::Long),
            ArrayData::Float(v) => v.get(index).copied().map(HostValue::Float),
            ArrayData::Double(v) => v.get(index).copied().map(HostValue::Double),
            ArrayData::Char(v) => v.get(index).copied().map(HostValue::Char),
            ArrayData::String(v) => v
                .get(index)
                .map(|s| s.clone().map(HostValue::String).unwrap_or(HostValue::Null)),
            ArrayData::Object(v) => v.get(index).cloned(),
        }
    }

    /// Store `value` at `index`, coercing to the element type.
    ///
    /// Returns false when the index is out of range.
    pub fn set(&mut self, index: usize, value: HostValue) -> InteropResult<bool> {
        if index >= self.len() {
            return Ok(false);
        }
        let element_type = self.element_type();
        let coerced = element_type.coerce(&value).ok_or_else(|| {
            InteropError::conversion(format!(
                "cannot store {} in an array of {element_type}",
                value.type_name()
            ))
        })?;
        match (self, coerced) {
            (ArrayData::Bool(v), HostValue::Bool(x)) => v[index] = x,
            (ArrayData::Byte(v), HostValue::Byte(x)) => v[index] = x,
            (ArrayData::Short(v), HostValue::Short(x)) => v[index] = x,
            (ArrayData::Int(v), HostValue::Int(x)) => v[index] = x,
            (ArrayData::Long(v), HostValue::Long(x)) => v[index] = x,
            (ArrayData::Float(v), HostValue::Float(x)) => v[index] = x,
            (ArrayData::Double(v), HostValue::Double(x)) => v[index] = x,
            (ArrayData::Char(v), HostValue::Char(x)) => v[index] = x,
            (ArrayData::String(v), HostValue::String(x)) => v[index] = Some(x),
            (ArrayData::String(v), HostValue::Null) => v[index] = None,
            (ArrayData::Object(v), x) => v[index] = x,
            (_, other) => {
                return Err(InteropError::conversion(format!(
                    "cannot store {} in an array of {element_type}",
                    other.type_name()
                )));
            }
        }
        Ok(true)
    }

    /// Null the slot at `index`.
    ///
    /// Only arrays with nullable elements can be cleared; primitive arrays
    /// report false.
    pub fn clear_slot(&mut self, index: usize) -> bool {
        match self {
            ArrayData::String(v) if index < v.len() => {
                v[index] = None;
                true
            }
            ArrayData::Object(v) if index < v.len() => {
                v[index] = HostValue::Null;
                true
            }
            _ => false,
        }
    }

    /// Build an array of `element_type` from host values
    pub fn from_values(element_type: &HostType, values: Vec<HostValue>) -> InteropResult<Self> {
        fn gather<T>(
            element_type: &HostType,
            values: Vec<HostValue>,
            pick: impl Fn(HostValue) -> Option<T>,
        ) -> InteropResult<Vec<T>> {
            values
                .into_iter()
                .map(|value| {
                    let name = value.type_name();
                    element_type.coerce(&value).and_then(&pick).ok_or_else(|| {
                        InteropError::conversion(format!(
                            "cannot store {name} in an array of {element_type}"
                        ))
                    })
                })
                .collect()
        }

        Ok(match element_type {
            HostType::Bool => ArrayData::Bool(gather(element_type, values, |v| v.as_bool())?),
            HostType::Byte => ArrayData::Byte(gather(element_type, values, |v| match v {
                HostValue::Byte(x) => Some(x),
                _ => None,
            })?),
            HostType::Short => ArrayData::Short(gather(element_type, values, |v| match v {
                HostValue::Short(x) => Some(x),
                _ => None,
            })?),
            HostType::Int => ArrayData::Int(gather(element_type, values, |v| match v {
                HostValue::Int(x) => Some(x),
                _ => None,
            })?),
            HostType::Long => ArrayData::Long(gather(element_type, values, |v| match v {
                HostValue::Long(x) => Some(x),
                _ => None,
            })?),
            HostType::Float => ArrayData::Float(gather(element_type, values, |v| match v {
                HostValue::Float(x) => Some(x),
                _ => None,
            })?),
            HostType::Double => ArrayData::Double(gather(element_type, values, |v| match v {
                HostValue::Double(x) => Some(x),
                _ => None,
            })?),
            HostType::Char => ArrayData::Char(gather(element_type, values, |v| match v {
                HostValue::Char(x) => Some(x),
                _ => None,
            })?),
            HostType::String => ArrayData::String(gather(element_type, values, |v| match v {
                HostValue::String(x) => Some(Some(x)),
                HostValue::Null => Some(None),
                _ => None,
            })?),
            _ => ArrayData::Object(values),
        })
    }
}

/// Shared fixed-length typed array
#[derive(Clone)]
pub struct HostArray(Rc<RefCell<ArrayData>>);

impl HostArray {
    /// Wrap array storage
    pub fn new(data: ArrayData) -> Self {
        Self(Rc::new(RefCell::new(data)))
    }

    /// Whether both handles share storage
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Element type
    pub fn element_type(&self) -> HostType {
        self.0.borrow().element_type()
    }

    /// Whether the elements are unboxed primitives
    pub fn has_primitive_elements(&self) -> bool {
        self.element_type().is_primitive()
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// No slots
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.0.borrow().get(index)
    }

    /// Store a value, coercing it to the element type
    pub fn set(&self, index: usize, value: HostValue) -> InteropResult<bool> {
        exclusive(&self.0, "array")?.set(index, value)
    }

    /// Null a slot of a non-primitive array
    pub fn clear_slot(&self, index: usize) -> InteropResult<bool> {
        Ok(exclusive(&self.0, "array")?.clear_slot(index))
    }

    /// Copy of the elements
    pub fn snapshot(&self) -> Vec<HostValue> {
        let data = self.0.borrow();
        (0..data.len()).filter_map(|i| data.get(i)).collect()
    }

    /// Run `f` over the storage.
    ///
    /// Writing to the array from inside `f` fails with [`InteropError::Host`].
    pub fn with<R>(&self, f: impl FnOnce(&ArrayData) -> R) -> InteropResult<R> {
        let data = shared(&self.0, "array")?;
        Ok(f(&data))
    }
}

impl From<ArrayData> for HostArray {
    fn from(data: ArrayData) -> Self {
        Self::new(data)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Instance of a registered class.
///
/// The state is type-erased; member callables downcast it back to the
/// registered Rust type.
#[derive(Clone)]
pub struct HostObject {
    class: Arc<HostClass>,
    state: Rc<RefCell<dyn Any>>,
}

impl HostObject {
    /// Wrap `value` as an instance of `class`
    pub fn new<T: Any>(class: Arc<HostClass>, value: T) -> Self {
        let state: Rc<RefCell<dyn Any>> = Rc::new(RefCell::new(value));
        Self { class, state }
    }

    /// Runtime class
    pub fn class(&self) -> &Arc<HostClass> {
        &self.class
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Whether the state is, or embeds through inheritance, a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.state
            .try_borrow()
            .map(|state| project_ref::<T>(&*state, &self.class).is_some())
            .unwrap_or(false)
    }

    /// Run `f` with shared access to the state, projected onto `T`
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> InteropResult<R> {
        let state = self
            .state
            .try_borrow()
            .map_err(|_| InteropError::host(format!("{} is mutably borrowed", self.class.name())))?;
        let value = project_ref::<T>(&*state, &self.class).ok_or_else(|| {
            InteropError::host(format!("{} does not hold the requested type", self.class.name()))
        })?;
        Ok(f(value))
    }

    /// Run `f` with exclusive access to the state
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> InteropResult<R> {
        let mut state = self
            .state
            .try_borrow_mut()
            .map_err(|_| InteropError::host(format!("{} is already borrowed", self.class.name())))?;
        let value = project_mut::<T>(&mut *state, &self.class).ok_or_else(|| {
            InteropError::host(format!("{} does not hold the requested type", self.class.name()))
        })?;
        Ok(f(value))
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("class", &self.class.name())
            .finish()
    }
}

/// Single-pass iterator over host values
#[derive(Clone)]
pub struct HostIterator(Rc<RefCell<Box<dyn Iterator<Item = HostValue>>>>);

impl HostIterator {
    /// Wrap an iterator
    pub fn new(iter: impl Iterator<Item = HostValue> + 'static) -> Self {
        Self(Rc::new(RefCell::new(Box::new(iter))))
    }

    /// Advance. Re-entering the iterator from its own `next` fails.
    pub fn next_value(&self) -> InteropResult<Option<HostValue>> {
        Ok(exclusive(&self.0, "iterator")?.next())
    }
}

/// Capability object exposed through a direct-mode proxy
#[derive(Clone)]
pub struct DirectTarget(pub(crate) Rc<dyn crate::proxy::direct::DirectProxy>);

impl DirectTarget {
    /// Wrap a capability object
    pub fn new(target: Rc<dyn crate::proxy::direct::DirectProxy>) -> Self {
        Self(target)
    }

    /// The capability object
    pub fn inner(&self) -> &Rc<dyn crate::proxy::direct::DirectProxy> {
        &self.0
    }
}

impl From<DirectTarget> for HostValue {
    fn from(value: DirectTarget) -> Self {
        HostValue::Direct(value)
    }
}
