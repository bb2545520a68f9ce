//! Engine-side values as seen by the bridge.
//!
//! Primitives are carried inline. Objects, arrays, functions, maps, sets and
//! proxies are engine handles: cloning a [`ScriptValue`] copies the handle,
//! it does not retain it. Ownership is tracked by the engine through
//! [`ScriptEngine::retain`](crate::engine::ScriptEngine::retain) and
//! [`ScriptEngine::release`](crate::engine::ScriptEngine::release).

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::sync::Arc;

/// Opaque engine handle id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Wrap a raw handle id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle id
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Kind of a reference value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Plain object
    Object,
    /// Array
    Array,
    /// Function
    Function,
    /// Map
    Map,
    /// Set
    Set,
    /// Proxy
    Proxy,
}

/// Handle plus its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptRef {
    handle: Handle,
    kind: ReferenceKind,
}

impl ScriptRef {
    /// Create a reference
    pub const fn new(handle: Handle, kind: ReferenceKind) -> Self {
        Self { handle, kind }
    }

    /// Underlying handle
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Reference kind
    pub const fn kind(&self) -> ReferenceKind {
        self.kind
    }
}

/// A symbol, identified by its description.
///
/// Well-known symbols use their `Symbol.xxx` spelling as description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptSymbol(Arc<str>);

impl ScriptSymbol {
    /// `Symbol.iterator`
    pub const ITERATOR: &'static str = "Symbol.iterator";
    /// `Symbol.toPrimitive`
    pub const TO_PRIMITIVE: &'static str = "Symbol.toPrimitive";

    /// Create a symbol with a description
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self(description.into())
    }

    /// `Symbol.iterator`
    pub fn iterator() -> Self {
        Self::new(Self::ITERATOR)
    }

    /// `Symbol.toPrimitive`
    pub fn to_primitive() -> Self {
        Self::new(Self::TO_PRIMITIVE)
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.0
    }
}

/// Engine value kind, used both to classify arguments and to declare
/// engine-typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Any engine value
    Any,
    /// Any non-reference value
    Primitive,
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Boolean,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    Long,
    /// Double
    Double,
    /// String
    String,
    /// Date/time
    Date,
    /// Symbol
    Symbol,
    /// Any object-shaped value (object, array, function, map, set, proxy)
    Object,
    /// Array
    Array,
    /// Function
    Function,
    /// Map
    Map,
    /// Set
    Set,
    /// Proxy
    Proxy,
}

impl ScriptKind {
    /// Whether a parameter declared with this kind accepts a value of `actual` kind.
    pub fn accepts(self, actual: ScriptKind) -> bool {
        match self {
            ScriptKind::Any => true,
            ScriptKind::Primitive => !actual.is_reference(),
            ScriptKind::Object => actual.is_reference(),
            expected => expected == actual,
        }
    }

    /// Whether values of this kind are engine handles
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            ScriptKind::Object
                | ScriptKind::Array
                | ScriptKind::Function
                | ScriptKind::Map
                | ScriptKind::Set
                | ScriptKind::Proxy
        )
    }
}

/// A value living on the engine side of the boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Boolean(bool),
    /// 32-bit integer
    Integer(i32),
    /// 64-bit integer
    Long(i64),
    /// Double
    Double(f64),
    /// String
    String(String),
    /// Date/time
    Date(DateTime<Utc>),
    /// Symbol
    Symbol(ScriptSymbol),
    /// Engine handle
    Reference(ScriptRef),
}

impl ScriptValue {
    /// Kind of this value
    pub fn kind(&self) -> ScriptKind {
        match self {
            ScriptValue::Undefined => ScriptKind::Undefined,
            ScriptValue::Null => ScriptKind::Null,
            ScriptValue::Boolean(_) => ScriptKind::Boolean,
            ScriptValue::Integer(_) => ScriptKind::Integer,
            ScriptValue::Long(_) => ScriptKind::Long,
            ScriptValue::Double(_) => ScriptKind::Double,
            ScriptValue::String(_) => ScriptKind::String,
            ScriptValue::Date(_) => ScriptKind::Date,
            ScriptValue::Symbol(_) => ScriptKind::Symbol,
            ScriptValue::Reference(r) => match r.kind() {
                ReferenceKind::Object => ScriptKind::Object,
                ReferenceKind::Array => ScriptKind::Array,
                ReferenceKind::Function => ScriptKind::Function,
                ReferenceKind::Map => ScriptKind::Map,
                ReferenceKind::Set => ScriptKind::Set,
                ReferenceKind::Proxy => ScriptKind::Proxy,
            },
        }
    }

    /// `null` or `undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    /// `undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, ScriptValue::Undefined)
    }

    /// Function handle
    pub fn is_function(&self) -> bool {
        matches!(self, ScriptValue::Reference(r) if r.kind() == ReferenceKind::Function)
    }

    /// Proxy handle
    pub fn is_proxy(&self) -> bool {
        matches!(self, ScriptValue::Reference(r) if r.kind() == ReferenceKind::Proxy)
    }

    /// Object-shaped value that is neither a function nor a proxy
    pub fn is_plain_object_shaped(&self) -> bool {
        match self {
            ScriptValue::Reference(r) => {
                !matches!(r.kind(), ReferenceKind::Function | ReferenceKind::Proxy)
            }
            _ => false,
        }
    }

    /// Engine handle, if this is a reference
    pub fn as_reference(&self) -> Option<&ScriptRef> {
        match self {
            ScriptValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Symbol, if this is a symbol
    pub fn as_symbol(&self) -> Option<&ScriptSymbol> {
        match self {
            ScriptValue::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value of integer, long and double values
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Integer(n) => Some(f64::from(*n)),
            ScriptValue::Long(n) => Some(*n as f64),
            ScriptValue::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Interpret a string key as an array index.
    ///
    /// Only plain decimal digits qualify; `"01"` is accepted the way a
    /// digit check accepts it, `"-1"` and `"1.5"` are not.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            ScriptValue::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse().ok()
            }
            ScriptValue::Integer(n) if *n >= 0 => Some(*n as usize),
            _ => None,
        }
    }

    /// Script truthiness (`!!value`)
    pub fn is_truthy(&self) -> bool {
        match self {
            ScriptValue::Undefined | ScriptValue::Null => false,
            ScriptValue::Boolean(b) => *b,
            ScriptValue::Integer(n) => *n != 0,
            ScriptValue::Long(n) => *n != 0,
            ScriptValue::Double(n) => *n != 0.0 && !n.is_nan(),
            ScriptValue::String(s) => !s.is_empty(),
            ScriptValue::Date(_) | ScriptValue::Symbol(_) | ScriptValue::Reference(_) => true,
        }
    }

    /// Script-style string representation used for key normalization
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Undefined => f.write_str("undefined"),
            ScriptValue::Null => f.write_str("null"),
            ScriptValue::Boolean(b) => write!(f, "{b}"),
            ScriptValue::Integer(n) => write!(f, "{n}"),
            ScriptValue::Long(n) => write!(f, "{n}"),
            ScriptValue::Double(n) => f.write_str(&format_number(*n)),
            ScriptValue::String(s) => f.write_str(s),
            ScriptValue::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ScriptValue::Symbol(s) => write!(f, "Symbol({})", s.description()),
            ScriptValue::Reference(r) => match r.kind() {
                ReferenceKind::Function => f.write_str("function () { [native code] }"),
                _ => f.write_str("[object Object]"),
            },
        }
    }
}

/// Format a double the way scripts print numbers (`1` rather than `1.0`).
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Boolean(value)
    }
}

impl From<i32> for ScriptValue {
    fn from(value: i32) -> Self {
        ScriptValue::Integer(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Long(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Double(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(value)
    }
}

impl From<ScriptSymbol> for ScriptValue {
    fn from(value: ScriptSymbol) -> Self {
        ScriptValue::Symbol(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_acceptance() {
        assert!(ScriptKind::Any.accepts(ScriptKind::Null));
        assert!(ScriptKind::Object.accepts(ScriptKind::Array));
        assert!(ScriptKind::Object.accepts(ScriptKind::Function));
        assert!(!ScriptKind::Object.accepts(ScriptKind::String));
        assert!(ScriptKind::Primitive.accepts(ScriptKind::Integer));
        assert!(!ScriptKind::Array.accepts(ScriptKind::Object));
    }

    #[test]
    fn test_index_keys() {
        assert_eq!(ScriptValue::from("12").as_index(), Some(12));
        assert_eq!(ScriptValue::from("-1").as_index(), None);
        assert_eq!(ScriptValue::from("1.5").as_index(), None);
        assert_eq!(ScriptValue::from("").as_index(), None);
        assert_eq!(ScriptValue::from("length").as_index(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ScriptValue::Double(1.0).to_string(), "1");
        assert_eq!(ScriptValue::Double(1.5).to_string(), "1.5");
        assert_eq!(ScriptValue::Null.to_string(), "null");
        assert_eq!(
            ScriptValue::Symbol(ScriptSymbol::iterator()).to_string(),
            "Symbol(Symbol.iterator)"
        );
    }
}
