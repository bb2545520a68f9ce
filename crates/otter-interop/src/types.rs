//! Static parameter types of registered members and the coercion rules
//! the overload scorer ranks against.

use crate::host::HostValue;
use crate::script::{ScriptKind, ScriptValue};
use std::any::TypeId;
use std::fmt;

/// Identity of a registered class, derived from its Rust type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(TypeId);

impl ClassId {
    /// Class id of `T`
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }
}

/// Parameter or field type as declared at registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    /// Any non-null host value (nullable)
    Any,
    /// bool
    Bool,
    /// i8
    Byte,
    /// i16
    Short,
    /// i32
    Int,
    /// i64
    Long,
    /// f32
    Float,
    /// f64
    Double,
    /// char
    Char,
    /// String (nullable)
    String,
    /// Date/time (nullable)
    DateTime,
    /// Ordered collection (nullable)
    List,
    /// String-keyed mapping (nullable)
    Map,
    /// Unique-element collection (nullable)
    Set,
    /// Typed array with the given element type (nullable)
    Array(Box<HostType>),
    /// Host iterator (nullable)
    Iterator,
    /// Instance of a registered class or one of its subclasses (nullable)
    Class(ClassId),
    /// Capability interface. Script functions and plain script objects
    /// can stand in for it; host objects qualify when their class
    /// declares the interface.
    Interface(&'static str),
    /// Engine value of the given kind, passed through unconverted
    Script(ScriptKind),
}

impl HostType {
    /// Instance of a registered Rust type
    pub fn class<T: 'static>() -> Self {
        HostType::Class(ClassId::of::<T>())
    }

    /// Array of `element`
    pub fn array(element: HostType) -> Self {
        HostType::Array(Box::new(element))
    }

    /// Unboxed primitives cannot hold null
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            HostType::Bool
                | HostType::Byte
                | HostType::Short
                | HostType::Int
                | HostType::Long
                | HostType::Float
                | HostType::Double
                | HostType::Char
        )
    }

    /// Capability interface type
    pub fn is_interface(&self) -> bool {
        matches!(self, HostType::Interface(_))
    }

    /// The engine kind whose values this type takes verbatim.
    ///
    /// A script argument of exactly this kind needs no coercion at all.
    pub fn exact_script_kind(&self) -> Option<ScriptKind> {
        match self {
            HostType::Bool => Some(ScriptKind::Boolean),
            HostType::Int => Some(ScriptKind::Integer),
            HostType::Long => Some(ScriptKind::Long),
            HostType::Double => Some(ScriptKind::Double),
            HostType::String => Some(ScriptKind::String),
            HostType::DateTime => Some(ScriptKind::Date),
            HostType::Script(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Whether a script argument is taken verbatim by this type
    pub fn accepts_script_exactly(&self, value: &ScriptValue) -> bool {
        self.exact_script_kind()
            .is_some_and(|kind| kind.accepts(value.kind()))
    }

    /// Whether a non-null host value can be passed as is.
    ///
    /// Primitive types never report assignable: a boxed value has to go
    /// through [`HostType::coerce_exact`].
    pub fn is_assignable_from(&self, value: &HostValue) -> bool {
        match (self, value) {
            (_, HostValue::Null) => false,
            (HostType::Any, _) => true,
            (HostType::String, HostValue::String(_)) => true,
            (HostType::DateTime, HostValue::DateTime(_)) => true,
            (HostType::List, HostValue::List(_)) => true,
            (HostType::Map, HostValue::Map(_)) => true,
            (HostType::Set, HostValue::Set(_)) => true,
            (HostType::Iterator, HostValue::Iterator(_)) => true,
            (HostType::Array(element), HostValue::Array(array)) => {
                **element == HostType::Any || **element == array.element_type()
            }
            (HostType::Class(id), HostValue::Object(object)) => object.class().is_subclass_of(*id),
            (HostType::Interface(name), HostValue::Object(object)) => {
                object.class().implements_interface(name)
            }
            (HostType::Script(kind), HostValue::Script(script)) => kind.accepts(script.kind()),
            _ => false,
        }
    }

    /// Exact primitive coercion: the host value already has this primitive type.
    pub fn coerce_exact(&self, value: &HostValue) -> Option<HostValue> {
        let matches = matches!(
            (self, value),
            (HostType::Bool, HostValue::Bool(_))
                | (HostType::Byte, HostValue::Byte(_))
                | (HostType::Short, HostValue::Short(_))
                | (HostType::Int, HostValue::Int(_))
                | (HostType::Long, HostValue::Long(_))
                | (HostType::Float, HostValue::Float(_))
                | (HostType::Double, HostValue::Double(_))
                | (HostType::Char, HostValue::Char(_))
        );
        matches.then(|| value.clone())
    }

    /// Approximate coercion: numeric narrowing/widening between any numeric
    /// types, one-character strings to `char`, `char` to string.
    pub fn coerce_approximate(&self, value: &HostValue) -> Option<HostValue> {
        if let Some(n) = value.as_i64() {
            return match self {
                HostType::Byte => Some(HostValue::Byte(n as i8)),
                HostType::Short => Some(HostValue::Short(n as i16)),
                HostType::Int => Some(HostValue::Int(n as i32)),
                HostType::Long => Some(HostValue::Long(n)),
                HostType::Float => Some(HostValue::Float(n as f32)),
                HostType::Double => Some(HostValue::Double(n as f64)),
                _ => None,
            };
        }
        if let Some(n) = value.as_f64() {
            return match self {
                HostType::Byte => Some(HostValue::Byte(n as i8)),
                HostType::Short => Some(HostValue::Short(n as i16)),
                HostType::Int => Some(HostValue::Int(n as i32)),
                HostType::Long => Some(HostValue::Long(n as i64)),
                HostType::Float => Some(HostValue::Float(n as f32)),
                HostType::Double => Some(HostValue::Double(n)),
                _ => None,
            };
        }
        match (self, value) {
            (HostType::Char, HostValue::String(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(HostValue::Char(c)),
                    _ => None,
                }
            }
            (HostType::String, HostValue::Char(c)) => Some(HostValue::String(c.to_string())),
            _ => None,
        }
    }

    /// Best-effort coercion used when storing into typed slots (array
    /// elements, fields, indexer keys): null where nullable, then
    /// assignable, exact, approximate.
    pub fn coerce(&self, value: &HostValue) -> Option<HostValue> {
        if value.is_null() {
            return (!self.is_primitive()).then_some(HostValue::Null);
        }
        if self.is_assignable_from(value) {
            return Some(value.clone());
        }
        self.coerce_exact(value)
            .or_else(|| self.coerce_approximate(value))
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Any => f.write_str("any"),
            HostType::Bool => f.write_str("bool"),
            HostType::Byte => f.write_str("byte"),
            HostType::Short => f.write_str("short"),
            HostType::Int => f.write_str("int"),
            HostType::Long => f.write_str("long"),
            HostType::Float => f.write_str("float"),
            HostType::Double => f.write_str("double"),
            HostType::Char => f.write_str("char"),
            HostType::String => f.write_str("string"),
            HostType::DateTime => f.write_str("datetime"),
            HostType::List => f.write_str("list"),
            HostType::Map => f.write_str("map"),
            HostType::Set => f.write_str("set"),
            HostType::Array(element) => write!(f, "{element}[]"),
            HostType::Iterator => f.write_str("iterator"),
            HostType::Class(_) => f.write_str("class"),
            HostType::Interface(name) => f.write_str(name),
            HostType::Script(kind) => write!(f, "script {kind:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ArrayData, HostArray};

    #[test]
    fn test_primitives_are_not_assignable() {
        assert!(!HostType::Int.is_assignable_from(&HostValue::Int(1)));
        assert_eq!(HostType::Int.coerce_exact(&HostValue::Int(1)), Some(HostValue::Int(1)));
        assert_eq!(HostType::Long.coerce_exact(&HostValue::Int(1)), None);
    }

    #[test]
    fn test_approximate_numeric_coercion() {
        assert_eq!(
            HostType::Long.coerce_approximate(&HostValue::Int(7)),
            Some(HostValue::Long(7))
        );
        assert_eq!(
            HostType::Int.coerce_approximate(&HostValue::Double(2.9)),
            Some(HostValue::Int(2))
        );
        assert_eq!(
            HostType::Char.coerce_approximate(&HostValue::from("z")),
            Some(HostValue::Char('z'))
        );
        assert_eq!(HostType::Char.coerce_approximate(&HostValue::from("zz")), None);
        assert_eq!(HostType::Bool.coerce_approximate(&HostValue::Int(1)), None);
    }

    #[test]
    fn test_array_assignability_uses_element_type() {
        let ints = HostValue::Array(HostArray::new(ArrayData::Int(vec![1])));
        assert!(HostType::array(HostType::Int).is_assignable_from(&ints));
        assert!(HostType::array(HostType::Any).is_assignable_from(&ints));
        assert!(!HostType::array(HostType::Long).is_assignable_from(&ints));
    }

    #[test]
    fn test_null_coercion_respects_primitives() {
        assert_eq!(HostType::String.coerce(&HostValue::Null), Some(HostValue::Null));
        assert_eq!(HostType::Int.coerce(&HostValue::Null), None);
    }
}
