//! Symbol protocols: `Symbol.toPrimitive` and `Symbol.iterator`.

use crate::bridge::Bridge;
use crate::dispatch::{CallbackContext, arg};
use crate::engine::{Scoped, ScriptEngine};
use crate::error::InteropResult;
use crate::host::{HostIterator, HostValue};
use crate::script::{ScriptSymbol, ScriptValue};

/// Hint passed to `Symbol.toPrimitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveHint {
    /// `"number"`
    Number,
    /// `"string"`
    String,
    /// `"boolean"`
    Boolean,
    /// `"default"` and anything unrecognized
    Default,
}

impl PrimitiveHint {
    /// Parse a hint argument
    pub fn parse(hint: &ScriptValue) -> Self {
        match hint.as_str() {
            Some("number") => PrimitiveHint::Number,
            Some("string") => PrimitiveHint::String,
            Some("boolean") => PrimitiveHint::Boolean,
            _ => PrimitiveHint::Default,
        }
    }
}

/// Primitive value of a host value under `hint`
pub fn to_primitive(value: &HostValue, hint: PrimitiveHint) -> ScriptValue {
    match hint {
        PrimitiveHint::Number => match value {
            HostValue::Byte(n) => ScriptValue::Integer(i32::from(*n)),
            HostValue::Short(n) => ScriptValue::Integer(i32::from(*n)),
            HostValue::Int(n) => ScriptValue::Integer(*n),
            HostValue::Char(c) => ScriptValue::Integer(*c as i32),
            HostValue::Long(n) => ScriptValue::Long(*n),
            HostValue::Float(n) => ScriptValue::Double(f64::from(*n)),
            HostValue::Double(n) => ScriptValue::Double(*n),
            HostValue::Bool(b) => ScriptValue::Integer(i32::from(*b)),
            _ => ScriptValue::Integer(0),
        },
        PrimitiveHint::String => ScriptValue::String(value.to_display_string()),
        PrimitiveHint::Boolean => ScriptValue::Boolean(match value {
            HostValue::Bool(b) => *b,
            HostValue::String(s) => !s.is_empty(),
            other => other.as_f64().is_some_and(|n| n != 0.0),
        }),
        PrimitiveHint::Default => match value {
            HostValue::Bool(b) => ScriptValue::Boolean(*b),
            HostValue::Byte(n) => ScriptValue::Integer(i32::from(*n)),
            HostValue::Short(n) => ScriptValue::Integer(i32::from(*n)),
            HostValue::Int(n) => ScriptValue::Integer(*n),
            HostValue::Long(n) => ScriptValue::Long(*n),
            HostValue::Float(n) => ScriptValue::Double(f64::from(*n)),
            HostValue::Double(n) => ScriptValue::Double(*n),
            other => ScriptValue::String(other.to_display_string()),
        },
    }
}

/// `[Symbol.toPrimitive](hint)` bound to `target`
pub fn to_primitive_function(
    engine: &dyn ScriptEngine,
    target: &HostValue,
) -> InteropResult<ScriptValue> {
    let target = target.clone();
    engine.create_function(CallbackContext::no_this_result(
        "[Symbol.toPrimitive]",
        move |_, args| Ok(to_primitive(&target, PrimitiveHint::parse(arg(args, 0)))),
    ))
}

/// Single-pass host iterator over an iterable host value
fn host_iterator(value: &HostValue) -> Option<HostIterator> {
    match value {
        HostValue::Iterator(iterator) => Some(iterator.clone()),
        HostValue::List(list) => Some(HostIterator::new(list.snapshot().into_iter())),
        HostValue::Set(set) => Some(HostIterator::new(set.snapshot().into_iter())),
        HostValue::Array(array) => Some(HostIterator::new(array.snapshot().into_iter())),
        HostValue::Map(map) => Some(HostIterator::new(
            map.keys().into_iter().map(HostValue::String),
        )),
        _ => None,
    }
}

/// Wrap an iterable host value as a script iterator object.
///
/// The object has `next()` returning `{value, done}`; elements are
/// converted as they are produced. Its `Symbol.iterator` returns the
/// object itself, so it cannot be restarted. Values that are not iterable
/// yield `undefined`.
pub fn to_iterator(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    value: &HostValue,
) -> InteropResult<ScriptValue> {
    let Some(iterator) = host_iterator(value) else {
        return Ok(ScriptValue::Undefined);
    };

    let object = Scoped::new(engine, engine.create_object()?);
    let next_bridge = bridge.clone();
    let next = Scoped::new(
        engine,
        engine.create_function(CallbackContext::no_this_result("next", move |engine, _| {
            let step = Scoped::new(engine, engine.create_object()?);
            match iterator.next_value()? {
                Some(item) => {
                    let item = Scoped::new(engine, next_bridge.to_script(engine, &item)?);
                    engine.set(step.value(), &"value".into(), item.value())?;
                    engine.set(step.value(), &"done".into(), &ScriptValue::Boolean(false))?;
                }
                None => {
                    engine.set(step.value(), &"value".into(), &ScriptValue::Undefined)?;
                    engine.set(step.value(), &"done".into(), &ScriptValue::Boolean(true))?;
                }
            }
            Ok(step.escape())
        }))?,
    );
    engine.set(object.value(), &"next".into(), next.value())?;

    let itself = Scoped::new(engine, iterator_self_function(engine)?);
    engine.set(
        object.value(),
        &ScriptValue::Symbol(ScriptSymbol::iterator()),
        itself.value(),
    )?;
    Ok(object.escape())
}

/// `[Symbol.iterator]()` returning its receiver
fn iterator_self_function(engine: &dyn ScriptEngine) -> InteropResult<ScriptValue> {
    engine.create_function(CallbackContext::this_result(
        "[Symbol.iterator]",
        |engine, this, _| {
            engine.retain(this)?;
            Ok(this.clone())
        },
    ))
}

/// A function producing a fresh script iterator over `value` on each call
pub fn iterator_function(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    value: &HostValue,
) -> InteropResult<ScriptValue> {
    let bridge = bridge.clone();
    let value = value.clone();
    engine.create_function(CallbackContext::no_this_result(
        "[Symbol.iterator]",
        move |engine, _| to_iterator(engine, &bridge, &value),
    ))
}

/// Symbol-keyed protocol function for `target`, if `symbol` names one.
///
/// Collections get `Symbol.iterator` from their polyfills; this covers
/// plain host iterators and primitive coercion.
pub fn protocol(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    target: &HostValue,
    symbol: &ScriptSymbol,
) -> InteropResult<Option<ScriptValue>> {
    match symbol.description() {
        ScriptSymbol::TO_PRIMITIVE => to_primitive_function(engine, target).map(Some),
        ScriptSymbol::ITERATOR if matches!(target, HostValue::Iterator(_)) => {
            iterator_function(engine, bridge, target).map(Some)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_hint() {
        assert_eq!(
            to_primitive(&HostValue::Char('A'), PrimitiveHint::Number),
            ScriptValue::Integer(65)
        );
        assert_eq!(
            to_primitive(&HostValue::Bool(true), PrimitiveHint::Number),
            ScriptValue::Integer(1)
        );
        assert_eq!(
            to_primitive(&HostValue::Long(7), PrimitiveHint::Number),
            ScriptValue::Long(7)
        );
        assert_eq!(
            to_primitive(&HostValue::from("x"), PrimitiveHint::Number),
            ScriptValue::Integer(0)
        );
    }

    #[test]
    fn test_boolean_and_default_hints() {
        assert_eq!(
            to_primitive(&HostValue::Int(0), PrimitiveHint::Boolean),
            ScriptValue::Boolean(false)
        );
        assert_eq!(
            to_primitive(&HostValue::from("a"), PrimitiveHint::Boolean),
            ScriptValue::Boolean(true)
        );
        assert_eq!(
            to_primitive(&HostValue::Double(1.5), PrimitiveHint::Default),
            ScriptValue::Double(1.5)
        );
        assert_eq!(
            to_primitive(&HostValue::Char('z'), PrimitiveHint::Default),
            ScriptValue::from("z")
        );
    }

    #[test]
    fn test_hint_parsing() {
        assert_eq!(PrimitiveHint::parse(&"number".into()), PrimitiveHint::Number);
        assert_eq!(PrimitiveHint::parse(&ScriptValue::Undefined), PrimitiveHint::Default);
    }
}
