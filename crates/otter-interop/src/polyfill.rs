//! Collection protocol polyfills.
//!
//! Proxied lists, arrays, maps and sets answer the property names scripts
//! expect from their native counterparts (`length`, `forEach`, `size`,
//! `Symbol.iterator`, ...) when the registered class does not.
//! `length` and `size` are data properties; every other entry resolves to
//! a function bound to the proxied collection.
//!
//! Wrapped primitives get `toJSON`, `toString` and `valueOf`, plus `length`
//! for strings.

use crate::bridge::Bridge;
use crate::descriptor::TargetKind;
use crate::dispatch::{CallbackContext, arg};
use crate::engine::{Scoped, ScriptEngine};
use crate::error::{InteropError, InteropResult};
use crate::host::{HostArray, HostIterator, HostList, HostMap, HostSet, HostValue};
use crate::script::{ScriptSymbol, ScriptValue};
use crate::symbols::PrimitiveHint;
use crate::{convert, symbols};
use rustc_hash::FxHashMap;

/// Everything a polyfill body can see
pub struct PolyfillContext<'a> {
    engine: &'a dyn ScriptEngine,
    bridge: &'a Bridge,
    target: &'a HostValue,
}

type PropertyFn = fn(&PolyfillContext<'_>) -> InteropResult<ScriptValue>;
type MethodFn =
    fn(&PolyfillContext<'_>, &ScriptValue, &[ScriptValue]) -> InteropResult<ScriptValue>;

/// One polyfilled name
#[derive(Clone, Copy)]
pub enum Polyfill {
    /// Data property computed on access
    Property(PropertyFn),
    /// Function taking `(this, args)`
    Method(MethodFn),
}

type Table = FxHashMap<&'static str, Polyfill>;

static LIST: once_cell::sync::Lazy<Table> = once_cell::sync::Lazy::new(|| {
    table([
        ("at", Polyfill::Method(at)),
        ("concat", Polyfill::Method(concat)),
        ("entries", Polyfill::Method(indexed_entries)),
        ("every", Polyfill::Method(every)),
        ("filter", Polyfill::Method(filter)),
        ("forEach", Polyfill::Method(for_each_indexed)),
        ("includes", Polyfill::Method(includes)),
        ("indexOf", Polyfill::Method(index_of)),
        ("join", Polyfill::Method(join)),
        ("keys", Polyfill::Method(indexed_keys)),
        ("length", Polyfill::Property(length)),
        ("map", Polyfill::Method(map)),
        ("pop", Polyfill::Method(pop)),
        ("push", Polyfill::Method(push)),
        ("reverse", Polyfill::Method(reverse)),
        ("shift", Polyfill::Method(shift)),
        ("some", Polyfill::Method(some)),
        ("toJSON", Polyfill::Method(to_json)),
        ("toReversed", Polyfill::Method(to_reversed)),
        ("toString", Polyfill::Method(to_string_joined)),
        ("unshift", Polyfill::Method(unshift)),
        ("values", Polyfill::Method(values)),
    ])
});

static ARRAY: once_cell::sync::Lazy<Table> = once_cell::sync::Lazy::new(|| {
    table([
        ("at", Polyfill::Method(at)),
        ("entries", Polyfill::Method(indexed_entries)),
        ("every", Polyfill::Method(every)),
        ("fill", Polyfill::Method(fill)),
        ("filter", Polyfill::Method(filter)),
        ("forEach", Polyfill::Method(for_each_indexed)),
        ("includes", Polyfill::Method(includes)),
        ("indexOf", Polyfill::Method(index_of)),
        ("join", Polyfill::Method(join)),
        ("keys", Polyfill::Method(indexed_keys)),
        ("length", Polyfill::Property(length)),
        ("map", Polyfill::Method(map)),
        ("some", Polyfill::Method(some)),
        ("toJSON", Polyfill::Method(to_json)),
        ("toString", Polyfill::Method(to_string_joined)),
        ("values", Polyfill::Method(values)),
    ])
});

static MAP: once_cell::sync::Lazy<Table> = once_cell::sync::Lazy::new(|| {
    table([
        ("clear", Polyfill::Method(clear)),
        ("delete", Polyfill::Method(map_delete)),
        ("entries", Polyfill::Method(map_entries)),
        ("forEach", Polyfill::Method(map_for_each)),
        ("get", Polyfill::Method(map_get)),
        ("has", Polyfill::Method(map_has)),
        ("keys", Polyfill::Method(map_keys)),
        ("set", Polyfill::Method(map_set)),
        ("size", Polyfill::Property(size)),
        ("toJSON", Polyfill::Method(to_json)),
        ("toString", Polyfill::Method(to_string_json)),
        ("values", Polyfill::Method(values)),
    ])
});

static SET: once_cell::sync::Lazy<Table> = once_cell::sync::Lazy::new(|| {
    table([
        ("add", Polyfill::Method(set_add)),
        ("clear", Polyfill::Method(clear)),
        ("delete", Polyfill::Method(set_delete)),
        ("entries", Polyfill::Method(set_entries)),
        ("forEach", Polyfill::Method(set_for_each)),
        ("has", Polyfill::Method(includes)),
        ("keys", Polyfill::Method(values)),
        ("size", Polyfill::Property(size)),
        ("toJSON", Polyfill::Method(to_json)),
        ("toString", Polyfill::Method(to_string_json)),
        ("values", Polyfill::Method(values)),
    ])
});

static PRIMITIVE: once_cell::sync::Lazy<Table> = once_cell::sync::Lazy::new(|| {
    table([
        ("length", Polyfill::Property(text_length)),
        ("toJSON", Polyfill::Method(to_json)),
        ("toString", Polyfill::Method(to_string_plain)),
        ("valueOf", Polyfill::Method(value_of)),
    ])
});

fn table<const N: usize>(entries: [(&'static str, Polyfill); N]) -> Table {
    entries.into_iter().collect()
}

fn table_for(kind: TargetKind) -> Option<&'static Table> {
    match kind {
        TargetKind::List => Some(&*LIST),
        TargetKind::Array => Some(&*ARRAY),
        TargetKind::Map => Some(&*MAP),
        TargetKind::Set => Some(&*SET),
        TargetKind::Primitive => Some(&*PRIMITIVE),
        _ => None,
    }
}

/// Polyfill answering `key` on a target of `kind`
pub fn lookup(kind: TargetKind, key: &ScriptValue) -> Option<(&'static str, Polyfill)> {
    match key {
        ScriptValue::String(name) => table_for(kind)?
            .get_key_value(name.as_str())
            .map(|(name, polyfill)| (*name, *polyfill)),
        ScriptValue::Symbol(symbol) if symbol.description() == ScriptSymbol::ITERATOR => {
            let iterate: MethodFn = match kind {
                TargetKind::Map => map_entries,
                TargetKind::List | TargetKind::Array | TargetKind::Set => values,
                _ => return None,
            };
            Some(("[Symbol.iterator]", Polyfill::Method(iterate)))
        }
        _ => None,
    }
}

/// Polyfilled names of a target kind, sorted
pub fn names(kind: TargetKind) -> Vec<&'static str> {
    let mut names: Vec<_> = table_for(kind)
        .map(|table| table.keys().copied().collect())
        .unwrap_or_default();
    names.sort_unstable();
    names
}

/// Produce the script value of a polyfill for `target`
pub fn resolve(
    engine: &dyn ScriptEngine,
    bridge: &Bridge,
    target: &HostValue,
    name: &'static str,
    polyfill: Polyfill,
) -> InteropResult<ScriptValue> {
    match polyfill {
        Polyfill::Property(read) => read(&PolyfillContext {
            engine,
            bridge,
            target,
        }),
        Polyfill::Method(body) => {
            let bridge = bridge.clone();
            let target = target.clone();
            engine.create_function(CallbackContext::this_result(
                name,
                move |engine, this, args| {
                    let cx = PolyfillContext {
                        engine,
                        bridge: &bridge,
                        target: &target,
                    };
                    body(&cx, this, args)
                },
            ))
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl PolyfillContext<'_> {
    fn to_script(&self, value: &HostValue) -> InteropResult<ScriptValue> {
        self.bridge.to_script(self.engine, value)
    }

    fn to_host(&self, value: &ScriptValue) -> InteropResult<HostValue> {
        self.bridge.to_host(self.engine, value)
    }

    fn elements(&self) -> Vec<HostValue> {
        match self.target {
            HostValue::List(list) => list.snapshot(),
            HostValue::Array(array) => array.snapshot(),
            HostValue::Set(set) => set.snapshot(),
            HostValue::Map(map) => map.values(),
            _ => Vec::new(),
        }
    }

    fn list(&self) -> InteropResult<&HostList> {
        match self.target {
            HostValue::List(list) => Ok(list),
            other => Err(wrong_target("list", other)),
        }
    }

    fn array(&self) -> InteropResult<&HostArray> {
        match self.target {
            HostValue::Array(array) => Ok(array),
            other => Err(wrong_target("array", other)),
        }
    }

    fn map(&self) -> InteropResult<&HostMap> {
        match self.target {
            HostValue::Map(map) => Ok(map),
            other => Err(wrong_target("map", other)),
        }
    }

    fn set(&self) -> InteropResult<&HostSet> {
        match self.target {
            HostValue::Set(set) => Ok(set),
            other => Err(wrong_target("set", other)),
        }
    }

    fn iterator(
        &self,
        items: impl Iterator<Item = HostValue> + 'static,
    ) -> InteropResult<ScriptValue> {
        symbols::to_iterator(
            self.engine,
            self.bridge,
            &HostValue::Iterator(HostIterator::new(items)),
        )
    }

    /// Call a script callback with `(item, key, receiver)`
    fn call_back(
        &self,
        callback: &ScriptValue,
        item: &HostValue,
        key: &HostValue,
        this: &ScriptValue,
    ) -> InteropResult<Scoped<'_>> {
        if !callback.is_function() && !callback.is_proxy() {
            return Err(InteropError::type_error(format!(
                "{} is not a function",
                callback.to_display_string()
            )));
        }
        let item = Scoped::new(self.engine, self.to_script(item)?);
        let key = Scoped::new(self.engine, self.to_script(key)?);
        let result = self.engine.call(
            callback,
            &ScriptValue::Undefined,
            &[item.value().clone(), key.value().clone(), this.clone()],
        )?;
        Ok(Scoped::new(self.engine, result))
    }

    fn retained(&self, this: &ScriptValue) -> InteropResult<ScriptValue> {
        self.engine.retain(this)?;
        Ok(this.clone())
    }
}

fn wrong_target(expected: &str, actual: &HostValue) -> InteropError {
    InteropError::type_error(format!(
        "{expected} polyfill called on {}",
        actual.type_name()
    ))
}

fn count(len: usize) -> ScriptValue {
    ScriptValue::Integer(i32::try_from(len).unwrap_or(i32::MAX))
}

fn index(i: usize) -> HostValue {
    HostValue::Int(i32::try_from(i).unwrap_or(i32::MAX))
}

/// Relative index argument (negative counts from the end)
fn relative(value: &ScriptValue, len: usize, default: usize) -> usize {
    let Some(n) = value.as_number() else {
        return default;
    };
    let n = n.trunc() as i64;
    let len = len as i64;
    let resolved = if n < 0 { (len + n).max(0) } else { n.min(len) };
    resolved as usize
}

fn display(value: &HostValue) -> String {
    match value {
        HostValue::Null => String::new(),
        other => other.to_display_string(),
    }
}

// ============================================================================
// Indexed (list and array)
// ============================================================================

fn length(cx: &PolyfillContext<'_>) -> InteropResult<ScriptValue> {
    Ok(count(cx.elements().len()))
}

fn at(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let items = cx.elements();
    let Some(n) = arg(args, 0).as_number().map(|n| n.trunc() as i64) else {
        return match items.first() {
            Some(item) => cx.to_script(item),
            None => Ok(ScriptValue::Undefined),
        };
    };
    let position = if n < 0 { items.len() as i64 + n } else { n };
    match usize::try_from(position).ok().and_then(|i| items.get(i)) {
        Some(item) => cx.to_script(item),
        None => Ok(ScriptValue::Undefined),
    }
}

fn concat(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let mut items = cx.elements();
    for value in args {
        match cx.to_host(value)? {
            HostValue::List(list) => items.extend(list.snapshot()),
            HostValue::Array(array) => items.extend(array.snapshot()),
            other => items.push(other),
        }
    }
    convert::to_script_array(cx.engine, cx.bridge, &items)
}

fn indexed_entries(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let pairs = cx
        .elements()
        .into_iter()
        .enumerate()
        .map(|(i, item)| HostValue::List(HostList::from(vec![index(i), item])));
    cx.iterator(pairs.collect::<Vec<_>>().into_iter())
}

fn indexed_keys(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let len = cx.elements().len();
    cx.iterator((0..len).map(index))
}

fn values(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    cx.iterator(cx.elements().into_iter())
}

fn every(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    for (i, item) in cx.elements().iter().enumerate() {
        if !cx.call_back(arg(args, 0), item, &index(i), this)?.value().is_truthy() {
            return Ok(ScriptValue::Boolean(false));
        }
    }
    Ok(ScriptValue::Boolean(true))
}

fn some(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    for (i, item) in cx.elements().iter().enumerate() {
        if cx.call_back(arg(args, 0), item, &index(i), this)?.value().is_truthy() {
            return Ok(ScriptValue::Boolean(true));
        }
    }
    Ok(ScriptValue::Boolean(false))
}

fn filter(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let mut kept = Vec::new();
    for (i, item) in cx.elements().into_iter().enumerate() {
        if cx.call_back(arg(args, 0), &item, &index(i), this)?.value().is_truthy() {
            kept.push(item);
        }
    }
    convert::to_script_array(cx.engine, cx.bridge, &kept)
}

fn for_each_indexed(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    for (i, item) in cx.elements().iter().enumerate() {
        cx.call_back(arg(args, 0), item, &index(i), this)?;
    }
    Ok(ScriptValue::Undefined)
}

fn map(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let array = Scoped::new(cx.engine, cx.engine.create_array()?);
    for (i, item) in cx.elements().iter().enumerate() {
        let mapped = cx.call_back(arg(args, 0), item, &index(i), this)?;
        cx.engine.array_push(array.value(), mapped.value())?;
    }
    Ok(array.escape())
}

fn includes(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let needle = cx.to_host(arg(args, 0))?;
    Ok(ScriptValue::Boolean(cx.elements().contains(&needle)))
}

fn index_of(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let needle = cx.to_host(arg(args, 0))?;
    let position = cx.elements().iter().position(|item| *item == needle);
    Ok(position.map_or(ScriptValue::Integer(-1), count))
}

fn join(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let separator = match arg(args, 0) {
        ScriptValue::Undefined => ",".to_string(),
        other => other.to_display_string(),
    };
    let parts: Vec<String> = cx.elements().iter().map(display).collect();
    Ok(ScriptValue::String(parts.join(&separator)))
}

fn to_string_joined(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    join(cx, this, &[])
}

fn to_json(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    convert::to_script_copy(cx.engine, cx.bridge, cx.target)
}

fn pop(cx: &PolyfillContext<'_>, _: &ScriptValue, _: &[ScriptValue]) -> InteropResult<ScriptValue> {
    match cx.list()?.pop()? {
        Some(item) => cx.to_script(&item),
        None => Ok(ScriptValue::Undefined),
    }
}

fn shift(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    match cx.list()?.remove(0)? {
        Some(item) => cx.to_script(&item),
        None => Ok(ScriptValue::Undefined),
    }
}

fn push(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let list = cx.list()?;
    for value in args {
        list.push(cx.to_host(value)?)?;
    }
    Ok(count(list.len()))
}

fn unshift(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let list = cx.list()?;
    for (i, value) in args.iter().enumerate() {
        list.insert(i, cx.to_host(value)?)?;
    }
    Ok(count(list.len()))
}

fn reverse(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    cx.list()?.reverse()?;
    cx.retained(this)
}

fn to_reversed(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let mut items = cx.list()?.snapshot();
    items.reverse();
    convert::to_script_array(cx.engine, cx.bridge, &items)
}

fn fill(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let array = cx.array()?;
    let value = cx.to_host(arg(args, 0))?;
    let len = array.len();
    let start = relative(arg(args, 1), len, 0);
    let end = relative(arg(args, 2), len, len);
    for i in start..end {
        array.set(i, value.clone())?;
    }
    cx.retained(this)
}

// ============================================================================
// Keyed (map and set)
// ============================================================================

fn size(cx: &PolyfillContext<'_>) -> InteropResult<ScriptValue> {
    Ok(match cx.target {
        HostValue::Map(map) => count(map.len()),
        HostValue::Set(set) => count(set.len()),
        other => return Err(wrong_target("map or set", other)),
    })
}

fn clear(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    match cx.target {
        HostValue::Map(map) => map.clear()?,
        HostValue::Set(set) => set.clear()?,
        other => return Err(wrong_target("map or set", other)),
    }
    Ok(ScriptValue::Undefined)
}

fn to_string_json(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    Ok(ScriptValue::String(cx.target.to_json().to_string()))
}

fn map_key(args: &[ScriptValue]) -> String {
    arg(args, 0).to_display_string()
}

fn map_get(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    match cx.map()?.get(&map_key(args)) {
        Some(item) => cx.to_script(&item),
        None => Ok(ScriptValue::Undefined),
    }
}

fn map_has(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    Ok(ScriptValue::Boolean(cx.map()?.contains_key(&map_key(args))))
}

fn map_set(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let value = cx.to_host(arg(args, 1))?;
    cx.map()?.insert(map_key(args), value)?;
    cx.retained(this)
}

fn map_delete(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    Ok(ScriptValue::Boolean(cx.map()?.remove(&map_key(args))?.is_some()))
}

fn map_keys(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    cx.iterator(cx.map()?.keys().into_iter().map(HostValue::String))
}

fn map_entries(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let pairs = cx
        .map()?
        .entries()
        .into_iter()
        .map(|(key, item)| HostValue::List(HostList::from(vec![HostValue::String(key), item])));
    cx.iterator(pairs)
}

fn map_for_each(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    for (key, item) in cx.map()?.entries() {
        cx.call_back(arg(args, 0), &item, &HostValue::String(key), this)?;
    }
    Ok(ScriptValue::Undefined)
}

fn set_add(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let value = cx.to_host(arg(args, 0))?;
    cx.set()?.insert(value)?;
    cx.retained(this)
}

fn set_delete(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let value = cx.to_host(arg(args, 0))?;
    Ok(ScriptValue::Boolean(cx.set()?.remove(&value)?))
}

fn set_entries(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    let pairs = cx
        .set()?
        .snapshot()
        .into_iter()
        .map(|item| HostValue::List(HostList::from(vec![item.clone(), item])));
    cx.iterator(pairs)
}

fn set_for_each(
    cx: &PolyfillContext<'_>,
    this: &ScriptValue,
    args: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    for item in cx.set()?.snapshot() {
        cx.call_back(arg(args, 0), &item, &item, this)?;
    }
    Ok(ScriptValue::Undefined)
}

// ============================================================================
// Primitives
// ============================================================================

/// Character count of a wrapped string, `undefined` for other primitives
fn text_length(cx: &PolyfillContext<'_>) -> InteropResult<ScriptValue> {
    Ok(match cx.target {
        HostValue::String(text) => count(text.chars().count()),
        _ => ScriptValue::Undefined,
    })
}

fn to_string_plain(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    Ok(ScriptValue::String(display(cx.target)))
}

fn value_of(
    cx: &PolyfillContext<'_>,
    _: &ScriptValue,
    _: &[ScriptValue],
) -> InteropResult<ScriptValue> {
    Ok(symbols::to_primitive(cx.target, PrimitiveHint::Default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_match_collection_protocols() {
        assert_eq!(
            names(TargetKind::Map),
            [
                "clear", "delete", "entries", "forEach", "get", "has", "keys", "set", "size",
                "toJSON", "toString", "values"
            ]
        );
        assert_eq!(
            names(TargetKind::Set),
            [
                "add", "clear", "delete", "entries", "forEach", "has", "keys", "size", "toJSON",
                "toString", "values"
            ]
        );
        assert_eq!(names(TargetKind::List).len(), 22);
        assert_eq!(names(TargetKind::Array).len(), 16);
        assert_eq!(
            names(TargetKind::Primitive),
            ["length", "toJSON", "toString", "valueOf"]
        );
        assert!(names(TargetKind::Object).is_empty());
    }

    #[test]
    fn test_symbol_iterator_lookup() {
        let key = ScriptValue::Symbol(ScriptSymbol::iterator());
        assert!(lookup(TargetKind::List, &key).is_some());
        assert!(lookup(TargetKind::Map, &key).is_some());
        assert!(lookup(TargetKind::Object, &key).is_none());
        assert!(lookup(TargetKind::List, &"nope".into()).is_none());
        assert!(matches!(
            lookup(TargetKind::Set, &"size".into()),
            Some(("size", Polyfill::Property(_)))
        ));
    }

    #[test]
    fn test_relative_index() {
        assert_eq!(relative(&ScriptValue::Integer(-1), 5, 0), 4);
        assert_eq!(relative(&ScriptValue::Integer(9), 5, 0), 5);
        assert_eq!(relative(&ScriptValue::Undefined, 5, 3), 3);
    }
}
