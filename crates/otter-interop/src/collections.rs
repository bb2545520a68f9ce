//! Built-in registrations for host collections.
//!
//! Lists, maps, sets and typed arrays are proxied through the same
//! descriptor path as registered classes. Their members are native methods
//! reading the collection from [`HostCall::this`]; everything else a script
//! expects from a collection comes from the polyfills.
//!
//! Strings and the other primitives only become proxies when asked for
//! explicitly through [`Bridge::proxy_object`](crate::Bridge::proxy_object).

use crate::descriptor::TargetKind;
use crate::error::{InteropError, InteropResult};
use crate::host::{HostArray, HostList, HostMap, HostSet, HostValue};
use crate::registration::{HostCall, HostClass};
use crate::types::HostType;
use std::sync::Arc;

/// `List`: `get(int)` indexer plus `add`, `contains`, `clear`, `isEmpty`
pub static LIST_CLASS: once_cell::sync::Lazy<Arc<HostClass>> = once_cell::sync::Lazy::new(|| {
    HostClass::builder::<HostList>("List")
        .target_kind(TargetKind::List)
        .native_method("get", [HostType::Int], |call| {
            let list = this_list(call)?;
            let index = call.int(0)?;
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| list.get(i))
                .unwrap_or(HostValue::Null))
        })
        .native_method("add", [HostType::Any], |call| {
            let list = this_list(call)?;
            list.push(call.take(0))?;
            Ok(HostValue::Bool(true))
        })
        .native_method("contains", [HostType::Any], |call| {
            Ok(this_list(call)?.contains(call.arg(0)).into())
        })
        .native_method("clear", [], |call| {
            this_list(call)?.clear()?;
            Ok(HostValue::Null)
        })
        .native_method("isEmpty", [], |call| Ok(this_list(call)?.is_empty().into()))
        .build()
});

/// `Map`: `get(String)` / `put(String, any)` indexers plus `containsKey`,
/// `remove`, `isEmpty`
pub static MAP_CLASS: once_cell::sync::Lazy<Arc<HostClass>> = once_cell::sync::Lazy::new(|| {
    HostClass::builder::<HostMap>("Map")
        .target_kind(TargetKind::Map)
        .native_method("get", [HostType::String], |call| {
            let map = this_map(call)?;
            Ok(map.get(call.str(0)?).unwrap_or(HostValue::Null))
        })
        .native_method("put", [HostType::String, HostType::Any], |call| {
            let map = this_map(call)?;
            let key = call.str(0)?.to_string();
            let value = call.take(1);
            Ok(map.insert(key, value)?.unwrap_or(HostValue::Null))
        })
        .native_method("containsKey", [HostType::String], |call| {
            Ok(this_map(call)?.contains_key(call.str(0)?).into())
        })
        .native_method("remove", [HostType::String], |call| {
            let map = this_map(call)?;
            Ok(map.remove(call.str(0)?)?.unwrap_or(HostValue::Null))
        })
        .native_method("isEmpty", [], |call| Ok(this_map(call)?.is_empty().into()))
        .build()
});

/// `Set`: `contains`, `remove`, `isEmpty`
pub static SET_CLASS: once_cell::sync::Lazy<Arc<HostClass>> = once_cell::sync::Lazy::new(|| {
    HostClass::builder::<HostSet>("Set")
        .target_kind(TargetKind::Set)
        .native_method("contains", [HostType::Any], |call| {
            Ok(this_set(call)?.contains(call.arg(0)).into())
        })
        .native_method("remove", [HostType::Any], |call| {
            Ok(this_set(call)?.remove(call.arg(0))?.into())
        })
        .native_method("isEmpty", [], |call| Ok(this_set(call)?.is_empty().into()))
        .build()
});

/// Typed arrays expose indexes, `length` and polyfills only
pub static ARRAY_CLASS: once_cell::sync::Lazy<Arc<HostClass>> = once_cell::sync::Lazy::new(|| {
    HostClass::builder::<HostArray>("Array")
        .target_kind(TargetKind::Array)
        .build()
});

/// Wrapped strings: character access plus the common text methods.
///
/// Positions count characters, not bytes.
pub static STRING_CLASS: once_cell::sync::Lazy<Arc<HostClass>> = once_cell::sync::Lazy::new(|| {
    HostClass::builder::<String>("String")
        .target_kind(TargetKind::Primitive)
        .native_method("charAt", [HostType::Int], |call| {
            let text = this_string(call)?;
            let index = call.int(0)?;
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| text.chars().nth(i))
                .map(String::from)
                .unwrap_or_default()
                .into())
        })
        .native_method("indexOf", [HostType::String], |call| {
            let text = this_string(call)?;
            let found = text.find(call.str(0)?).map(|at| text[..at].chars().count());
            Ok(found
                .and_then(|n| i32::try_from(n).ok())
                .unwrap_or(-1)
                .into())
        })
        .native_method("startsWith", [HostType::String], |call| {
            Ok(this_string(call)?.starts_with(call.str(0)?).into())
        })
        .native_method("endsWith", [HostType::String], |call| {
            Ok(this_string(call)?.ends_with(call.str(0)?).into())
        })
        .native_method("toUpperCase", [], |call| Ok(this_string(call)?.to_uppercase().into()))
        .native_method("toLowerCase", [], |call| Ok(this_string(call)?.to_lowercase().into()))
        .native_method("trim", [], |call| Ok(this_string(call)?.trim().into()))
        .native_method("substring", [HostType::Int], |call| {
            let text = this_string(call)?;
            let start = char_position(call.int(0)?);
            Ok(text.chars().skip(start).collect::<String>().into())
        })
        .native_method("substring", [HostType::Int, HostType::Int], |call| {
            let text = this_string(call)?;
            let (a, b) = (char_position(call.int(0)?), char_position(call.int(1)?));
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Ok(text
                .chars()
                .skip(start)
                .take(end - start)
                .collect::<String>()
                .into())
        })
        .native_method("split", [HostType::String], |call| {
            let text = this_string(call)?;
            let separator = call.str(0)?;
            let parts: HostList = if separator.is_empty() {
                text.chars().map(HostValue::Char).collect()
            } else {
                text.split(separator).map(HostValue::from).collect()
            };
            Ok(parts.into())
        })
        .build()
});

/// Numbers, booleans and chars have no members of their own
pub static PRIMITIVE_CLASS: once_cell::sync::Lazy<Arc<HostClass>> =
    once_cell::sync::Lazy::new(|| {
        HostClass::builder::<HostValue>("Primitive")
            .target_kind(TargetKind::Primitive)
            .build()
    });

/// Registration backing a proxied host value, if it has one
pub fn class_of(value: &HostValue) -> Option<Arc<HostClass>> {
    match value {
        HostValue::Object(object) => Some(object.class().clone()),
        HostValue::List(_) => Some(LIST_CLASS.clone()),
        HostValue::Map(_) => Some(MAP_CLASS.clone()),
        HostValue::Set(_) => Some(SET_CLASS.clone()),
        HostValue::Array(_) => Some(ARRAY_CLASS.clone()),
        HostValue::String(_) => Some(STRING_CLASS.clone()),
        HostValue::Bool(_)
        | HostValue::Byte(_)
        | HostValue::Short(_)
        | HostValue::Int(_)
        | HostValue::Long(_)
        | HostValue::Float(_)
        | HostValue::Double(_)
        | HostValue::Char(_) => Some(PRIMITIVE_CLASS.clone()),
        _ => None,
    }
}

fn receiver_error(expected: &str, actual: &HostValue) -> InteropError {
    InteropError::type_error(format!(
        "{expected} method called on {}",
        actual.type_name()
    ))
}

fn this_list(call: &HostCall<'_>) -> InteropResult<HostList> {
    match call.this() {
        HostValue::List(list) => Ok(list.clone()),
        other => Err(receiver_error("List", other)),
    }
}

fn this_map(call: &HostCall<'_>) -> InteropResult<HostMap> {
    match call.this() {
        HostValue::Map(map) => Ok(map.clone()),
        other => Err(receiver_error("Map", other)),
    }
}

fn this_set(call: &HostCall<'_>) -> InteropResult<HostSet> {
    match call.this() {
        HostValue::Set(set) => Ok(set.clone()),
        other => Err(receiver_error("Set", other)),
    }
}

fn this_string<'a>(call: &'a HostCall<'_>) -> InteropResult<&'a str> {
    match call.this() {
        HostValue::String(text) => Ok(text),
        other => Err(receiver_error("String", other)),
    }
}

fn char_position(index: i32) -> usize {
    usize::try_from(index).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ArrayData;

    #[test]
    fn test_collection_classes_declare_target_kind() {
        assert_eq!(LIST_CLASS.target_kind(), TargetKind::List);
        assert_eq!(MAP_CLASS.target_kind(), TargetKind::Map);
        assert_eq!(SET_CLASS.target_kind(), TargetKind::Set);
        assert_eq!(ARRAY_CLASS.target_kind(), TargetKind::Array);
        assert_eq!(STRING_CLASS.target_kind(), TargetKind::Primitive);
        assert_eq!(PRIMITIVE_CLASS.target_kind(), TargetKind::Primitive);
    }

    #[test]
    fn test_class_of_host_values() {
        let array = HostValue::Array(HostArray::new(ArrayData::Int(vec![1])));
        assert_eq!(class_of(&array).map(|c| c.id()), Some(ARRAY_CLASS.id()));
        assert_eq!(
            class_of(&HostValue::List(HostList::new())).map(|c| c.id()),
            Some(LIST_CLASS.id())
        );
        assert_eq!(
            class_of(&HostValue::from("abc")).map(|c| c.id()),
            Some(STRING_CLASS.id())
        );
        assert_eq!(
            class_of(&HostValue::Int(1)).map(|c| c.id()),
            Some(PRIMITIVE_CLASS.id())
        );
        assert!(class_of(&HostValue::Null).is_none());
    }
}
