//! Collection access used by the proxy traps.
//!
//! Lists, arrays and wrapped strings answer numeric index keys and
//! `length`; maps answer their string keys and sets their elements for
//! membership. Everything here works on stringified script keys.

use crate::error::InteropResult;
use crate::host::HostValue;
use crate::script::ScriptValue;

const LENGTH: &str = "length";

fn is_length(key: &ScriptValue) -> bool {
    key.as_str() == Some(LENGTH)
}

fn length(len: usize) -> HostValue {
    HostValue::Int(i32::try_from(len).unwrap_or(i32::MAX))
}

/// Indexed element or `length` of a list, array or string.
///
/// `None` means the key is not a collection key and lookup should continue.
pub fn get(target: &HostValue, key: &ScriptValue) -> Option<HostValue> {
    match target {
        HostValue::List(list) => {
            if is_length(key) {
                return Some(length(list.len()));
            }
            key.as_index().and_then(|index| list.get(index))
        }
        HostValue::Array(array) => {
            if is_length(key) {
                return Some(length(array.len()));
            }
            key.as_index().and_then(|index| array.get(index))
        }
        HostValue::String(text) => {
            if is_length(key) {
                return Some(length(text.chars().count()));
            }
            key.as_index()
                .and_then(|index| text.chars().nth(index))
                .map(|c| HostValue::String(c.to_string()))
        }
        _ => None,
    }
}

/// Replace an in-range element of a list or array.
///
/// Returns false for anything that is not an in-range index; array
/// elements are coerced to the array's element type.
pub fn set(target: &HostValue, key: &ScriptValue, value: HostValue) -> InteropResult<bool> {
    let Some(index) = key.as_index() else {
        return Ok(false);
    };
    match target {
        HostValue::List(list) => list.set(index, value),
        HostValue::Array(array) => array.set(index, value),
        _ => Ok(false),
    }
}

/// Membership: index in range, `length`, map key or set element
pub fn has(target: &HostValue, key: &ScriptValue) -> bool {
    match target {
        HostValue::List(list) => {
            is_length(key) || key.as_index().is_some_and(|index| index < list.len())
        }
        HostValue::Array(array) => {
            is_length(key) || key.as_index().is_some_and(|index| index < array.len())
        }
        HostValue::String(text) => {
            is_length(key) || key.as_index().is_some_and(|index| index < text.chars().count())
        }
        HostValue::Map(map) => map.contains_key(&key.to_display_string()),
        HostValue::Set(set) => set.contains(&HostValue::String(key.to_display_string())),
        _ => false,
    }
}

/// `delete target[key]`.
///
/// Arrays only null slots of nullable element types; lists remove by
/// index; maps remove by key; sets remove the stringified element.
pub fn delete(target: &HostValue, key: &ScriptValue) -> InteropResult<bool> {
    match (target, key.as_index()) {
        (HostValue::List(list), Some(index)) => Ok(list.remove(index)?.is_some()),
        (HostValue::Array(array), Some(index)) => array.clear_slot(index),
        (HostValue::Map(map), _) => Ok(map.remove(&key.to_display_string())?.is_some()),
        (HostValue::Set(set), _) => set.remove(&HostValue::String(key.to_display_string())),
        _ => Ok(false),
    }
}

/// Own keys of a collection target, `None` for everything else.
///
/// Lists, arrays and strings list their indexes; maps their keys; sets
/// their elements' display strings.
pub fn keys(target: &HostValue) -> Option<Vec<String>> {
    match target {
        HostValue::List(list) => Some((0..list.len()).map(|i| i.to_string()).collect()),
        HostValue::Array(array) => Some((0..array.len()).map(|i| i.to_string()).collect()),
        HostValue::String(text) => {
            Some((0..text.chars().count()).map(|i| i.to_string()).collect())
        }
        HostValue::Map(map) => Some(map.keys()),
        HostValue::Set(set) => Some(
            set.snapshot()
                .iter()
                .map(HostValue::to_display_string)
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ArrayData, HostArray, HostList, HostMap, HostSet};

    fn list() -> HostValue {
        HostValue::List(HostList::from(vec![HostValue::Int(1), HostValue::Int(2)]))
    }

    #[test]
    fn test_index_and_length() {
        let list = list();
        assert_eq!(get(&list, &"1".into()), Some(HostValue::Int(2)));
        assert_eq!(get(&list, &"length".into()), Some(HostValue::Int(2)));
        assert_eq!(get(&list, &"5".into()), None);
        assert_eq!(get(&list, &"size".into()), None);
        assert!(has(&list, &"0".into()));
        assert!(!has(&list, &"2".into()));
    }

    #[test]
    fn test_set_in_range_only() {
        let list = list();
        assert!(set(&list, &"0".into(), HostValue::Int(9)).unwrap());
        assert!(!set(&list, &"7".into(), HostValue::Int(9)).unwrap());
        assert_eq!(get(&list, &"0".into()), Some(HostValue::Int(9)));
    }

    #[test]
    fn test_delete_by_kind() {
        let ints = HostValue::Array(HostArray::new(ArrayData::Int(vec![1, 2])));
        assert!(!delete(&ints, &"0".into()).unwrap());
        assert_eq!(get(&ints, &"0".into()), Some(HostValue::Int(1)));

        let objects = HostValue::Array(HostArray::new(ArrayData::Object(vec![HostValue::Int(1)])));
        assert!(delete(&objects, &"0".into()).unwrap());
        assert_eq!(get(&objects, &"0".into()), Some(HostValue::Null));

        let list = list();
        assert!(delete(&list, &"0".into()).unwrap());
        assert_eq!(keys(&list), Some(vec!["0".to_string()]));
    }

    #[test]
    fn test_keyed_membership() {
        let map: HostMap = [("a", HostValue::Int(1))].into_iter().collect();
        let map = HostValue::Map(map);
        assert!(has(&map, &"a".into()));
        assert!(delete(&map, &"a".into()).unwrap());
        assert!(!has(&map, &"a".into()));

        let set: HostSet = [HostValue::from("x")].into_iter().collect();
        let set = HostValue::Set(set);
        assert!(has(&set, &"x".into()));
        assert_eq!(keys(&set), Some(vec!["x".to_string()]));
        assert_eq!(keys(&HostValue::Int(1)), None);
    }

    #[test]
    fn test_string_characters() {
        let text = HostValue::from("héllo");
        assert_eq!(get(&text, &"length".into()), Some(HostValue::Int(5)));
        assert_eq!(get(&text, &"1".into()), Some(HostValue::from("é")));
        assert_eq!(get(&text, &"5".into()), None);
        assert!(has(&text, &"4".into()));
        assert!(!has(&text, &"5".into()));
        assert!(!set(&text, &"0".into(), HostValue::from("j")).unwrap());
        assert_eq!(keys(&HostValue::from("ab")), Some(vec!["0".to_string(), "1".to_string()]));
    }
}
