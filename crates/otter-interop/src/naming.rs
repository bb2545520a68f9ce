//! Member name classification: accessor prefixes and exposed aliases.
//!
//! `getX()` and `isX()` read property `x`, `setX(v)` and `putX(v)` write
//! it. A bare `get(key)` / `set(key, value)` is an indexer. Capitalized
//! runs after the prefix are lower-cased at every split point, so
//! `getHTTPCode` is reachable as `hTTPCode`, `htTPCode`, `httPCode` and
//! `httpCode`.

use crate::registration::Callable;
use smallvec::SmallVec;

/// Prefixes of named getters
pub const GETTER_PREFIXES: [&str; 2] = ["get", "is"];

/// Prefixes of named setters
pub const SETTER_PREFIXES: [&str; 2] = ["set", "put"];

/// Exposed names of one member; nearly always one or two
pub type ExposedNames = SmallVec<[String; 2]>;

/// Prefix length when `name` is a named getter taking `param_count` parameters
pub fn getter_prefix_len(name: &str, param_count: usize) -> Option<usize> {
    if param_count != 0 {
        return None;
    }
    prefix_len(name, &GETTER_PREFIXES)
}

/// Prefix length when `name` is a named setter taking `param_count` parameters
pub fn setter_prefix_len(name: &str, param_count: usize) -> Option<usize> {
    if param_count != 1 {
        return None;
    }
    prefix_len(name, &SETTER_PREFIXES)
}

fn prefix_len(name: &str, prefixes: &[&str]) -> Option<usize> {
    prefixes
        .iter()
        .find(|prefix| name.starts_with(*prefix) && name.len() > prefix.len())
        .map(|prefix| prefix.len())
}

/// Indexer-style getter: marked, or a non-variadic `get(key)` / `is(key)`
pub fn is_generic_getter(callable: &Callable) -> bool {
    callable.markers().generic_getter
        || (GETTER_PREFIXES.contains(&callable.name())
            && callable.params().len() == 1
            && !callable.is_varargs())
}

/// Indexer-style setter: marked, or a non-variadic `set(key, value)` / `put(key, value)`
pub fn is_generic_setter(callable: &Callable) -> bool {
    callable.markers().generic_setter
        || (SETTER_PREFIXES.contains(&callable.name())
            && callable.params().len() == 2
            && !callable.is_varargs())
}

/// Length of the leading run of ASCII capitals
fn capital_run(text: &str) -> usize {
    text.bytes().take_while(u8::is_ascii_uppercase).count()
}

fn lower_first(text: &str, count: usize) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..count].to_ascii_lowercase());
    out.push_str(&text[count..]);
    out
}

/// Names a member is exposed under in an overload map.
///
/// An explicit alias wins. Otherwise the name after `start` is used: a
/// single leading capital is lower-cased, a longer capital run is
/// lower-cased at every split point `1..run`, and a remainder without a
/// leading capital is used as is.
pub fn exposed_names(name: &str, start: usize, alias: Option<&str>) -> ExposedNames {
    let mut names = ExposedNames::new();
    if let Some(alias) = alias.filter(|a| !a.is_empty()) {
        names.push(alias.to_string());
        return names;
    }
    let remainder = name.get(start..).unwrap_or_default();
    match capital_run(remainder) {
        0 => names.push(remainder.to_string()),
        1 => names.push(lower_first(remainder, 1)),
        run => {
            for split in 1..run {
                names.push(lower_first(remainder, split));
            }
        }
    }
    names
}

/// Key a named getter contributes to own-keys enumeration.
///
/// Only capitalized remainders qualify. A capital run keeps its last
/// letter, so `getURL` enumerates as `urL` and `getName` as `name`.
pub fn enumerated_key(name: &str, start: usize) -> Option<String> {
    let remainder = name.get(start..)?;
    match capital_run(remainder) {
        0 => None,
        1 => Some(lower_first(remainder, 1)),
        run => Some(lower_first(remainder, run - 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_prefixes() {
        assert_eq!(getter_prefix_len("getName", 0), Some(3));
        assert_eq!(getter_prefix_len("isEmpty", 0), Some(2));
        assert_eq!(getter_prefix_len("get", 0), None);
        assert_eq!(getter_prefix_len("getName", 1), None);
        assert_eq!(setter_prefix_len("setName", 1), Some(3));
        assert_eq!(setter_prefix_len("putAll", 1), Some(3));
        assert_eq!(setter_prefix_len("setName", 2), None);
        assert_eq!(setter_prefix_len("size", 1), None);
    }

    #[test]
    fn test_single_capital_is_lowered() {
        assert_eq!(exposed_names("getName", 3, None).as_slice(), ["name"]);
        assert_eq!(exposed_names("isX", 2, None).as_slice(), ["x"]);
    }

    #[test]
    fn test_capital_run_enumerates_every_split() {
        assert_eq!(
            exposed_names("getHTTPCode", 3, None).as_slice(),
            ["hTTPCode", "htTPCode", "httPCode", "httpCode"]
        );
    }

    #[test]
    fn test_plain_names_pass_through() {
        assert_eq!(exposed_names("getValue", 0, None).as_slice(), ["getValue"]);
        assert_eq!(exposed_names("gettysburg", 3, None).as_slice(), ["tysburg"]);
        assert_eq!(exposed_names("Compute", 0, None).as_slice(), ["compute"]);
    }

    #[test]
    fn test_alias_wins() {
        assert_eq!(exposed_names("getHTTPCode", 3, Some("status")).as_slice(), ["status"]);
        assert_eq!(exposed_names("getName", 3, Some("")).as_slice(), ["name"]);
    }

    #[test]
    fn test_enumerated_key() {
        assert_eq!(enumerated_key("getName", 3), Some("name".to_string()));
        assert_eq!(enumerated_key("getURL", 3), Some("urL".to_string()));
        assert_eq!(enumerated_key("gettysburg", 3), None);
    }
}
