//! Reads and writes at key paths inside untyped documents.
//!
//! This is the permissive counterpart to the schema-backed entities: nothing is
//! validated, intermediate mappings are created on demand and the last write
//! always wins. Sequences are never created here. To address an element of a
//! sequence, the caller creates the sequence first and keys into it by index.
//!
//! ```
//! use nuclio_spec::path::{get_in, update_in};
//! use serde_json::json;
//!
//! let mut trigger = json!({"kind": "http"});
//! update_in(&mut trigger, "attributes.ingresses.0", json!({"host": "svc"})).unwrap();
//!
//! assert_eq!(trigger, json!({"kind": "http", "attributes": {"ingresses": {"0": {"host": "svc"}}}}));
//! assert_eq!(get_in(&trigger, "attributes.port", &json!(8080)).unwrap(), &json!(8080));
//! ```
use std::{fmt::Display, str::FromStr};

use serde_json::{Map, Value};
use snafu::{Snafu, ensure};
use tracing::warn;

/// Separates the keys of a dotted key path.
pub const KEY_SEPARATOR: char = '.';

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum KeyPathError {
    #[snafu(display("key path must contain at least one key"))]
    Empty,

    #[snafu(display("key path {path:?} contains an empty key at position {position}"))]
    EmptyKey { path: String, position: usize },
}

/// A non-empty sequence of keys leading from a document root to a value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new<I, S>(keys: I) -> Result<Self, KeyPathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect::<Vec<String>>();
        ensure!(!keys.is_empty(), EmptySnafu);

        if let Some(position) = keys.iter().position(String::is_empty) {
            return EmptyKeySnafu {
                path: keys.join("."),
                position,
            }
            .fail();
        }

        Ok(Self(keys))
    }

    /// A path of literal keys known to be valid.
    pub(crate) fn literal(keys: &[&'static str]) -> Self {
        Self(keys.iter().map(|key| (*key).to_owned()).collect())
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    fn split_last(&self) -> (&[String], &str) {
        match self.0.split_last() {
            Some((leaf, parents)) => (parents, leaf.as_str()),
            // Unreachable in practice, the constructor rejects empty paths
            None => (&[], ""),
        }
    }
}

impl FromStr for KeyPath {
    type Err = KeyPathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ensure!(!input.is_empty(), EmptySnafu);
        Self::new(input.split(KEY_SEPARATOR))
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Assigns `value` at `path`, creating empty mappings for missing keys.
///
/// Values in the way are replaced rather than rejected: a scalar that has to be
/// walked through becomes an empty mapping, and the leaf is overwritten
/// whatever it held before. Sequences are only ever indexed into. If a key is
/// not an index into a sequence on the way, the document is left untouched.
/// All of these cases are logged as warnings, keeping the document consistent
/// is the caller's responsibility.
pub fn set_path(root: &mut Value, path: &KeyPath, value: Value) {
    let (parents, leaf) = path.split_last();

    let mut current = root;
    for key in parents {
        match child_mut(current, key, path, || Value::Object(Map::new())) {
            Some(child) => current = child,
            None => return,
        }
    }

    let Some(slot) = child_mut(current, leaf, path, || Value::Null) else {
        return;
    };
    if replaces_structure(slot, &value) {
        warn!(
            %path,
            previous = value_kind(slot),
            new = value_kind(&value),
            "overwriting value of a different shape"
        );
    }
    *slot = value;
}

/// Reads the value at `path`, returning `default` as soon as a key is missing
/// or a value on the way cannot be walked through.
pub fn get_path<'a>(root: &'a Value, path: &KeyPath, default: &'a Value) -> &'a Value {
    let mut current = root;
    for key in path.keys() {
        let next = match current {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return default,
        }
    }
    current
}

/// [`set_path`] for a dotted key such as `attributes.ingresses.0`.
pub fn update_in(root: &mut Value, key: &str, value: Value) -> Result<(), KeyPathError> {
    let path = key.parse::<KeyPath>()?;
    set_path(root, &path, value);
    Ok(())
}

/// [`get_path`] for a dotted key such as `attributes.port`.
pub fn get_in<'a>(
    root: &'a Value,
    key: &str,
    default: &'a Value,
) -> Result<&'a Value, KeyPathError> {
    let path = key.parse::<KeyPath>()?;
    Ok(get_path(root, &path, default))
}

/// Returns the child at `key`, inserting `missing()` if there is none.
///
/// Returns `None` if `container` is a sequence that `key` is not an index into.
fn child_mut<'a>(
    container: &'a mut Value,
    key: &str,
    path: &KeyPath,
    missing: impl FnOnce() -> Value,
) -> Option<&'a mut Value> {
    let index = match &*container {
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .filter(|index| *index < items.len()),
        _ => None,
    };

    match (container, index) {
        (Value::Array(items), Some(index)) => items.get_mut(index),
        (Value::Array(items), None) => {
            warn!(
                %path,
                key,
                len = items.len(),
                "leaving sequence untouched as the key is not an index into it"
            );
            None
        }
        (container, _) => Some(
            object_mut(container, path)
                .entry(key)
                .or_insert_with(missing),
        ),
    }
}

/// Turns `value` into a mapping (if it isn't one already) and returns it.
fn object_mut<'a>(value: &'a mut Value, path: &KeyPath) -> &'a mut Map<String, Value> {
    if !value.is_object() {
        if !value.is_null() {
            warn!(
                %path,
                previous = value_kind(value),
                "replacing value that cannot be walked through with a mapping"
            );
        }
        *value = Value::Object(Map::new());
    }

    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was replaced by a mapping above"),
    }
}

fn replaces_structure(previous: &Value, new: &Value) -> bool {
    match (previous, new) {
        (Value::Null, _) => false,
        (Value::Object(_), new) => !new.is_object(),
        (_, new) => new.is_object(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
