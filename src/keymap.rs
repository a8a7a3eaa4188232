//! Insertion-ordered field table.
//!
//! Every decoded object and every response under construction is a
//! [`KeyMap`]. Iteration (and therefore encoding) follows the order of the
//! `set*` calls.
use indexmap::IndexMap;

use crate::error::KindMismatch;
use crate::path::{self, ParentPath, Resolved};
use crate::value::{Scalar, Value};

#[derive(Clone, Debug, Default)]
pub struct KeyMap {
    entries: IndexMap<String, Value>,
}

/// Two maps are equal only when they hold the same entries in the same order.
impl PartialEq for KeyMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    // ---- Writers ----

    /// Append `key`. A key that is already present moves to the end with
    /// the new value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.entries.shift_remove(&key);
        self.entries.insert(key, value.into());
    }
    pub fn set_array<T: Into<Value>>(&mut self, key: impl Into<String>, values: Vec<T>) {
        self.set(key, Value::from(values));
    }
    pub fn set_object(&mut self, key: impl Into<String>, object: KeyMap) {
        self.set(key, Value::Object(object));
    }
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    // ---- Readers ----

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
    /// Typed read of a scalar. `Ok(None)` when the key is missing or absent.
    pub fn get<T: Scalar>(&self, key: &str) -> Result<Option<T>, KindMismatch> {
        match self.entries.get(key) {
            None | Some(Value::Absent) => {
                tracing::warn!(key, "key not found");
                Ok(None)
            }
            Some(value) => value.extract::<T>().map(Some).ok_or_else(|| KindMismatch {
                key: key.to_owned(),
                expected: T::KIND,
                found: value.kind(),
            }),
        }
    }
    /// Typed read of an array of scalars.
    pub fn get_array<T: Scalar>(&self, key: &str) -> Result<Option<Vec<T>>, KindMismatch> {
        match self.entries.get(key) {
            None | Some(Value::Absent) => {
                tracing::warn!(key, "key not found");
                Ok(None)
            }
            Some(value) => value.extract_array::<T>().map(Some).ok_or_else(|| KindMismatch {
                key: key.to_owned(),
                expected: T::KIND,
                found: value.kind(),
            }),
        }
    }
    pub fn get_object(&self, key: &str) -> Option<&KeyMap> {
        self.entries.get(key).and_then(Value::as_object)
    }
    /// Whether `key` exists below the slash-delimited `parent` path. Never
    /// fails: a malformed path or a kind mismatch along the way counts as
    /// "does not exist". A broadcast over an empty array has no element
    /// lacking the key, so it counts as present.
    pub fn is_exist_key(&self, key: &str, parent: &str) -> bool {
        let Ok(parent) = parent.parse::<ParentPath>() else {
            return false;
        };
        match path::resolve(self, &parent, key) {
            Ok(Resolved::Found(value)) => !value.is_absent(),
            Ok(Resolved::Broadcast(values)) => values.iter().all(|v| !v.is_absent()),
            Ok(Resolved::Missing) | Err(_) => false,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for KeyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = KeyMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_follows_set_order() {
        let mut map = KeyMap::new();
        map.set("zeta", 1);
        map.set("alpha", "a");
        map.set("mid", true);
        assert_eq!(map.keys().collect::<Vec<_>>(), ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn resetting_a_key_appends_it() {
        let mut map = KeyMap::new();
        map.set("a", 1);
        map.set("b", 2);
        map.set("a", 3);
        assert_eq!(map.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(map.get::<i32>("a"), Ok(Some(3)));
    }

    #[test]
    fn typed_reads_are_strict() {
        let mut map = KeyMap::new();
        map.set("n", 5i64);
        map.set_array("xs", vec!["a", "b"]);
        assert_eq!(map.get::<i64>("n"), Ok(Some(5)));
        assert!(map.get::<i32>("n").is_err());
        assert_eq!(map.get::<i32>("missing"), Ok(None));
        assert_eq!(
            map.get_array::<String>("xs"),
            Ok(Some(vec!["a".to_owned(), "b".to_owned()]))
        );
        assert!(map.get_array::<i32>("xs").is_err());
    }

    #[test]
    fn exist_key_walks_parent_path() {
        let inner: KeyMap = [("port", 1)].into_iter().collect();
        let mut data = KeyMap::new();
        data.set_object("meta", inner.clone());
        data.set("rows", vec![Value::Object(inner.clone()), Value::Object(inner)]);
        let mut root = KeyMap::new();
        root.set_object("data", data);

        assert!(root.is_exist_key("data", ""));
        assert!(root.is_exist_key("port", "data/meta"));
        assert!(root.is_exist_key("port", "data/rows[1]"));
        assert!(root.is_exist_key("port", "data/rows[]"));
        assert!(!root.is_exist_key("port", "data/rows[5]"));
        assert!(!root.is_exist_key("unit", "data/meta"));
        // kind mismatch on the way down is just "no"
        assert!(!root.is_exist_key("x", "data/meta/port"));
    }

    #[test]
    fn empty_broadcast_counts_as_present() {
        let mut root = KeyMap::new();
        root.set("rows", Vec::<Value>::new());
        assert!(root.is_exist_key("port", "rows[]"));
        assert!(!root.is_exist_key("port", "rows[0]"));
    }

    #[test]
    fn equality_includes_order() {
        let xy: KeyMap = [("x", 1), ("y", 2)].into_iter().collect();
        let yx: KeyMap = [("y", 2), ("x", 1)].into_iter().collect();
        assert_ne!(xy, yx);
        assert_eq!(xy, [("x", 1), ("y", 2)].into_iter().collect::<KeyMap>());
        // nested objects compare through Value, so order matters there too
        let mut a = KeyMap::new();
        a.set_object("o", xy);
        let mut b = KeyMap::new();
        b.set_object("o", yx);
        assert_ne!(a, b);
    }
}
