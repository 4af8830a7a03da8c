//! Ordered multi-value maps for headers, query args and form fields.
//!
//! Each key holds a non-empty, insertion-ordered list of values. Single-value access
//! (`get`, `items`, `delete`) always addresses the *last* value of a key, while the
//! `*_all` family exposes the full list. Keys iterate in first-insertion order.
//!
//! The key normalization is a type parameter: [`MultiMap`] keeps keys as given,
//! [`HeaderMap`] lowercases them on every operation while values keep their case.
//!
//! # Example
//! ```
//! use micro_gateway::protocol::HeaderMap;
//!
//! let mut headers = HeaderMap::new();
//! headers.set("Content-Type", "text/plain".to_string());
//! headers.set("content-type", "application/json".to_string());
//!
//! assert_eq!(headers.get("CONTENT-TYPE").map(String::as_str), Some("application/json"));
//! assert_eq!(headers.get_all("content-type").len(), 2);
//! ```

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Maps a caller supplied key onto the key actually stored.
pub trait KeyNormalizer {
    fn normalize(key: &str) -> Cow<'_, str>;
}

/// Keys are stored exactly as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exact;

impl KeyNormalizer for Exact {
    #[inline]
    fn normalize(key: &str) -> Cow<'_, str> {
        Cow::Borrowed(key)
    }
}

/// Keys are lowercased, which makes lookups case-insensitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lowercase;

impl KeyNormalizer for Lowercase {
    #[inline]
    fn normalize(key: &str) -> Cow<'_, str> {
        if key.bytes().all(|b| b.is_ascii() && !b.is_ascii_uppercase()) {
            Cow::Borrowed(key)
        } else {
            Cow::Owned(key.to_lowercase())
        }
    }
}

/// A multimap with case-sensitive keys, used for query args and form fields.
pub type MultiMap<V> = OrderedMultiMap<V, Exact>;

/// A multimap with case-insensitive keys, used for headers.
pub type HeaderMap = OrderedMultiMap<String, Lowercase>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMultiMap<V, N = Exact> {
    keys: Vec<String>,
    values: HashMap<String, Vec<V>>,
    normalizer: PhantomData<N>,
}

impl<V, N> Default for OrderedMultiMap<V, N> {
    fn default() -> Self {
        Self { keys: Vec::new(), values: HashMap::new(), normalizer: PhantomData }
    }
}

impl<V, N: KeyNormalizer> OrderedMultiMap<V, N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from keys that already carry their full value lists.
    ///
    /// Empty lists are skipped so that every present key keeps at least one value.
    pub fn from_lists<K, I>(lists: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Vec<V>)>,
    {
        let mut map = Self::new();
        for (key, values) in lists {
            for value in values {
                map.set(key.as_ref(), value);
            }
        }
        map
    }

    /// Appends `value` to the list of `key`. Existing values are never overwritten.
    pub fn set(&mut self, key: impl AsRef<str>, value: V) {
        let key = N::normalize(key.as_ref());
        if let Some(values) = self.values.get_mut(key.as_ref()) {
            values.push(value);
            return;
        }

        let key = key.into_owned();
        self.keys.push(key.clone());
        self.values.insert(key, vec![value]);
    }

    /// Returns the most recently inserted value of `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.values.get(N::normalize(key).as_ref()).and_then(|values| values.last())
    }

    /// Returns the most recently inserted value of `key`, or `default` if the key is absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a V) -> &'a V {
        self.get(key).unwrap_or(default)
    }

    /// Returns every value of `key` in insertion order, or an empty slice.
    pub fn get_all(&self, key: &str) -> &[V] {
        self.values.get(N::normalize(key).as_ref()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Removes the most recently inserted value of `key`.
    ///
    /// The key itself disappears together with its last remaining value.
    pub fn delete(&mut self, key: &str) -> Option<V> {
        let key = N::normalize(key);
        let values = self.values.get_mut(key.as_ref())?;
        if values.len() > 1 {
            return values.pop();
        }

        self.remove_all(key.as_ref()).and_then(|mut values| values.pop())
    }

    /// Removes `key` together with all its values.
    pub fn remove_all(&mut self, key: &str) -> Option<Vec<V>> {
        let key = N::normalize(key);
        let values = self.values.remove(key.as_ref())?;
        self.keys.retain(|k| k != key.as_ref());
        Some(values)
    }

    /// Replaces the whole value list of `key`, keeping the key's position if it already exists.
    ///
    /// An empty `values` removes the key.
    pub fn replace_all(&mut self, key: impl AsRef<str>, values: Vec<V>) {
        let key = N::normalize(key.as_ref());
        if values.is_empty() {
            self.remove_all(key.as_ref());
            return;
        }

        match self.values.get_mut(key.as_ref()) {
            Some(existing) => *existing = values,
            None => {
                let key = key.into_owned();
                self.keys.push(key.clone());
                self.values.insert(key, values);
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(N::normalize(key).as_ref())
    }

    /// Number of distinct keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// The single-value view: every key once, paired with its last value.
    pub fn items(&self) -> impl Iterator<Item = (&str, &V)> {
        self.iter_all().filter_map(|(key, values)| values.last().map(|value| (key, value)))
    }

    /// The full view: every key once, paired with all its values.
    pub fn iter_all(&self) -> impl Iterator<Item = (&str, &[V])> {
        self.keys.iter().map(|key| (key.as_str(), self.values.get(key).map(Vec::as_slice).unwrap_or(&[])))
    }

    /// Deep-copies the map into one with a different key normalization.
    pub fn to_normalized<M: KeyNormalizer>(&self) -> OrderedMultiMap<V, M>
    where
        V: Clone,
    {
        OrderedMultiMap::from_lists(self.iter_all().map(|(key, values)| (key, values.to_vec())))
    }
}

impl<K: AsRef<str>, V, N: KeyNormalizer> FromIterator<(K, V)> for OrderedMultiMap<V, N> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: AsRef<str>, V, N: KeyNormalizer> Extend<(K, V)> for OrderedMultiMap<V, N> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<V, N: KeyNormalizer> From<HashMap<String, V>> for OrderedMultiMap<V, N> {
    fn from(map: HashMap<String, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: AsRef<str>, V, N: KeyNormalizer> From<Vec<(K, V)>> for OrderedMultiMap<V, N> {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

/// Serializes the single-value view, `{key: last value}`.
impl<V: Serialize, N: KeyNormalizer> Serialize for OrderedMultiMap<V, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.items() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_appends_and_get_returns_last() {
        let mut map = MultiMap::new();
        map.set("a", "b");
        map.set("foo", "bar");
        map.set("a", "2");

        assert_eq!(map.get("a"), Some(&"2"));
        assert_eq!(map.get_all("a"), &["b", "2"]);
        assert_eq!(map.get_all("foo"), &["bar"]);
        assert!(map.get_all("missing").is_empty());
        assert_eq!(map.get_or("missing", &"default"), &"default");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_get_all_counts_every_set() {
        let mut map = MultiMap::new();
        let sets = [("x", 1), ("y", 2), ("x", 3), ("x", 4), ("z", 5), ("y", 6)];
        for (key, value) in sets {
            map.set(key, value);
        }

        for key in ["x", "y", "z"] {
            let expected = sets.iter().filter(|(k, _)| *k == key).count();
            assert_eq!(map.get_all(key).len(), expected);
            let last = sets.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| v);
            assert_eq!(map.get(key), last);
        }
    }

    #[test]
    fn test_items_keep_first_insertion_order() {
        let map: MultiMap<i32> = vec![("b", 1), ("a", 2), ("b", 3), ("c", 4)].into();

        let items = map.items().collect::<Vec<_>>();
        assert_eq!(items, vec![("b", &3), ("a", &2), ("c", &4)]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_delete_down_to_zero_removes_key() {
        let mut map = MultiMap::new();
        map.set("a", 1);
        map.set("b", 2);
        map.set("a", 3);

        assert_eq!(map.delete("a"), Some(3));
        assert_eq!(map.get_all("a"), &[1]);
        assert!(map.contains_key("a"));

        assert_eq!(map.delete("a"), Some(1));
        assert!(!map.contains_key("a"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(map.delete("a"), None);

        map.set("a", 5);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_replace_all_keeps_position() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Length", "1".into());
        headers.set("Content-Type", "text/plain".into());

        headers.replace_all("content-length", vec!["42".into()]);
        headers.replace_all("set-cookie", vec!["a=1".into(), "b=2".into()]);

        assert_eq!(headers.keys().collect::<Vec<_>>(), vec!["content-length", "content-type", "set-cookie"]);
        assert_eq!(headers.get_all("content-length"), &["42".to_string()]);

        headers.replace_all("set-cookie", vec![]);
        assert!(!headers.contains_key("set-cookie"));
    }

    #[test]
    fn test_case_insensitive_keys() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "Text/HTML".to_string());

        assert_eq!(headers.get("content-type").map(String::as_str), Some("Text/HTML"));
        assert_eq!(headers.get("CONTENT-TYPE").map(String::as_str), Some("Text/HTML"));
        assert_eq!(headers.keys().collect::<Vec<_>>(), vec!["content-type"]);

        assert_eq!(headers.delete("Content-TYPE").as_deref(), Some("Text/HTML"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_construction() {
        let single: HashMap<String, i32> = HashMap::from([("a".to_string(), 1)]);
        let map = MultiMap::from(single);
        assert_eq!(map.get_all("a"), &[1]);

        let lists = MultiMap::from_lists(vec![("a", vec![1, 2]), ("empty", vec![]), ("b", vec![3])]);
        assert_eq!(lists.get_all("a"), &[1, 2]);
        assert!(!lists.contains_key("empty"));

        let mut copy = lists.clone();
        copy.set("a", 9);
        assert_eq!(lists.get_all("a"), &[1, 2]);
        assert_eq!(copy.get_all("a"), &[1, 2, 9]);

        let plain: MultiMap<String> = vec![("X-Token", "v".to_string())].into();
        let headers: HeaderMap = plain.to_normalized();
        assert_eq!(headers.get("x-token").map(String::as_str), Some("v"));
        assert_eq!(headers.keys().collect::<Vec<_>>(), vec!["x-token"]);
    }

    #[test]
    fn test_serialize_single_value_view() {
        let map: MultiMap<&str> = vec![("a", "b"), ("foo", "bar"), ("a", "2")].into();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({"a": "2", "foo": "bar"}));
    }
}
