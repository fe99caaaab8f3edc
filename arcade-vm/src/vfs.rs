//! # Virtual File Set
//!
//! The in-memory source tree an agent submits with a compile request.
//! Keys are forward-slash logical paths without a leading `./`; the set is
//! built fresh for every compile and never touched by the filesystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical path -> source text.
///
/// Backed by a `BTreeMap` so iteration is sorted and compile output never
/// depends on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct VirtualFileSet {
    files: BTreeMap<String, String>,
}

impl VirtualFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a file set from any iterator of `(path, source)` pairs.
    pub fn from_map<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (path, source) in files {
            set.insert(path.as_ref(), source);
        }
        set
    }

    /// Insert a file, normalizing its path. Returns the previous source, if any.
    pub fn insert(&mut self, path: &str, source: impl Into<String>) -> Option<String> {
        self.files.insert(Self::normalize(path), source.into())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Sorted paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total source bytes across all files.
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(String::len).sum()
    }

    /// Normalize a key: backslashes become slashes, leading `./` and `/` are
    /// stripped, and empty segments collapse.
    pub fn normalize(path: &str) -> String {
        let path = path.replace('\\', "/");
        let mut rest = path.as_str();
        loop {
            if let Some(stripped) = rest.strip_prefix("./") {
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix('/') {
                rest = stripped;
            } else {
                break;
            }
        }
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl From<BTreeMap<String, String>> for VirtualFileSet {
    fn from(files: BTreeMap<String, String>) -> Self {
        Self::from_map(files)
    }
}

impl From<VirtualFileSet> for BTreeMap<String, String> {
    fn from(set: VirtualFileSet) -> Self {
        set.files
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for VirtualFileSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_map(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_normalizes_paths() {
        let mut files = VirtualFileSet::new();
        files.insert("./src/main.tsx", "a");
        files.insert("/lib//util.ts", "b");
        files.insert("ui\\board.tsx", "c");

        assert!(files.contains("src/main.tsx"));
        assert!(files.contains("lib/util.ts"));
        assert!(files.contains("ui/board.tsx"));
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_paths_are_sorted() {
        let files = VirtualFileSet::from_map([("z.ts", ""), ("a.ts", ""), ("m/x.ts", "")]);
        let paths: Vec<_> = files.paths().collect();
        assert_eq!(paths, vec!["a.ts", "m/x.ts", "z.ts"]);
    }

    #[test]
    fn test_serde_as_plain_map() {
        let files: VirtualFileSet =
            serde_json::from_value(serde_json::json!({ "./main.ts": "export {}" })).unwrap();
        assert_eq!(files.get("main.ts"), Some("export {}"));

        let back = serde_json::to_value(&files).unwrap();
        assert_eq!(back, serde_json::json!({ "main.ts": "export {}" }));
    }
}
