//! Cross-resource reference graph.
//!
//! Maps a reference key such as `cm:default/app-config` to the set of data
//! keys consumers read from it. The reserved member `"all"` records that a
//! consumer pulls in the whole resource.

pub mod builder;
pub mod cache;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Reserved member meaning every key of a resource is used.
pub const ALL_KEYS: &str = "all";

/// Set of strings with deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StringSet(BTreeSet<String>);

impl StringSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: impl Into<String>) {
        self.0.insert(value.into());
    }

    pub fn has(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    /// True when the wildcard member is present.
    pub fn has_all(&self) -> bool {
        self.has(ALL_KEYS)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Members of `other` that are not in `self`.
    pub fn diff(&self, other: &StringSet) -> StringSet {
        other
            .0
            .iter()
            .filter(|k| !self.0.contains(*k))
            .cloned()
            .collect()
    }

    pub fn extend(&mut self, other: &StringSet) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Kinds of resources that can be referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    ConfigMap,
    Secret,
    ServiceAccount,
    Role,
    ClusterRole,
    Namespace,
}

impl RefKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ConfigMap => "cm",
            Self::Secret => "sec",
            Self::ServiceAccount => "sa",
            Self::Role => "role",
            Self::ClusterRole => "clusterrole",
            Self::Namespace => "ns",
        }
    }

    /// Reference key for a resource FQN, e.g. `sec:default/db`.
    pub fn key(&self, fqn: &str) -> String {
        format!("{}:{}", self.tag(), fqn)
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Referenced keys and contributors for every reference key.
#[derive(Debug, Clone, Default)]
pub struct References {
    keys: BTreeMap<String, StringSet>,
    contributors: BTreeMap<String, BTreeSet<String>>,
}

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register that `contributor` uses `sub_keys` of the resource behind
    /// `key`. No sub-keys means the whole resource is used.
    pub fn add(&mut self, key: impl Into<String>, contributor: &str, sub_keys: &[&str]) {
        let key = key.into();
        let set = self.keys.entry(key.clone()).or_default();
        if sub_keys.is_empty() {
            set.add(ALL_KEYS);
        } else {
            for sub in sub_keys {
                set.add(*sub);
            }
        }
        self.contributors
            .entry(key)
            .or_default()
            .insert(contributor.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&StringSet> {
        self.keys.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Resources that registered a reference to `key`.
    pub fn contributors(&self, key: &str) -> impl Iterator<Item = &str> {
        self.contributors
            .get(key)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// How a resource is used across one or more reference families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Usage {
    /// Nothing references the resource.
    Unreferenced,
    /// Some consumer uses every key.
    All,
    /// Union of the keys consumers read.
    Keys(StringSet),
}

/// Look up `key` across reference families.
pub fn usage(key: &str, families: &[&References]) -> Usage {
    let mut found = false;
    let mut keys = StringSet::new();
    for refs in families {
        if let Some(set) = refs.get(key) {
            if set.has_all() {
                return Usage::All;
            }
            found = true;
            keys.extend(set);
        }
    }
    if found { Usage::Keys(keys) } else { Usage::Unreferenced }
}

/// Declared keys no consumer reads; empty when the resource is fully used
/// or not referenced at all.
pub fn orphaned_keys(declared: &StringSet, usage: &Usage) -> StringSet {
    match usage {
        Usage::Keys(used) => used.diff(declared),
        Usage::All | Usage::Unreferenced => StringSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> StringSet {
        items.iter().copied().collect()
    }

    #[test]
    fn test_diff() {
        let a = set(&["a", "b"]);
        let b = set(&["b", "c"]);
        assert_eq!(a.diff(&b), set(&["c"]));
        assert_eq!(b.diff(&a), set(&["a"]));
        assert!(a.diff(&a).is_empty());
    }

    #[test]
    fn test_add_idempotent() {
        let mut s = StringSet::new();
        s.add("k");
        s.add("k");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_add_without_keys_is_wildcard() {
        let mut refs = References::new();
        refs.add(RefKind::ConfigMap.key("default/cm"), "default/p1", &[]);
        assert!(refs.get("cm:default/cm").unwrap().has_all());
        assert_eq!(refs.contributors("cm:default/cm").collect::<Vec<_>>(), vec!["default/p1"]);
    }

    #[test]
    fn test_usage_across_families() {
        let mut pods = References::new();
        pods.add("sec:default/s", "default/p1", &["user"]);
        let mut rbac = References::new();
        rbac.add("sec:default/s", "default/sa", &["pass"]);

        assert_eq!(usage("sec:default/s", &[&pods, &rbac]), Usage::Keys(set(&["pass", "user"])));
        assert_eq!(usage("sec:default/x", &[&pods, &rbac]), Usage::Unreferenced);

        rbac.add("sec:default/s", "default/sa2", &[]);
        assert_eq!(usage("sec:default/s", &[&pods, &rbac]), Usage::All);
    }

    #[test]
    fn test_orphaned_keys() {
        let declared = set(&["k1", "k2"]);
        assert_eq!(orphaned_keys(&declared, &Usage::Keys(set(&["k1"]))), set(&["k2"]));
        assert!(orphaned_keys(&declared, &Usage::All).is_empty());
        assert!(orphaned_keys(&declared, &Usage::Unreferenced).is_empty());
    }

    #[test]
    fn test_ref_keys() {
        assert_eq!(RefKind::Secret.key("default/db"), "sec:default/db");
        assert_eq!(RefKind::ClusterRole.key("view"), "clusterrole:view");
        assert_eq!(RefKind::Namespace.to_string(), "ns");
    }
}
