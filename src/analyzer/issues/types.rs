//! Core types for audit findings.
//!
//! - `Severity` - Ordered finding levels (`Ok < Info < Warn < Error`)
//! - `Issue` - A single finding recorded against a resource
//! - `Issues` - The ordered findings of one resource
//! - `Outcome` - Findings for every resource a checker visited

use serde::{Deserialize, Serialize};
use std::collections::{hash_map, BTreeMap, HashMap};
use std::fmt;

/// Group name used for issues that belong to the resource itself rather than
/// to one of its sub-components (e.g. a container).
pub const ROOT_GROUP: &str = "__root__";

/// Severity levels for findings.
///
/// Ordered from least to most severe: `Ok < Info < Warn < Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing to report
    #[default]
    Ok,
    /// Informational hint
    Info,
    /// Should be addressed
    Warn,
    /// Must be fixed
    Error,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 4] = [Self::Ok, Self::Info, Self::Warn, Self::Error];

    /// Parse a severity from a name or a numeric level (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ok" | "0" => Some(Self::Ok),
            "info" | "1" => Some(Self::Info),
            "warn" | "warning" | "2" => Some(Self::Warn),
            "error" | "3" => Some(Self::Error),
            _ => None,
        }
    }

    /// Map a numeric level (0..=3) to a severity.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Ok),
            1 => Some(Self::Info),
            2 => Some(Self::Warn),
            3 => Some(Self::Error),
            _ => None,
        }
    }

    /// Numeric level of this severity.
    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// `ROOT_GROUP` or the name of a sub-component.
    pub group: String,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn new(group: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            severity,
            message: message.into(),
        }
    }

    /// An issue attached to the resource itself.
    pub fn root(severity: Severity, message: impl Into<String>) -> Self {
        Self::new(ROOT_GROUP, severity, message)
    }

    pub fn is_root(&self) -> bool {
        self.group == ROOT_GROUP
    }
}

/// Ordered issues recorded for a single resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Issues(Vec<Issue>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.0.push(issue);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.0.iter()
    }

    /// Highest severity across the issues, `Ok` when empty.
    pub fn max_severity(&self) -> Severity {
        self.0
            .iter()
            .map(|i| i.severity)
            .max()
            .unwrap_or(Severity::Ok)
    }

    /// The first issue carrying the highest severity, if any.
    #[cfg(test)]
    pub fn worst(&self) -> Option<&Issue> {
        let max = self.max_severity();
        self.0.iter().find(|i| i.severity == max)
    }

    /// Partition issues by group, preserving insertion order inside each group.
    pub fn group(&self) -> BTreeMap<String, Issues> {
        let mut groups: BTreeMap<String, Issues> = BTreeMap::new();
        for issue in &self.0 {
            groups
                .entry(issue.group.clone())
                .or_default()
                .push(issue.clone());
        }
        groups
    }

    /// Two-level severity filter.
    ///
    /// Groups are visited in lexical order. A group whose peak severity is
    /// below `floor` is dropped entirely; otherwise only its issues at or
    /// above `floor` are kept.
    pub fn sort(&self, floor: Severity) -> Issues {
        let mut sorted = Issues::new();
        for (_, group) in self.group() {
            if group.max_severity() < floor {
                continue;
            }
            for issue in group.0 {
                if issue.severity >= floor {
                    sorted.push(issue);
                }
            }
        }
        sorted
    }

    /// Keep only issues at or above `level`.
    pub fn retain_at_least(&mut self, level: Severity) {
        self.0.retain(|i| i.severity >= level);
    }
}

impl From<Vec<Issue>> for Issues {
    fn from(issues: Vec<Issue>) -> Self {
        Self(issues)
    }
}

impl<'a> IntoIterator for &'a Issues {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Findings keyed by resource id (FQN).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(HashMap<String, Issues>);

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Issues> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Create or reset the issue list of a resource.
    pub fn reset(&mut self, id: &str) {
        self.0.insert(id.to_string(), Issues::new());
    }

    pub fn remove(&mut self, id: &str) -> Option<Issues> {
        self.0.remove(id)
    }

    pub fn push(&mut self, id: &str, issue: Issue) {
        self.0.entry(id.to_string()).or_default().push(issue);
    }

    /// Highest severity recorded for a resource, `Ok` when absent or clean.
    pub fn max_severity(&self, id: &str) -> Severity {
        self.0
            .get(id)
            .map(Issues::max_severity)
            .unwrap_or(Severity::Ok)
    }

    /// Drop, per resource, every issue below `level`. Resources stay listed.
    pub fn filter(&mut self, level: Severity) {
        for issues in self.0.values_mut() {
            issues.retain_at_least(level);
        }
    }

    /// Resource ids in lexical order.
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.0.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Issues)> {
        self.0.iter()
    }
}

impl IntoIterator for Outcome {
    type Item = (String, Issues);
    type IntoIter = hash_map::IntoIter<String, Issues>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues(specs: &[(&str, Severity)]) -> Issues {
        specs
            .iter()
            .enumerate()
            .map(|(i, (group, severity))| Issue::new(*group, *severity, format!("m{}", i)))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warn));
        assert_eq!(Severity::parse("3"), Some(Severity::Error));
        assert_eq!(Severity::parse("fatal"), None);
        assert_eq!(Severity::from_level(1), Some(Severity::Info));
        assert_eq!(Severity::from_level(4), None);
        assert_eq!(Severity::Warn.level(), 2);
    }

    #[test]
    fn test_max_severity_empty_is_ok() {
        assert_eq!(Issues::new().max_severity(), Severity::Ok);
        assert!(Issues::new().worst().is_none());
    }

    #[test]
    fn test_max_severity() {
        let list = issues(&[(ROOT_GROUP, Severity::Info), ("c1", Severity::Error)]);
        assert_eq!(list.max_severity(), Severity::Error);
        assert_eq!(list.worst().map(|i| i.group.as_str()), Some("c1"));
    }

    #[test]
    fn test_group_partitions() {
        let list = issues(&[
            ("c1", Severity::Info),
            (ROOT_GROUP, Severity::Warn),
            ("c1", Severity::Error),
        ]);
        let groups = list.group();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["c1"].len(), 2);
        assert_eq!(groups[ROOT_GROUP].len(), 1);
    }

    #[test]
    fn test_sort_drops_low_groups() {
        let list = issues(&[
            ("a", Severity::Info),
            ("b", Severity::Info),
            ("b", Severity::Error),
        ]);
        let sorted = list.sort(Severity::Warn);
        assert_eq!(sorted.len(), 1);
        let only = sorted.iter().next().unwrap();
        assert_eq!(only.group, "b");
        assert_eq!(only.severity, Severity::Error);
    }

    #[test]
    fn test_sort_lexical_group_order() {
        let list = issues(&[("z", Severity::Warn), ("a", Severity::Warn)]);
        let sorted = list.sort(Severity::Ok);
        let groups: Vec<&str> = sorted.iter().map(|i| i.group.as_str()).collect();
        assert_eq!(groups, vec!["a", "z"]);
    }

    #[test]
    fn test_outcome_filter_keeps_resources() {
        let mut outcome = Outcome::new();
        outcome.push("default/a", Issue::root(Severity::Info, "hint"));
        outcome.push("default/a", Issue::root(Severity::Error, "bad"));
        outcome.reset("default/b");
        outcome.filter(Severity::Warn);
        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.get("default/a").map(Issues::len), Some(1));
        assert_eq!(outcome.max_severity("default/a"), Severity::Error);
        assert_eq!(outcome.max_severity("default/b"), Severity::Ok);
        assert_eq!(outcome.max_severity("missing"), Severity::Ok);
    }

    #[test]
    fn test_sorted_ids() {
        let mut outcome = Outcome::new();
        outcome.reset("b/x");
        outcome.reset("a/y");
        assert_eq!(outcome.sorted_ids(), vec!["a/y", "b/x"]);
    }
}
