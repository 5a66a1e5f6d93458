//! Configuration for audit runs.
//!
//! Provides:
//! - Severity overrides per code
//! - CPU/memory allocation thresholds
//! - Per-section exclusion rules
//! - The namespaces the namespace checker never flags as unused
//! - The lint level used when rendering reports

use crate::analyzer::issues::Severity;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespaces that are expected to be empty and are never reported as unused.
pub const DEFAULT_SKIP_NAMESPACES: &[&str] = &["default", "kube-public", "kube-node-lease"];

/// Pod restart count at which a pod gets flagged.
pub const DEFAULT_POD_RESTARTS: u32 = 3;

/// Root of a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Settings for a single audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    /// Prefix of rendered codes, e.g. `POP` in `[POP-100]`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Minimum severity shown in reports.
    #[serde(default)]
    pub level: Severity,

    /// Namespaces never reported as unused.
    #[serde(default = "default_skip_namespaces")]
    pub skip_namespaces: Vec<String>,

    #[serde(default)]
    pub allocations: Allocations,

    #[serde(default)]
    pub pod: PodLimits,

    /// Exclusion rules keyed by section name (`configmap`, `secret`, ...).
    #[serde(default)]
    pub excludes: BTreeMap<String, Vec<ExcludeRule>>,

    /// Severity overrides keyed by code id.
    #[serde(default, deserialize_with = "deserialize_code_overrides")]
    pub codes: BTreeMap<u16, CodeOverride>,

    /// Glob patterns for manifest paths to skip.
    #[serde(default)]
    pub ignore_paths: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            level: Severity::Ok,
            skip_namespaces: default_skip_namespaces(),
            allocations: Allocations::default(),
            pod: PodLimits::default(),
            excludes: BTreeMap::new(),
            codes: BTreeMap::new(),
            ignore_paths: Vec::new(),
        }
    }
}

impl AuditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the report lint level.
    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    /// Replace the skip-namespace list.
    pub fn with_skip_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allocations(mut self, allocations: Allocations) -> Self {
        self.allocations = allocations;
        self
    }

    /// Add an exclusion rule to a section.
    pub fn exclude(mut self, section: impl Into<String>, rule: ExcludeRule) -> Self {
        self.excludes.entry(section.into()).or_default().push(rule);
        self
    }

    /// Override the severity level (1..=3) of a code.
    pub fn override_code(mut self, id: u16, severity: u8) -> Self {
        self.codes.insert(id, CodeOverride { severity });
        self
    }

    /// Add a glob pattern for manifest paths to skip.
    pub fn ignore_path(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_paths.push(pattern.into());
        self
    }

    /// Check whether a manifest path matches one of the ignore patterns.
    pub fn should_ignore_path(&self, path: &std::path::Path) -> bool {
        let path_str = path.to_string_lossy();
        self.ignore_paths.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(&path_str))
                .unwrap_or(false)
        })
    }
}

fn default_prefix() -> String {
    crate::analyzer::catalog::DEFAULT_PREFIX.to_string()
}

fn default_skip_namespaces() -> Vec<String> {
    DEFAULT_SKIP_NAMESPACES.iter().map(|s| s.to_string()).collect()
}

/// Utilization thresholds for CPU and memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocations {
    #[serde(default)]
    pub cpu: Thresholds,
    #[serde(default)]
    pub memory: Thresholds,
}

/// Percentages of current usage against requests.
///
/// A ratio above `under_percent` means the workload uses more than it asked
/// for (under allocated); a positive ratio below `over_percent` means it asked
/// for much more than it uses (over allocated).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    #[serde(default = "default_under_percent")]
    pub under_percent: u32,
    #[serde(default = "default_over_percent")]
    pub over_percent: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            under_percent: default_under_percent(),
            over_percent: default_over_percent(),
        }
    }
}

fn default_under_percent() -> u32 {
    200
}

fn default_over_percent() -> u32 {
    50
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodLimits {
    #[serde(default = "default_restarts")]
    pub restarts: u32,
}

impl Default for PodLimits {
    fn default() -> Self {
        Self {
            restarts: DEFAULT_POD_RESTARTS,
        }
    }
}

fn default_restarts() -> u32 {
    DEFAULT_POD_RESTARTS
}

/// Exclusion rule for one section.
///
/// `name` matches a resource FQN exactly, or as a regular expression when it
/// starts with `rx:`. Without codes the whole resource is excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeRule {
    pub name: String,
    #[serde(default)]
    pub codes: Vec<u16>,
}

impl ExcludeRule {
    pub fn resource(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codes: Vec::new(),
        }
    }

    pub fn codes(name: impl Into<String>, codes: &[u16]) -> Self {
        Self {
            name: name.into(),
            codes: codes.to_vec(),
        }
    }
}

/// Severity override for a single code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOverride {
    pub severity: u8,
}

/// Code ids arrive as integers from YAML and as strings from TOML keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CodeId(u16);

impl<'de> Deserialize<'de> for CodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CodeIdVisitor;

        impl Visitor<'_> for CodeIdVisitor {
            type Value = CodeId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a numeric code id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<CodeId, E> {
                u16::try_from(v)
                    .map(CodeId)
                    .map_err(|_| E::custom(format!("code id {} out of range", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<CodeId, E> {
                u16::try_from(v)
                    .map(CodeId)
                    .map_err(|_| E::custom(format!("code id {} out of range", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<CodeId, E> {
                v.trim()
                    .parse::<u16>()
                    .map(CodeId)
                    .map_err(|_| E::custom(format!("invalid code id '{}'", v)))
            }
        }

        deserializer.deserialize_any(CodeIdVisitor)
    }
}

fn deserialize_code_overrides<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<u16, CodeOverride>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<CodeId, CodeOverride> = BTreeMap::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(id, over)| (id.0, over)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_config() {
        let config = AuditConfig::default();
        assert_eq!(config.prefix, "POP");
        assert_eq!(config.level, Severity::Ok);
        assert_eq!(config.skip_namespaces, vec!["default", "kube-public", "kube-node-lease"]);
        assert_eq!(config.allocations.cpu.under_percent, 200);
        assert_eq!(config.allocations.memory.over_percent, 50);
        assert_eq!(config.pod.restarts, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = AuditConfig::new()
            .with_level(Severity::Warn)
            .with_skip_namespaces(["infra"])
            .exclude("secret", ExcludeRule::resource("default/tls"))
            .override_code(100, 1)
            .ignore_path("**/charts/**");

        assert_eq!(config.level, Severity::Warn);
        assert_eq!(config.skip_namespaces, vec!["infra"]);
        assert_eq!(config.excludes["secret"].len(), 1);
        assert_eq!(config.codes[&100].severity, 1);
        assert!(config.should_ignore_path(Path::new("deploy/charts/app/x.yaml")));
        assert!(!config.should_ignore_path(Path::new("deploy/app.yaml")));
    }

    #[test]
    fn test_partial_thresholds_fill_defaults() {
        let yaml = "audit:\n  allocations:\n    cpu:\n      underPercent: 150\n";
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.audit.allocations.cpu.under_percent, 150);
        assert_eq!(file.audit.allocations.cpu.over_percent, 50);
        assert_eq!(file.audit.allocations.memory, Thresholds::default());
    }

    #[test]
    fn test_code_keys_from_yaml_and_toml() {
        let yaml = "audit:\n  codes:\n    100:\n      severity: 1\n";
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.audit.codes[&100].severity, 1);

        let toml_src = "[audit.codes.\"300\"]\nseverity = 3\n";
        let file: ConfigFile = toml::from_str(toml_src).unwrap();
        assert_eq!(file.audit.codes[&300].severity, 3);
    }
}
