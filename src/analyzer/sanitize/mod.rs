//! Sanitizers: one checker per section.
//!
//! A sanitizer walks one resource family of a [`ClusterSource`], records
//! issues in its own [`Collector`] and hands back the resulting outcome.
//! Each checker only depends on the capabilities it names.
//!
//! [`ClusterSource`]: capabilities::ClusterSource

pub mod capabilities;
pub mod configmap;
pub mod container;
pub mod hpa;
pub mod namespace;
pub mod pod;
pub mod rbac;
pub mod secret;
pub mod serviceaccount;
pub mod workload;

use crate::analyzer::catalog::codes;
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::{orphaned_keys, usage, References, StringSet, Usage};
use crate::error::{AuditError, ListError, Result};
use std::fmt;

pub use configmap::ConfigMapSanitizer;
pub use hpa::HpaSanitizer;
pub use namespace::NamespaceSanitizer;
pub use pod::PodSanitizer;
pub use rbac::{ClusterRoleBindingSanitizer, ClusterRoleSanitizer, RoleBindingSanitizer, RoleSanitizer};
pub use secret::SecretSanitizer;
pub use serviceaccount::ServiceAccountSanitizer;
pub use workload::{DeploymentSanitizer, StatefulSetSanitizer};

/// Audit sections, in the order a scan runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    ConfigMap,
    Secret,
    ServiceAccount,
    Role,
    ClusterRole,
    RoleBinding,
    ClusterRoleBinding,
    Namespace,
    Pod,
    Deployment,
    StatefulSet,
    HorizontalPodAutoscaler,
}

impl Section {
    pub const ALL: [Section; 12] = [
        Self::ConfigMap,
        Self::Secret,
        Self::ServiceAccount,
        Self::Role,
        Self::ClusterRole,
        Self::RoleBinding,
        Self::ClusterRoleBinding,
        Self::Namespace,
        Self::Pod,
        Self::Deployment,
        Self::StatefulSet,
        Self::HorizontalPodAutoscaler,
    ];

    /// Section name used in reports and exclusion rules.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfigMap => "configmap",
            Self::Secret => "secret",
            Self::ServiceAccount => "serviceaccount",
            Self::Role => "role",
            Self::ClusterRole => "clusterrole",
            Self::RoleBinding => "rolebinding",
            Self::ClusterRoleBinding => "clusterrolebinding",
            Self::Namespace => "namespace",
            Self::Pod => "pod",
            Self::Deployment => "deployment",
            Self::StatefulSet => "statefulset",
            Self::HorizontalPodAutoscaler => "horizontalpodautoscaler",
        }
    }

    /// Parse a section name or its kubectl short name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "configmap" | "configmaps" | "cm" => Some(Self::ConfigMap),
            "secret" | "secrets" | "sec" => Some(Self::Secret),
            "serviceaccount" | "serviceaccounts" | "sa" => Some(Self::ServiceAccount),
            "role" | "roles" | "ro" => Some(Self::Role),
            "clusterrole" | "clusterroles" | "cr" => Some(Self::ClusterRole),
            "rolebinding" | "rolebindings" | "rb" => Some(Self::RoleBinding),
            "clusterrolebinding" | "clusterrolebindings" | "crb" => Some(Self::ClusterRoleBinding),
            "namespace" | "namespaces" | "ns" => Some(Self::Namespace),
            "pod" | "pods" | "po" => Some(Self::Pod),
            "deployment" | "deployments" | "deploy" | "dp" => Some(Self::Deployment),
            "statefulset" | "statefulsets" | "sts" => Some(Self::StatefulSet),
            "horizontalpodautoscaler" | "horizontalpodautoscalers" | "hpa" => {
                Some(Self::HorizontalPodAutoscaler)
            }
            _ => None,
        }
    }

    /// Parse a comma separated list; an empty list selects every section.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        let mut sections = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let section = Self::parse(name)
                .ok_or_else(|| AuditError::InvalidArgument(format!("unknown section '{}'", name)))?;
            if !sections.contains(&section) {
                sections.push(section);
            }
        }
        if sections.is_empty() {
            sections = Self::ALL.to_vec();
        }
        sections.sort();
        Ok(sections)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A checker for one section.
pub trait Sanitizer {
    /// Walk the section's resources and record their issues. Running it
    /// again resets and recomputes every visited resource.
    fn sanitize(&mut self) -> Result<()>;

    fn collector(&self) -> &Collector;

    fn into_outcome(self: Box<Self>) -> Outcome;
}

/// Unwrap a listing or reference family, recording its failure against the
/// plural kind name.
pub(crate) fn listed<T>(
    collector: &mut Collector,
    listing: std::result::Result<T, ListError>,
) -> Option<T> {
    match listing {
        Ok(items) => Some(items),
        Err(err) => {
            collector.add_err(err.kind, &err);
            None
        }
    }
}

/// Record 400 when nothing references `key`, else 401 for every declared
/// key no consumer reads.
pub(crate) fn check_usage(
    collector: &mut Collector,
    id: &str,
    key: &str,
    declared: &StringSet,
    families: &[&References],
) -> Result<()> {
    let usage = usage(key, families);
    if usage == Usage::Unreferenced {
        return collector.add_code(id, codes::UNUSED, &[]);
    }
    if log::log_enabled!(log::Level::Trace) {
        let users: Vec<&str> = families.iter().flat_map(|refs| refs.contributors(key)).collect();
        log::trace!("{} used by {}", key, users.join(", "));
    }
    for orphan in orphaned_keys(declared, &usage).iter() {
        collector.add_code(id, codes::UNUSED_KEY, &[&orphan])?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_parse() {
        assert_eq!(Section::parse("cm"), Some(Section::ConfigMap));
        assert_eq!(Section::parse("Deployments"), Some(Section::Deployment));
        assert_eq!(Section::parse("hpa"), Some(Section::HorizontalPodAutoscaler));
        assert_eq!(Section::parse("ingress"), None);
        for section in Section::ALL {
            assert_eq!(Section::parse(section.name()), Some(section));
        }
    }

    #[test]
    fn test_section_parse_list() {
        assert_eq!(
            Section::parse_list("pod, cm,pod").unwrap(),
            vec![Section::ConfigMap, Section::Pod]
        );
        assert_eq!(Section::parse_list("").unwrap().len(), Section::ALL.len());
        assert!(Section::parse_list("pod,bogus").is_err());
    }

    #[test]
    fn test_listed_records_family_failure_under_kind() {
        let mut collector = testing::collector("configmap");
        let failed: std::result::Result<&References, ListError> = Err(ListError {
            kind: "pods",
            message: "forbidden".to_string(),
        });
        assert!(listed(&mut collector, failed).is_none());

        let outcome = collector.into_outcome();
        assert_eq!(
            testing::messages(&outcome, "pods"),
            vec!["failed to list pods: forbidden"]
        );
    }

    #[test]
    fn test_check_usage_with_partial_keys() {
        let mut refs = References::new();
        refs.add("cm:shop/cfg", "shop/web", &["a"]);
        let mut collector = testing::collector("configmap");
        let declared: StringSet = ["a", "b"].into_iter().collect();

        check_usage(&mut collector, "shop/cfg", "cm:shop/cfg", &declared, &[&refs]).unwrap();
        check_usage(&mut collector, "shop/gone", "cm:shop/gone", &declared, &[&refs]).unwrap();

        let outcome = collector.into_outcome();
        assert!(testing::has_code(&outcome, "shop/cfg", codes::UNUSED_KEY));
        assert!(testing::has_code(&outcome, "shop/gone", codes::UNUSED));
    }
}
