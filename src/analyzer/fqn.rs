//! Fully qualified resource names: `<namespace>/<name>` for namespaced
//! resources, `<name>` for cluster-scoped ones.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Namespace assumed for namespaced objects that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

pub fn fqn(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", namespace, name)
    }
}

/// Split an FQN into `(namespace, name)`; the namespace is empty for
/// cluster-scoped names.
pub fn split_fqn(fqn: &str) -> (&str, &str) {
    fqn.split_once('/').unwrap_or(("", fqn))
}

pub fn namespace_of(fqn: &str) -> &str {
    split_fqn(fqn).0
}

/// FQN of an object from its metadata.
pub fn meta_fqn(meta: &ObjectMeta, namespaced: bool) -> String {
    let name = meta.name.as_deref().unwrap_or_default();
    if namespaced {
        let ns = meta
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE);
        fqn(ns, name)
    } else {
        name.to_string()
    }
}

/// Name of a referenced object regardless of whether the API models it as a
/// required or an optional field; empty names count as absent.
pub trait RefName {
    fn ref_name(&self) -> Option<&str>;
}

impl RefName for String {
    fn ref_name(&self) -> Option<&str> {
        (!self.is_empty()).then_some(self.as_str())
    }
}

impl RefName for Option<String> {
    fn ref_name(&self) -> Option<&str> {
        self.as_deref().filter(|s| !s.is_empty())
    }
}
