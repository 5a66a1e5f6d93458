//! Builders for the reference families.
//!
//! The pod family is walked from pod specs (live pods and workload pod
//! templates). The RBAC family is walked from bindings and service accounts.

use super::{RefKind, References};
use crate::analyzer::fqn::{fqn, namespace_of, RefName, DEFAULT_NAMESPACE};
use k8s_openapi::api::core::v1::{Container, KeyToPath, PodSpec, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, RoleRef, Subject};

/// A pod spec together with the resource that owns it.
#[derive(Debug, Clone, Copy)]
pub struct PodSpecRef<'a> {
    /// FQN of the pod or workload, recorded as contributor.
    pub owner: &'a str,
    pub namespace: &'a str,
    pub spec: &'a PodSpec,
}

/// Build the pod family from every pod spec.
pub fn pod_references<'a>(specs: impl IntoIterator<Item = PodSpecRef<'a>>) -> References {
    let mut refs = References::new();
    for spec in specs {
        add_pod_spec(&mut refs, spec);
    }
    refs
}

/// Service account a pod spec runs as.
pub fn service_account_name(spec: &PodSpec) -> &str {
    spec.service_account_name
        .ref_name()
        .or_else(|| spec.service_account.ref_name())
        .unwrap_or("default")
}

fn add_pod_spec(refs: &mut References, pod: PodSpecRef<'_>) {
    let PodSpecRef {
        owner,
        namespace,
        spec,
    } = pod;

    refs.add(RefKind::Namespace.key(namespace), owner, &[]);
    refs.add(
        RefKind::ServiceAccount.key(&fqn(namespace, service_account_name(spec))),
        owner,
        &[],
    );

    for container in spec.init_containers.iter().flatten().chain(&spec.containers) {
        add_container(refs, owner, namespace, container);
    }

    for volume in spec.volumes.iter().flatten() {
        if let Some(cm) = &volume.config_map
            && let Some(name) = cm.name.ref_name()
        {
            let keys = item_keys(cm.items.as_deref());
            refs.add(RefKind::ConfigMap.key(&fqn(namespace, name)), owner, &keys);
        }
        if let Some(secret) = &volume.secret
            && let Some(name) = secret.secret_name.ref_name()
        {
            let keys = item_keys(secret.items.as_deref());
            refs.add(RefKind::Secret.key(&fqn(namespace, name)), owner, &keys);
        }
        let sources = volume
            .projected
            .as_ref()
            .and_then(|p| p.sources.as_deref())
            .unwrap_or_default();
        for source in sources {
            if let Some(cm) = &source.config_map
                && let Some(name) = cm.name.ref_name()
            {
                let keys = item_keys(cm.items.as_deref());
                refs.add(RefKind::ConfigMap.key(&fqn(namespace, name)), owner, &keys);
            }
            if let Some(secret) = &source.secret
                && let Some(name) = secret.name.ref_name()
            {
                let keys = item_keys(secret.items.as_deref());
                refs.add(RefKind::Secret.key(&fqn(namespace, name)), owner, &keys);
            }
        }
    }

    for pull in spec.image_pull_secrets.iter().flatten() {
        if let Some(name) = pull.name.ref_name() {
            refs.add(RefKind::Secret.key(&fqn(namespace, name)), owner, &[]);
        }
    }
}

fn add_container(refs: &mut References, owner: &str, namespace: &str, container: &Container) {
    for env in container.env.iter().flatten() {
        let Some(source) = &env.value_from else {
            continue;
        };
        if let Some(sel) = &source.config_map_key_ref
            && let Some(name) = sel.name.ref_name()
        {
            refs.add(
                RefKind::ConfigMap.key(&fqn(namespace, name)),
                owner,
                &[sel.key.as_str()],
            );
        }
        if let Some(sel) = &source.secret_key_ref
            && let Some(name) = sel.name.ref_name()
        {
            refs.add(
                RefKind::Secret.key(&fqn(namespace, name)),
                owner,
                &[sel.key.as_str()],
            );
        }
    }

    for from in container.env_from.iter().flatten() {
        if let Some(cm) = &from.config_map_ref
            && let Some(name) = cm.name.ref_name()
        {
            refs.add(RefKind::ConfigMap.key(&fqn(namespace, name)), owner, &[]);
        }
        if let Some(secret) = &from.secret_ref
            && let Some(name) = secret.name.ref_name()
        {
            refs.add(RefKind::Secret.key(&fqn(namespace, name)), owner, &[]);
        }
    }
}

fn item_keys(items: Option<&[KeyToPath]>) -> Vec<&str> {
    items
        .unwrap_or_default()
        .iter()
        .map(|item| item.key.as_str())
        .collect()
}

/// Build the RBAC family from bindings and service accounts.
pub fn rbac_references<'a>(
    role_bindings: impl IntoIterator<Item = (&'a String, &'a RoleBinding)>,
    cluster_role_bindings: impl IntoIterator<Item = (&'a String, &'a ClusterRoleBinding)>,
    service_accounts: impl IntoIterator<Item = (&'a String, &'a ServiceAccount)>,
) -> References {
    let mut refs = References::new();

    for (id, rb) in role_bindings {
        let namespace = namespace_of(id);
        add_subjects(&mut refs, id, namespace, rb.subjects.as_deref());
        add_role_ref(&mut refs, id, namespace, &rb.role_ref);
    }

    for (id, crb) in cluster_role_bindings {
        add_subjects(&mut refs, id, DEFAULT_NAMESPACE, crb.subjects.as_deref());
        add_role_ref(&mut refs, id, "", &crb.role_ref);
    }

    for (id, sa) in service_accounts {
        let namespace = namespace_of(id);
        for secret in sa.secrets.iter().flatten() {
            if let Some(name) = secret.name.ref_name() {
                let ns = secret.namespace.ref_name().unwrap_or(namespace);
                refs.add(RefKind::Secret.key(&fqn(ns, name)), id, &[]);
            }
        }
        for pull in sa.image_pull_secrets.iter().flatten() {
            if let Some(name) = pull.name.ref_name() {
                refs.add(RefKind::Secret.key(&fqn(namespace, name)), id, &[]);
            }
        }
    }

    refs
}

fn add_subjects(refs: &mut References, owner: &str, namespace: &str, subjects: Option<&[Subject]>) {
    for subject in subjects.unwrap_or_default() {
        if subject.kind != "ServiceAccount" {
            continue;
        }
        let ns = subject.namespace.ref_name().unwrap_or(namespace);
        refs.add(
            RefKind::ServiceAccount.key(&fqn(ns, &subject.name)),
            owner,
            &[],
        );
    }
}

/// Key of the role a binding points at, if the kind is one we track.
pub fn role_ref_key(namespace: &str, role_ref: &RoleRef) -> Option<String> {
    match role_ref.kind.as_str() {
        "Role" => Some(RefKind::Role.key(&fqn(namespace, &role_ref.name))),
        "ClusterRole" => Some(RefKind::ClusterRole.key(&role_ref.name)),
        _ => None,
    }
}

fn add_role_ref(refs: &mut References, owner: &str, namespace: &str, role_ref: &RoleRef) {
    if let Some(key) = role_ref_key(namespace, role_ref) {
        refs.add(key, owner, &[]);
    }
}
