//! Capabilities checkers depend on.
//!
//! Each trait exposes one resource family. A checker names the intersection
//! it needs as its own trait (with a blanket impl) instead of depending on the
//! whole snapshot.

use crate::analyzer::fqn::namespace_of;
use crate::analyzer::references::References;
use crate::analyzer::snapshot::metrics::PodMetrics;
use crate::analyzer::snapshot::selector;
use crate::error::ListError;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// Resources of one kind keyed by FQN, or the reason they could not be listed.
pub type Listing<'a, T> = Result<&'a BTreeMap<String, T>, ListError>;

pub trait PodLister {
    fn list_pods(&self) -> Listing<'_, Pod>;

    /// Pods in `namespace` whose labels satisfy `selector`.
    fn pods_by_selector(&self, namespace: &str, selector: &LabelSelector) -> Vec<(&String, &Pod)> {
        let Ok(pods) = self.list_pods() else {
            return Vec::new();
        };
        pods.iter()
            .filter(|(id, _)| namespace_of(id) == namespace)
            .filter(|(_, pod)| selector::matches(selector, pod.metadata.labels.as_ref()))
            .collect()
    }
}

pub trait PodMetricsLister {
    fn list_pod_metrics(&self) -> Listing<'_, PodMetrics>;
}

pub trait ConfigMapLister {
    fn list_config_maps(&self) -> Listing<'_, ConfigMap>;
}

pub trait SecretLister {
    fn list_secrets(&self) -> Listing<'_, Secret>;
}

pub trait ServiceAccountLister {
    fn list_service_accounts(&self) -> Listing<'_, ServiceAccount>;
}

pub trait NamespaceLister {
    fn list_namespaces(&self) -> Listing<'_, Namespace>;
}

pub trait NodeLister {
    fn list_nodes(&self) -> Listing<'_, Node>;
}

pub trait RoleLister {
    fn list_roles(&self) -> Listing<'_, Role>;
}

pub trait ClusterRoleLister {
    fn list_cluster_roles(&self) -> Listing<'_, ClusterRole>;
}

pub trait RoleBindingLister {
    fn list_role_bindings(&self) -> Listing<'_, RoleBinding>;
}

pub trait ClusterRoleBindingLister {
    fn list_cluster_role_bindings(&self) -> Listing<'_, ClusterRoleBinding>;
}

pub trait DeploymentLister {
    fn list_deployments(&self) -> Listing<'_, Deployment>;
}

pub trait StatefulSetLister {
    fn list_stateful_sets(&self) -> Listing<'_, StatefulSet>;
}

pub trait HpaLister {
    fn list_hpas(&self) -> Listing<'_, HorizontalPodAutoscaler>;
}

/// Reference families, built lazily on first access. A family is unavailable
/// when any kind it is walked from could not be listed.
pub trait ReferenceIndex {
    /// References walked from pods and workload pod templates.
    fn pod_references(&self) -> Result<&References, ListError>;
    /// References walked from bindings and service accounts.
    fn rbac_references(&self) -> Result<&References, ListError>;

    /// Namespace the reference sources were restricted to, if any.
    fn reference_scope(&self) -> Option<&str> {
        None
    }
}

/// Everything a full scan needs.
pub trait ClusterSource:
    PodLister
    + PodMetricsLister
    + ConfigMapLister
    + SecretLister
    + ServiceAccountLister
    + NamespaceLister
    + NodeLister
    + RoleLister
    + ClusterRoleLister
    + RoleBindingLister
    + ClusterRoleBindingLister
    + DeploymentLister
    + StatefulSetLister
    + HpaLister
    + ReferenceIndex
{
}

impl<T> ClusterSource for T where
    T: PodLister
        + PodMetricsLister
        + ConfigMapLister
        + SecretLister
        + ServiceAccountLister
        + NamespaceLister
        + NodeLister
        + RoleLister
        + ClusterRoleLister
        + RoleBindingLister
        + ClusterRoleBindingLister
        + DeploymentLister
        + StatefulSetLister
        + HpaLister
        + ReferenceIndex
{
}
