//! In-memory cluster snapshot.
//!
//! Holds the resources an audit runs over, keyed by FQN, along with the
//! listing failures recorded while they were gathered. Reference families are
//! built from the snapshot on first use and cached until the next insertion.

pub mod live;
pub mod manifest;
pub mod metrics;
pub mod selector;

use crate::analyzer::fqn::{meta_fqn, namespace_of};
use crate::analyzer::references::builder::{pod_references, rbac_references, PodSpecRef};
use crate::analyzer::references::cache::ReferenceCache;
use crate::analyzer::references::References;
use crate::analyzer::sanitize::capabilities::*;
use crate::error::ListError;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use metrics::PodMetrics;
use std::collections::BTreeMap;

/// Resources of one kind plus the failure, if any, met while gathering them.
#[derive(Debug, Clone)]
pub struct Family<T> {
    items: BTreeMap<String, T>,
    error: Option<String>,
}

impl<T> Default for Family<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            error: None,
        }
    }
}

impl<T> Family<T> {
    pub fn items(&self) -> &BTreeMap<String, T> {
        &self.items
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn listing(&self, kind: &'static str) -> Listing<'_, T> {
        match &self.error {
            Some(message) => Err(ListError {
                kind,
                message: message.clone(),
            }),
            None => Ok(&self.items),
        }
    }
}

/// Resource kinds a snapshot tracks.
pub trait Tracked: Sized {
    /// Lowercase plural name, used as the id of listing failures.
    const PLURAL: &'static str;
    const NAMESPACED: bool;

    fn family(snapshot: &Snapshot) -> &Family<Self>;
    fn family_mut(snapshot: &mut Snapshot) -> &mut Family<Self>;
}

macro_rules! tracked {
    ($ty:ty, $field:ident, $plural:literal, $namespaced:literal) => {
        impl Tracked for $ty {
            const PLURAL: &'static str = $plural;
            const NAMESPACED: bool = $namespaced;

            fn family(snapshot: &Snapshot) -> &Family<Self> {
                &snapshot.$field
            }

            fn family_mut(snapshot: &mut Snapshot) -> &mut Family<Self> {
                &mut snapshot.$field
            }
        }
    };
}

/// Point-in-time view of a cluster.
#[derive(Debug, Default)]
pub struct Snapshot {
    pods: Family<Pod>,
    pod_metrics: Family<PodMetrics>,
    config_maps: Family<ConfigMap>,
    secrets: Family<Secret>,
    service_accounts: Family<ServiceAccount>,
    namespaces: Family<Namespace>,
    nodes: Family<Node>,
    roles: Family<Role>,
    cluster_roles: Family<ClusterRole>,
    role_bindings: Family<RoleBinding>,
    cluster_role_bindings: Family<ClusterRoleBinding>,
    deployments: Family<Deployment>,
    stateful_sets: Family<StatefulSet>,
    hpas: Family<HorizontalPodAutoscaler>,
    /// Namespace namespaced kinds were listed from.
    scope: Option<String>,
    refs: ReferenceCache,
}

tracked!(Pod, pods, "pods", true);
tracked!(PodMetrics, pod_metrics, "podmetrics", true);
tracked!(ConfigMap, config_maps, "configmaps", true);
tracked!(Secret, secrets, "secrets", true);
tracked!(ServiceAccount, service_accounts, "serviceaccounts", true);
tracked!(Namespace, namespaces, "namespaces", false);
tracked!(Node, nodes, "nodes", false);
tracked!(Role, roles, "roles", true);
tracked!(ClusterRole, cluster_roles, "clusterroles", false);
tracked!(RoleBinding, role_bindings, "rolebindings", true);
tracked!(ClusterRoleBinding, cluster_role_bindings, "clusterrolebindings", false);
tracked!(Deployment, deployments, "deployments", true);
tracked!(StatefulSet, stateful_sets, "statefulsets", true);
tracked!(HorizontalPodAutoscaler, hpas, "horizontalpodautoscalers", true);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an API object, keyed by the FQN derived from its metadata.
    pub fn insert<T>(&mut self, obj: T)
    where
        T: Tracked + k8s_openapi::Metadata<Ty = ObjectMeta>,
    {
        let id = meta_fqn(obj.metadata(), T::NAMESPACED);
        self.insert_as(id, obj);
    }

    /// Add an object under an explicit FQN.
    pub fn insert_as<T: Tracked>(&mut self, id: String, obj: T) {
        T::family_mut(self).items.insert(id, obj);
        self.refs = ReferenceCache::default();
    }

    /// Record that a kind could not be listed or decoded. The first failure
    /// is kept.
    pub fn record_failure<T: Tracked>(&mut self, message: impl Into<String>) {
        let family = T::family_mut(self);
        if family.error.is_none() {
            family.error = Some(message.into());
        }
        self.refs = ReferenceCache::default();
    }

    /// Mark namespaced kinds as listed from `namespace` only.
    pub fn restrict_to(&mut self, namespace: impl Into<String>) {
        self.scope = Some(namespace.into());
    }

    pub fn items<T: Tracked>(&self) -> &BTreeMap<String, T> {
        &T::family(self).items
    }

    pub fn get<T: Tracked>(&self, id: &str) -> Option<&T> {
        T::family(self).items.get(id)
    }

    pub fn failure<'a, T: Tracked + 'a>(&'a self) -> Option<&'a str> {
        T::family(self).error()
    }

    /// Number of API objects held, metrics excluded.
    pub fn resource_count(&self) -> usize {
        self.pods.items.len()
            + self.config_maps.items.len()
            + self.secrets.items.len()
            + self.service_accounts.items.len()
            + self.namespaces.items.len()
            + self.nodes.items.len()
            + self.roles.items.len()
            + self.cluster_roles.items.len()
            + self.role_bindings.items.len()
            + self.cluster_role_bindings.items.len()
            + self.deployments.items.len()
            + self.stateful_sets.items.len()
            + self.hpas.items.len()
    }

    /// Pod specs of pods and of workload pod templates.
    fn pod_specs(&self) -> impl Iterator<Item = PodSpecRef<'_>> {
        let pods = self.pods.items.iter().filter_map(|(id, pod)| {
            pod.spec.as_ref().map(|spec| PodSpecRef {
                owner: id,
                namespace: namespace_of(id),
                spec,
            })
        });
        let deployments = self.deployments.items.iter().filter_map(|(id, dp)| {
            dp.spec
                .as_ref()
                .and_then(|s| s.template.spec.as_ref())
                .map(|spec| PodSpecRef {
                    owner: id,
                    namespace: namespace_of(id),
                    spec,
                })
        });
        let stateful_sets = self.stateful_sets.items.iter().filter_map(|(id, sts)| {
            sts.spec
                .as_ref()
                .and_then(|s| s.template.spec.as_ref())
                .map(|spec| PodSpecRef {
                    owner: id,
                    namespace: namespace_of(id),
                    spec,
                })
        });
        pods.chain(deployments).chain(stateful_sets)
    }
}

impl PodLister for Snapshot {
    fn list_pods(&self) -> Listing<'_, Pod> {
        self.pods.listing(Pod::PLURAL)
    }
}

impl PodMetricsLister for Snapshot {
    fn list_pod_metrics(&self) -> Listing<'_, PodMetrics> {
        self.pod_metrics.listing(PodMetrics::PLURAL)
    }
}

impl ConfigMapLister for Snapshot {
    fn list_config_maps(&self) -> Listing<'_, ConfigMap> {
        self.config_maps.listing(ConfigMap::PLURAL)
    }
}

impl SecretLister for Snapshot {
    fn list_secrets(&self) -> Listing<'_, Secret> {
        self.secrets.listing(Secret::PLURAL)
    }
}

impl ServiceAccountLister for Snapshot {
    fn list_service_accounts(&self) -> Listing<'_, ServiceAccount> {
        self.service_accounts.listing(ServiceAccount::PLURAL)
    }
}

impl NamespaceLister for Snapshot {
    fn list_namespaces(&self) -> Listing<'_, Namespace> {
        self.namespaces.listing(Namespace::PLURAL)
    }
}

impl NodeLister for Snapshot {
    fn list_nodes(&self) -> Listing<'_, Node> {
        self.nodes.listing(Node::PLURAL)
    }
}

impl RoleLister for Snapshot {
    fn list_roles(&self) -> Listing<'_, Role> {
        self.roles.listing(Role::PLURAL)
    }
}

impl ClusterRoleLister for Snapshot {
    fn list_cluster_roles(&self) -> Listing<'_, ClusterRole> {
        self.cluster_roles.listing(ClusterRole::PLURAL)
    }
}

impl RoleBindingLister for Snapshot {
    fn list_role_bindings(&self) -> Listing<'_, RoleBinding> {
        self.role_bindings.listing(RoleBinding::PLURAL)
    }
}

impl ClusterRoleBindingLister for Snapshot {
    fn list_cluster_role_bindings(&self) -> Listing<'_, ClusterRoleBinding> {
        self.cluster_role_bindings.listing(ClusterRoleBinding::PLURAL)
    }
}

impl DeploymentLister for Snapshot {
    fn list_deployments(&self) -> Listing<'_, Deployment> {
        self.deployments.listing(Deployment::PLURAL)
    }
}

impl StatefulSetLister for Snapshot {
    fn list_stateful_sets(&self) -> Listing<'_, StatefulSet> {
        self.stateful_sets.listing(StatefulSet::PLURAL)
    }
}

impl HpaLister for Snapshot {
    fn list_hpas(&self) -> Listing<'_, HorizontalPodAutoscaler> {
        self.hpas.listing(HorizontalPodAutoscaler::PLURAL)
    }
}

impl ReferenceIndex for Snapshot {
    fn pod_references(&self) -> Result<&References, ListError> {
        self.list_pods()?;
        self.list_deployments()?;
        self.list_stateful_sets()?;
        Ok(self.refs.pods.get_or_build(|| {
            log::debug!("building pod reference family");
            pod_references(self.pod_specs())
        }))
    }

    fn rbac_references(&self) -> Result<&References, ListError> {
        let role_bindings = self.list_role_bindings()?;
        let cluster_role_bindings = self.list_cluster_role_bindings()?;
        let service_accounts = self.list_service_accounts()?;
        Ok(self.refs.rbac.get_or_build(|| {
            log::debug!("building rbac reference family");
            rbac_references(role_bindings, cluster_role_bindings, service_accounts)
        }))
    }

    fn reference_scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}
