//! Snapshot loading from a live cluster.
//!
//! Lists every tracked kind through the Kubernetes API and pod usage through
//! the metrics-server API. Each kind is attempted once; a failure is recorded
//! on the snapshot and the remaining kinds are still fetched.
//!
//! # Prerequisites
//!
//! - Valid kubeconfig (uses default context or specified context)
//! - RBAC permissions to list the audited kinds
//! - metrics-server for utilization checks (optional)

use super::metrics::{PodMetrics, PodMetricsList};
use super::{Snapshot, Tracked};
use crate::error::Result;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Client, Config,
    api::{Api, ListParams},
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Connect using the current kube context, or the named one.
pub async fn connect(context: Option<&str>) -> Result<Client> {
    // Ensure a TLS crypto provider is installed before kube builds its client
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = match context {
        Some(context) => {
            let kubeconfig = kube::config::Kubeconfig::read()?;
            Config::from_custom_kubeconfig(
                kubeconfig,
                &kube::config::KubeConfigOptions {
                    context: Some(context.to_string()),
                    ..Default::default()
                },
            )
            .await?
        }
        None => Config::infer().await?,
    };
    Ok(Client::try_from(config)?)
}

/// Fetch a snapshot, optionally restricted to one namespace.
pub async fn fetch(client: &Client, namespace: Option<&str>) -> Snapshot {
    let mut snapshot = Snapshot::new();

    collect_namespaced::<Pod>(&mut snapshot, client, namespace).await;
    collect_namespaced::<ConfigMap>(&mut snapshot, client, namespace).await;
    collect_namespaced::<Secret>(&mut snapshot, client, namespace).await;
    collect_namespaced::<ServiceAccount>(&mut snapshot, client, namespace).await;
    collect_namespaced::<Role>(&mut snapshot, client, namespace).await;
    collect_namespaced::<RoleBinding>(&mut snapshot, client, namespace).await;
    collect_namespaced::<Deployment>(&mut snapshot, client, namespace).await;
    collect_namespaced::<StatefulSet>(&mut snapshot, client, namespace).await;
    collect_namespaced::<HorizontalPodAutoscaler>(&mut snapshot, client, namespace).await;

    collect_cluster::<Namespace>(&mut snapshot, client).await;
    collect_cluster::<Node>(&mut snapshot, client).await;
    collect_cluster::<ClusterRole>(&mut snapshot, client).await;
    collect_cluster::<ClusterRoleBinding>(&mut snapshot, client).await;

    collect_pod_metrics(&mut snapshot, client, namespace).await;

    if let Some(ns) = namespace {
        snapshot.restrict_to(ns);
    }

    log::info!("fetched {} resources from cluster", snapshot.resource_count());
    snapshot
}

async fn collect_namespaced<K>(snapshot: &mut Snapshot, client: &Client, namespace: Option<&str>)
where
    K: Tracked
        + kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + k8s_openapi::Metadata<Ty = ObjectMeta>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let api: Api<K> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    record(snapshot, api).await;
}

async fn collect_cluster<K>(snapshot: &mut Snapshot, client: &Client)
where
    K: Tracked
        + kube::Resource<DynamicType = ()>
        + k8s_openapi::Metadata<Ty = ObjectMeta>
        + Clone
        + DeserializeOwned
        + Debug,
{
    record(snapshot, Api::<K>::all(client.clone())).await;
}

async fn record<K>(snapshot: &mut Snapshot, api: Api<K>)
where
    K: Tracked
        + kube::Resource<DynamicType = ()>
        + k8s_openapi::Metadata<Ty = ObjectMeta>
        + Clone
        + DeserializeOwned
        + Debug,
{
    match api.list(&ListParams::default()).await {
        Ok(list) => {
            log::debug!("listed {} {}", list.items.len(), K::PLURAL);
            for item in list.items {
                snapshot.insert(item);
            }
        }
        Err(e) => {
            log::warn!("failed to list {}: {}", K::PLURAL, e);
            snapshot.record_failure::<K>(e.to_string());
        }
    }
}

async fn collect_pod_metrics(snapshot: &mut Snapshot, client: &Client, namespace: Option<&str>) {
    // The metrics API path depends on whether we're querying a specific namespace
    let path = match namespace {
        Some(ns) => format!("/apis/metrics.k8s.io/v1beta1/namespaces/{}/pods", ns),
        None => "/apis/metrics.k8s.io/v1beta1/pods".to_string(),
    };

    let request = match http::Request::builder()
        .method("GET")
        .uri(&path)
        .body(Vec::new())
    {
        Ok(request) => request,
        Err(e) => {
            snapshot.record_failure::<PodMetrics>(format!("failed to build request: {}", e));
            return;
        }
    };

    match client.request::<PodMetricsList>(request).await {
        Ok(list) => {
            for item in list.items {
                let (id, metrics) = item.into_entry();
                snapshot.insert_as(id, metrics);
            }
        }
        Err(e) => {
            log::warn!("metrics-server not available: {}", e);
            snapshot.record_failure::<PodMetrics>(e.to_string());
        }
    }
}
