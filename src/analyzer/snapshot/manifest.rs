//! Snapshot loading from manifest files.
//!
//! Accepts multi-document YAML (and JSON), `kind: List` wrappers such as
//! `kubectl get -o yaml` output, and metrics-server `PodMetrics` documents.

use super::metrics::PodMetricsItem;
use super::{Snapshot, Tracked};
use crate::config::types::AuditConfig;
use crate::error::{AuditError, Result};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Keys whose maps hold resource quantities that YAML may type as numbers.
const QUANTITY_MAPS: &[&str] = &["requests", "limits", "allocatable", "capacity", "usage", "hard"];

impl Snapshot {
    /// Build a snapshot from YAML content.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut snapshot = Snapshot::new();
        load_str(&mut snapshot, content, "<stdin>")?;
        Ok(snapshot)
    }
}

/// Load every manifest under `paths` into a fresh snapshot.
///
/// Explicit files must parse; files found while walking a directory are
/// skipped with a warning when they do not.
pub fn load_paths(paths: &[PathBuf], config: &AuditConfig) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();

    for path in paths {
        if path.is_dir() {
            load_dir(&mut snapshot, path, config);
        } else if config.should_ignore_path(path) {
            log::debug!("ignoring {}", path.display());
        } else {
            load_file(&mut snapshot, path)?;
        }
    }

    log::debug!("loaded {} resources", snapshot.resource_count());
    Ok(snapshot)
}

fn load_dir(snapshot: &mut Snapshot, dir: &Path, config: &AuditConfig) {
    for entry in walkdir::WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_manifest(path) {
            continue;
        }
        if config.should_ignore_path(path) {
            log::debug!("ignoring {}", path.display());
            continue;
        }
        if let Err(e) = load_file(snapshot, path) {
            log::warn!("failed to parse {}: {}", path.display(), e);
        }
    }
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml") | Some("json")
    )
}

/// Load one manifest file.
pub fn load_file(snapshot: &mut Snapshot, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    load_str(snapshot, &content, &path.display().to_string())
}

/// Load every document of `content`; `source` names it in errors.
pub fn load_str(snapshot: &mut Snapshot, content: &str, source: &str) -> Result<()> {
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(document).map_err(|e| AuditError::Manifest {
            path: source.to_string(),
            message: e.to_string(),
        })?;
        ingest(snapshot, value, source);
    }
    Ok(())
}

fn ingest(snapshot: &mut Snapshot, value: Value, source: &str) {
    let Value::Mapping(mut map) = value else {
        return;
    };
    let kind = match map.get("kind").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => {
            log::debug!("{}: skipping document without kind", source);
            return;
        }
    };

    if kind == "List" || kind.ends_with("List") {
        if let Some(Value::Sequence(items)) = map.remove("items") {
            for item in items {
                ingest(snapshot, item, source);
            }
        }
        return;
    }

    map.remove("apiVersion");
    map.remove("kind");
    normalize_quantities(&mut map);
    let value = Value::Mapping(map);

    match kind.as_str() {
        "Pod" => decode::<Pod>(snapshot, value, source),
        "ConfigMap" => decode::<ConfigMap>(snapshot, value, source),
        "Secret" => decode::<Secret>(snapshot, value, source),
        "ServiceAccount" => decode::<ServiceAccount>(snapshot, value, source),
        "Namespace" => decode::<Namespace>(snapshot, value, source),
        "Node" => decode::<Node>(snapshot, value, source),
        "Role" => decode::<Role>(snapshot, value, source),
        "ClusterRole" => decode::<ClusterRole>(snapshot, value, source),
        "RoleBinding" => decode::<RoleBinding>(snapshot, value, source),
        "ClusterRoleBinding" => decode::<ClusterRoleBinding>(snapshot, value, source),
        "Deployment" => decode::<Deployment>(snapshot, value, source),
        "StatefulSet" => decode::<StatefulSet>(snapshot, value, source),
        "HorizontalPodAutoscaler" => decode::<HorizontalPodAutoscaler>(snapshot, value, source),
        "PodMetrics" => match serde_yaml::from_value::<PodMetricsItem>(value) {
            Ok(item) => {
                let (id, metrics) = item.into_entry();
                snapshot.insert_as(id, metrics);
            }
            Err(e) => {
                log::warn!("{}: invalid PodMetrics: {}", source, e);
                snapshot.record_failure::<super::metrics::PodMetrics>(format!("{}: {}", source, e));
            }
        },
        other => log::debug!("{}: skipping unsupported kind {}", source, other),
    }
}

fn decode<T>(snapshot: &mut Snapshot, value: Value, source: &str)
where
    T: Tracked + DeserializeOwned + k8s_openapi::Metadata<Ty = ObjectMeta>,
{
    match serde_yaml::from_value::<T>(value) {
        Ok(obj) => snapshot.insert(obj),
        Err(e) => {
            log::warn!("{}: invalid {}: {}", source, T::PLURAL, e);
            snapshot.record_failure::<T>(format!("{}: {}", source, e));
        }
    }
}

/// Turn numeric quantities (`cpu: 1`) into strings so they decode as
/// `Quantity`.
fn normalize_quantities(map: &mut Mapping) {
    for (key, value) in map.iter_mut() {
        let is_quantity_map = key.as_str().is_some_and(|k| QUANTITY_MAPS.contains(&k));
        match value {
            Value::Mapping(inner) if is_quantity_map => {
                for (_, quantity) in inner.iter_mut() {
                    if let Value::Number(n) = quantity {
                        *quantity = Value::String(n.to_string());
                    }
                }
                normalize_quantities(inner);
            }
            Value::Mapping(inner) => normalize_quantities(inner),
            Value::Sequence(items) => {
                for item in items.iter_mut() {
                    if let Value::Mapping(inner) = item {
                        normalize_quantities(inner);
                    }
                }
            }
            _ => {}
        }
    }
}
