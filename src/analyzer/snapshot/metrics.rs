//! Pod usage as reported by metrics-server (`metrics.k8s.io/v1beta1`).

use crate::analyzer::fqn::meta_fqn;
use crate::analyzer::utilization::quantity::{cpu_millis, memory_bytes};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current usage of one pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PodMetrics {
    pub containers: Vec<ContainerMetrics>,
}

/// Current usage of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerMetrics {
    pub name: String,
    /// Millicores
    pub cpu: u64,
    /// Bytes
    pub mem: u64,
}

impl PodMetrics {
    /// Summed CPU (millicores) and memory (bytes) across containers.
    pub fn total(&self) -> (u64, u64) {
        self.containers
            .iter()
            .fold((0u64, 0u64), |(cpu, mem), c| {
                (cpu.saturating_add(c.cpu), mem.saturating_add(c.mem))
            })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PodMetricsList {
    pub items: Vec<PodMetricsItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PodMetricsItem {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    containers: Vec<ContainerMetricsItem>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetricsItem {
    name: String,
    #[serde(default)]
    usage: BTreeMap<String, Quantity>,
}

impl PodMetricsItem {
    /// Convert to the pod FQN and normalized usage.
    pub fn into_entry(self) -> (String, PodMetrics) {
        let fqn = meta_fqn(&self.metadata, true);
        let containers = self
            .containers
            .into_iter()
            .map(|c| ContainerMetrics {
                cpu: c.usage.get("cpu").map(cpu_millis).unwrap_or(0),
                mem: c.usage.get("memory").map(memory_bytes).unwrap_or(0),
                name: c.name,
            })
            .collect();
        (fqn, PodMetrics { containers })
    }
}
