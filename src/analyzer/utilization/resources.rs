//! Requested resources and consumption ratios.

use super::quantity::{cpu_millis, memory_bytes};
use k8s_openapi::api::core::v1::{Container, Node, PodSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Quality-of-service class derived from a container's requests and limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Qos {
    #[default]
    BestEffort,
    Burstable,
    Guaranteed,
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BestEffort => "BestEffort",
            Self::Burstable => "Burstable",
            Self::Guaranteed => "Guaranteed",
        };
        write!(f, "{}", name)
    }
}

/// Resources a container asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerResources {
    /// Millicores, absent when not specified.
    pub cpu: Option<u64>,
    /// Bytes, absent when not specified.
    pub mem: Option<u64>,
    pub qos: Qos,
}

type ResourceList = BTreeMap<String, Quantity>;

fn cpu_of(list: &ResourceList) -> Option<u64> {
    list.get("cpu").map(cpu_millis)
}

fn mem_of(list: &ResourceList) -> Option<u64> {
    list.get("memory").map(memory_bytes)
}

/// Classify a container and pick the values that represent its demand.
///
/// Requests win over limits. Guaranteed needs CPU and memory requests equal
/// to their limits; any other non-empty combination is Burstable.
pub fn container_resources(container: &Container) -> ContainerResources {
    let resources = container.resources.as_ref();
    let requests = resources
        .and_then(|r| r.requests.as_ref())
        .filter(|l| !l.is_empty());
    let limits = resources
        .and_then(|r| r.limits.as_ref())
        .filter(|l| !l.is_empty());

    match (requests, limits) {
        (Some(req), Some(lim)) => {
            let (cpu, mem) = (cpu_of(req), mem_of(req));
            let guaranteed =
                cpu.is_some() && mem.is_some() && cpu == cpu_of(lim) && mem == mem_of(lim);
            ContainerResources {
                cpu,
                mem,
                qos: if guaranteed {
                    Qos::Guaranteed
                } else {
                    Qos::Burstable
                },
            }
        }
        (Some(req), None) => ContainerResources {
            cpu: cpu_of(req),
            mem: mem_of(req),
            qos: Qos::Burstable,
        },
        (None, Some(lim)) => ContainerResources {
            cpu: cpu_of(lim),
            mem: mem_of(lim),
            qos: Qos::Burstable,
        },
        (None, None) => ContainerResources {
            cpu: None,
            mem: None,
            qos: Qos::BestEffort,
        },
    }
}

/// Summed CPU (millicores) and memory (bytes) over init and main containers.
pub fn pod_resources(spec: &PodSpec) -> (u64, u64) {
    spec.init_containers
        .iter()
        .flatten()
        .chain(&spec.containers)
        .map(container_resources)
        .fold((0, 0), |(cpu, mem), res| {
            (
                cpu.saturating_add(res.cpu.unwrap_or(0)),
                mem.saturating_add(res.mem.unwrap_or(0)),
            )
        })
}

/// Pod class: Guaranteed when every container is, BestEffort when no
/// container asks for anything, Burstable otherwise.
pub fn pod_qos(spec: &PodSpec) -> Qos {
    let classes: Vec<Qos> = spec
        .init_containers
        .iter()
        .flatten()
        .chain(&spec.containers)
        .map(|c| container_resources(c).qos)
        .collect();
    if classes.iter().all(|qos| *qos == Qos::BestEffort) {
        Qos::BestEffort
    } else if classes.iter().all(|qos| *qos == Qos::Guaranteed) {
        Qos::Guaranteed
    } else {
        Qos::Burstable
    }
}

/// Allocatable CPU and memory summed over nodes (capacity when allocatable
/// is not reported).
pub fn cluster_allocatable<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> (u64, u64) {
    nodes
        .into_iter()
        .filter_map(|node| node.status.as_ref())
        .filter_map(|status| status.allocatable.as_ref().or(status.capacity.as_ref()))
        .fold((0, 0), |(cpu, mem), list| {
            (
                cpu.saturating_add(cpu_of(list).unwrap_or(0)),
                mem.saturating_add(mem_of(list).unwrap_or(0)),
            )
        })
}

/// Percentage of `numerator` over `denominator`; 0 when the denominator is 0.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

/// Current usage against requests for a group of pods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumptionMetrics {
    pub current_cpu: u64,
    pub current_mem: u64,
    pub requested_cpu: u64,
    pub requested_mem: u64,
    pub requested_storage: u64,
    pub qos: Qos,
}

impl ConsumptionMetrics {
    /// Current CPU as a percentage of requested CPU.
    pub fn cpu_ratio(&self) -> f64 {
        ratio(self.current_cpu, self.requested_cpu)
    }

    /// Current memory as a percentage of requested memory.
    pub fn mem_ratio(&self) -> f64 {
        ratio(self.current_mem, self.requested_mem)
    }

    pub fn has_requests(&self) -> bool {
        self.requested_cpu > 0 || self.requested_mem > 0
    }
}
