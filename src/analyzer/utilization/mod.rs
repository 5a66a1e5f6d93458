//! Resource utilization engine.
//!
//! Normalizes quantities, classifies container QoS, sums pod demand and turns
//! usage/request ratios into allocation verdicts.

pub mod allocation;
pub mod quantity;
pub mod resources;

pub use allocation::{burst_overflow, classify, Allocation};
pub use quantity::{as_mebibytes, as_millicores, as_percent, parse_cpu_millis, parse_memory_bytes};
pub use resources::{
    cluster_allocatable, container_resources, pod_resources, ratio, ConsumptionMetrics,
    ContainerResources, Qos,
};
