//! Deployment and StatefulSet checks.
//!
//! Both kinds share the same checks: scale and health, service account,
//! containers of the pod template, and utilization of the pods they select
//! measured against what those pods request.

use super::capabilities::{
    DeploymentLister, PodLister, PodMetricsLister, ServiceAccountLister, StatefulSetLister,
};
use super::container::check_pod_spec;
use super::pod::DEFAULT_SERVICE_ACCOUNT;
use super::{listed, Sanitizer};
use crate::analyzer::catalog::codes;
use crate::analyzer::fqn::{fqn, namespace_of};
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::builder::service_account_name;
use crate::analyzer::snapshot::metrics::PodMetrics;
use crate::analyzer::utilization::allocation::{classify, Allocation};
use crate::analyzer::utilization::quantity::{as_mebibytes, as_millicores, as_percent, memory_bytes};
use crate::analyzer::utilization::resources::{pod_qos, pod_resources, ConsumptionMetrics};
use crate::config::types::Allocations;
use crate::error::Result;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PodSpec, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

pub trait WorkloadSource: PodLister + PodMetricsLister + ServiceAccountLister {}

impl<T: PodLister + PodMetricsLister + ServiceAccountLister + ?Sized> WorkloadSource for T {}

pub trait DeploymentSource: DeploymentLister + WorkloadSource {}

impl<T: DeploymentLister + WorkloadSource + ?Sized> DeploymentSource for T {}

pub trait StatefulSetSource: StatefulSetLister + WorkloadSource {}

impl<T: StatefulSetLister + WorkloadSource + ?Sized> StatefulSetSource for T {}

/// The parts of a workload the shared checks look at.
struct Workload<'w> {
    kind: &'static str,
    id: &'w str,
    desired: i32,
    /// Available (Deployment) or ready (StatefulSet) replicas; absent when
    /// the workload carries no status.
    available: Option<i32>,
    selector: Option<&'w LabelSelector>,
    template: Option<&'w PodSpec>,
    /// Bytes requested by volume claim templates.
    storage: u64,
}

/// Listings shared by every workload of a run.
struct Context<'s> {
    accounts: Option<&'s BTreeMap<String, ServiceAccount>>,
    metrics: Option<&'s BTreeMap<String, PodMetrics>>,
    allocations: &'s Allocations,
}

fn check_workload<S: WorkloadSource + ?Sized>(
    collector: &mut Collector,
    source: &S,
    ctx: &Context<'_>,
    workload: &Workload<'_>,
) -> Result<()> {
    let id = workload.id;

    if workload.desired == 0 {
        collector.add_code(id, codes::ZERO_SCALE, &[])?;
    } else if let Some(available) = workload.available
        && available != workload.desired
    {
        collector.add_code(
            id,
            codes::UNHEALTHY_REPLICAS,
            &[&workload.desired, &available],
        )?;
    }

    if let Some(spec) = workload.template {
        let name = service_account_name(spec);
        if name != DEFAULT_SERVICE_ACCOUNT
            && let Some(accounts) = ctx.accounts
            && !accounts.contains_key(&fqn(namespace_of(id), name))
        {
            collector.add_code(id, codes::MISSING_SERVICE_ACCOUNT, &[&workload.kind, &name])?;
        }
        check_pod_spec(collector, id, spec)?;
    }

    if let Some(consumption) = consumption(source, ctx.metrics, workload) {
        check_utilization(collector, id, ctx.allocations, &consumption)?;
    }
    Ok(())
}

/// Usage and requests of the selected pods that report metrics.
fn consumption<S: PodLister + ?Sized>(
    source: &S,
    metrics: Option<&BTreeMap<String, PodMetrics>>,
    workload: &Workload<'_>,
) -> Option<ConsumptionMetrics> {
    let metrics = metrics.filter(|m| !m.is_empty())?;
    let selector = workload.selector?;

    let mut consumption = ConsumptionMetrics {
        requested_storage: workload.storage,
        qos: workload.template.map(pod_qos).unwrap_or_default(),
        ..Default::default()
    };
    let mut sampled = 0;
    for (pod_id, pod) in source.pods_by_selector(namespace_of(workload.id), selector) {
        let (Some(usage), Some(spec)) = (metrics.get(pod_id), pod.spec.as_ref()) else {
            continue;
        };
        let (cpu, mem) = usage.total();
        let (requested_cpu, requested_mem) = pod_resources(spec);
        consumption.current_cpu = consumption.current_cpu.saturating_add(cpu);
        consumption.current_mem = consumption.current_mem.saturating_add(mem);
        consumption.requested_cpu = consumption.requested_cpu.saturating_add(requested_cpu);
        consumption.requested_mem = consumption.requested_mem.saturating_add(requested_mem);
        sampled += 1;
    }

    log::debug!(
        "{}: {} pod(s) sampled, {} QoS, cpu {}/{}, memory {}/{}, claims {}",
        workload.id,
        sampled,
        consumption.qos,
        as_millicores(consumption.current_cpu),
        as_millicores(consumption.requested_cpu),
        as_mebibytes(consumption.current_mem),
        as_mebibytes(consumption.requested_mem),
        as_mebibytes(consumption.requested_storage)
    );
    (sampled > 0 && consumption.has_requests()).then_some(consumption)
}

fn check_utilization(
    collector: &mut Collector,
    id: &str,
    allocations: &Allocations,
    consumption: &ConsumptionMetrics,
) -> Result<()> {
    let cpu_ratio = consumption.cpu_ratio();
    if let Some(verdict) = classify(cpu_ratio, &allocations.cpu) {
        let code = match verdict {
            Allocation::Under => codes::CPU_UNDER_ALLOCATED,
            Allocation::Over => codes::CPU_OVER_ALLOCATED,
        };
        collector.add_code(
            id,
            code,
            &[
                &as_millicores(consumption.current_cpu),
                &as_millicores(consumption.requested_cpu),
                &as_percent(cpu_ratio),
            ],
        )?;
    }

    let mem_ratio = consumption.mem_ratio();
    if let Some(verdict) = classify(mem_ratio, &allocations.memory) {
        let code = match verdict {
            Allocation::Under => codes::MEM_UNDER_ALLOCATED,
            Allocation::Over => codes::MEM_OVER_ALLOCATED,
        };
        collector.add_code(
            id,
            code,
            &[
                &as_mebibytes(consumption.current_mem),
                &as_mebibytes(consumption.requested_mem),
                &as_percent(mem_ratio),
            ],
        )?;
    }
    Ok(())
}

fn context<'s, S: WorkloadSource + ?Sized>(
    collector: &mut Collector,
    source: &'s S,
    allocations: &'s Allocations,
) -> Context<'s> {
    let metrics = match source.list_pod_metrics() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            log::debug!("skipping utilization checks: {}", e);
            None
        }
    };
    Context {
        accounts: listed(collector, source.list_service_accounts()),
        metrics,
        allocations,
    }
}

pub struct DeploymentSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
    allocations: Allocations,
}

impl<'a, S: DeploymentSource + ?Sized> DeploymentSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S, allocations: Allocations) -> Self {
        Self {
            collector,
            source,
            allocations,
        }
    }
}

impl<S: DeploymentSource + ?Sized> Sanitizer for DeploymentSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let source = self.source;
        let Some(deployments) = listed(&mut self.collector, source.list_deployments()) else {
            return Ok(());
        };
        let ctx = context(&mut self.collector, source, &self.allocations);

        for (id, dp) in deployments {
            self.collector.init_outcome(id);
            let spec = dp.spec.as_ref();
            let workload = Workload {
                kind: "Deployment",
                id,
                desired: spec.and_then(|s| s.replicas).unwrap_or(1),
                available: dp
                    .status
                    .as_ref()
                    .map(|s| s.available_replicas.unwrap_or(0)),
                selector: spec.map(|s| &s.selector),
                template: spec.and_then(|s| s.template.spec.as_ref()),
                storage: 0,
            };
            check_workload(&mut self.collector, source, &ctx, &workload)?;
            self.collector.clear_if_excluded(id);
        }
        Ok(())
    }

    fn collector(&self) -> &Collector {
        &self.collector
    }

    fn into_outcome(self: Box<Self>) -> Outcome {
        self.collector.into_outcome()
    }
}

pub struct StatefulSetSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
    allocations: Allocations,
}

impl<'a, S: StatefulSetSource + ?Sized> StatefulSetSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S, allocations: Allocations) -> Self {
        Self {
            collector,
            source,
            allocations,
        }
    }
}

impl<S: StatefulSetSource + ?Sized> Sanitizer for StatefulSetSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let source = self.source;
        let Some(stateful_sets) = listed(&mut self.collector, source.list_stateful_sets()) else {
            return Ok(());
        };
        let ctx = context(&mut self.collector, source, &self.allocations);

        for (id, sts) in stateful_sets {
            self.collector.init_outcome(id);
            let spec = sts.spec.as_ref();
            let workload = Workload {
                kind: "StatefulSet",
                id,
                desired: spec.and_then(|s| s.replicas).unwrap_or(1),
                available: sts.status.as_ref().map(|s| s.ready_replicas.unwrap_or(0)),
                selector: spec.map(|s| &s.selector),
                template: spec.and_then(|s| s.template.spec.as_ref()),
                storage: requested_storage(sts),
            };
            check_workload(&mut self.collector, source, &ctx, &workload)?;
            self.collector.clear_if_excluded(id);
        }
        Ok(())
    }

    fn collector(&self) -> &Collector {
        &self.collector
    }

    fn into_outcome(self: Box<Self>) -> Outcome {
        self.collector.into_outcome()
    }
}

/// Storage requested by the volume claim templates of one replica.
fn requested_storage(sts: &StatefulSet) -> u64 {
    sts.spec
        .iter()
        .flat_map(|s| s.volume_claim_templates.iter().flatten())
        .filter_map(|pvc| pvc.spec.as_ref())
        .filter_map(|spec| spec.resources.as_ref())
        .filter_map(|r| r.requests.as_ref())
        .filter_map(|requests| requests.get("storage"))
        .map(memory_bytes)
        .fold(0, u64::saturating_add)
}
