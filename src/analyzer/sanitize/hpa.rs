//! HorizontalPodAutoscaler checks: scale target and burst capacity.

use super::capabilities::{DeploymentLister, HpaLister, NodeLister, StatefulSetLister};
use super::{listed, Sanitizer};
use crate::analyzer::catalog::codes;
use crate::analyzer::fqn::{fqn, namespace_of};
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::utilization::allocation::burst_overflow;
use crate::analyzer::utilization::quantity::{as_mebibytes, as_millicores};
use crate::analyzer::utilization::resources::{cluster_allocatable, pod_resources};
use crate::error::Result;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::PodSpec;
use std::collections::BTreeMap;

pub trait HpaSource: HpaLister + DeploymentLister + StatefulSetLister + NodeLister {}

impl<T> HpaSource for T where
    T: HpaLister + DeploymentLister + StatefulSetLister + NodeLister + ?Sized
{
}

pub struct HpaSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

/// The workload an autoscaler drives.
struct Target<'t> {
    spec: Option<&'t PodSpec>,
    replicas: Option<i32>,
}

/// Workloads autoscalers may target, listed once per run. `None` marks a
/// kind no autoscaler targets or that could not be listed.
struct Targets<'t> {
    deployments: Option<&'t BTreeMap<String, Deployment>>,
    stateful_sets: Option<&'t BTreeMap<String, StatefulSet>>,
}

fn targets_kind(hpas: &BTreeMap<String, HorizontalPodAutoscaler>, kind: &str) -> bool {
    hpas.values()
        .filter_map(|hpa| hpa.spec.as_ref())
        .any(|spec| spec.scale_target_ref.kind == kind)
}

impl<'a, S: HpaSource + ?Sized> HpaSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }

    /// Resolve the scale target, recording 600/601 when it is missing.
    /// `None` when the target is missing, unsupported or could not be listed.
    fn resolve_target(
        &mut self,
        id: &str,
        hpa: &HorizontalPodAutoscaler,
        targets: &Targets<'a>,
    ) -> Result<Option<Target<'a>>> {
        let Some(spec) = hpa.spec.as_ref() else {
            return Ok(None);
        };
        let target_ref = &spec.scale_target_ref;
        let target_id = fqn(namespace_of(id), &target_ref.name);

        match target_ref.kind.as_str() {
            "Deployment" => {
                let Some(deployments) = targets.deployments else {
                    return Ok(None);
                };
                match deployments.get(&target_id) {
                    Some(dp) => Ok(Some(Target {
                        spec: dp.spec.as_ref().and_then(|s| s.template.spec.as_ref()),
                        replicas: dp.spec.as_ref().and_then(|s| s.replicas),
                    })),
                    None => {
                        self.collector.add_code(
                            id,
                            codes::HPA_MISSING_DEPLOYMENT,
                            &[&id, &target_id],
                        )?;
                        Ok(None)
                    }
                }
            }
            "StatefulSet" => {
                let Some(stateful_sets) = targets.stateful_sets else {
                    return Ok(None);
                };
                match stateful_sets.get(&target_id) {
                    Some(sts) => Ok(Some(Target {
                        spec: sts.spec.as_ref().and_then(|s| s.template.spec.as_ref()),
                        replicas: sts.spec.as_ref().and_then(|s| s.replicas),
                    })),
                    None => {
                        self.collector.add_code(
                            id,
                            codes::HPA_MISSING_STATEFULSET,
                            &[&id, &target_id],
                        )?;
                        Ok(None)
                    }
                }
            }
            other => {
                log::debug!("{}: unsupported scale target kind {}", id, other);
                Ok(None)
            }
        }
    }

    fn check_burst(
        &mut self,
        id: &str,
        hpa: &HorizontalPodAutoscaler,
        target: &Target<'_>,
        capacity: (u64, u64),
    ) -> Result<()> {
        let (Some(spec), Some(template)) = (hpa.spec.as_ref(), target.spec) else {
            return Ok(());
        };
        let (cpu, mem) = pod_resources(template);
        let current = hpa
            .status
            .as_ref()
            .and_then(|s| s.current_replicas)
            .or(target.replicas)
            .map(replica_count)
            .unwrap_or(0)
            .max(1);
        let max = replica_count(spec.max_replicas);

        if let Some(overflow) = burst_overflow(cpu, current, max, capacity.0) {
            self.collector.add_code(
                id,
                codes::HPA_CPU_BURST,
                &[
                    &current,
                    &max,
                    &as_millicores(capacity.0),
                    &as_millicores(overflow),
                ],
            )?;
        }
        if let Some(overflow) = burst_overflow(mem, current, max, capacity.1) {
            self.collector.add_code(
                id,
                codes::HPA_MEM_BURST,
                &[
                    &current,
                    &max,
                    &as_mebibytes(capacity.1),
                    &as_mebibytes(overflow),
                ],
            )?;
        }
        Ok(())
    }
}

fn replica_count(replicas: i32) -> u32 {
    u32::try_from(replicas).unwrap_or(0)
}

impl<S: HpaSource + ?Sized> Sanitizer for HpaSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let source = self.source;
        let Some(hpas) = listed(&mut self.collector, source.list_hpas()) else {
            return Ok(());
        };
        // Without nodes there is no capacity to burst against
        let capacity = listed(&mut self.collector, source.list_nodes())
            .filter(|nodes| !nodes.is_empty())
            .map(|nodes| cluster_allocatable(nodes.values()));
        let targets = Targets {
            deployments: targets_kind(hpas, "Deployment")
                .then(|| listed(&mut self.collector, source.list_deployments()))
                .flatten(),
            stateful_sets: targets_kind(hpas, "StatefulSet")
                .then(|| listed(&mut self.collector, source.list_stateful_sets()))
                .flatten(),
        };

        for (id, hpa) in hpas {
            self.collector.init_outcome(id);
            if let Some(target) = self.resolve_target(id, hpa, &targets)?
                && let Some(capacity) = capacity
            {
                self.check_burst(id, hpa, &target, capacity)?;
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::sanitize::testing::{collector, messages, snapshot};

    fn run(yaml: &str) -> Outcome {
        let snapshot = snapshot(yaml);
        let mut sanitizer = Box::new(HpaSanitizer::new(collector("horizontalpodautoscaler"), &snapshot));
        sanitizer.sanitize().unwrap();
        sanitizer.into_outcome()
    }

    const TARGETS: &str = r#"
apiVersion: v1
kind: Node
metadata: { name: n1 }
status:
  allocatable: { cpu: 2, memory: 4Gi }
---
apiVersion: apps/v1
kind: Deployment
metadata: { name: web, namespace: shop }
spec:
  replicas: 2
  selector: { matchLabels: { app: web } }
  template:
    spec:
      containers:
        - name: web
          image: web:1.0
          resources: { requests: { cpu: 500m, memory: 256Mi } }
"#;

    fn hpa(name: &str, kind: &str, target: &str, max: u32) -> String {
        format!(
            "---\napiVersion: autoscaling/v2\nkind: HorizontalPodAutoscaler\nmetadata: {{ name: {}, namespace: shop }}\nspec:\n  scaleTargetRef: {{ apiVersion: apps/v1, kind: {}, name: {} }}\n  maxReplicas: {}\n",
            name, kind, target, max
        )
    }

    #[test]
    fn test_within_capacity() {
        let outcome = run(&format!("{}{}", TARGETS, hpa("web", "Deployment", "web", 4)));
        assert!(outcome.contains("shop/web"));
        assert!(messages(&outcome, "shop/web").is_empty());
    }

    #[test]
    fn test_cpu_burst() {
        // 10 x 500m = 5000m against 2000m allocatable; memory 2560Mi fits in 4Gi
        let outcome = run(&format!("{}{}", TARGETS, hpa("web", "Deployment", "web", 10)));
        assert_eq!(
            messages(&outcome, "shop/web"),
            vec!["[POP-602] Replicas (2/10) at burst will exceed cluster CPU(2000m) capacity by 3000m"]
        );
    }

    #[test]
    fn test_missing_targets() {
        let outcome = run(&format!(
            "{}{}{}",
            TARGETS,
            hpa("api", "Deployment", "api", 2),
            hpa("db", "StatefulSet", "db", 2)
        ));
        assert_eq!(
            messages(&outcome, "shop/api"),
            vec!["[POP-600] HPA shop/api references a Deployment shop/api which does not exist"]
        );
        assert_eq!(
            messages(&outcome, "shop/db"),
            vec!["[POP-601] HPA shop/db references a StatefulSet shop/db which does not exist"]
        );
    }

    #[test]
    fn test_no_nodes_skips_burst() {
        let yaml = TARGETS.replacen("kind: Node", "kind: Widget", 1);
        let outcome = run(&format!("{}{}", yaml, hpa("web", "Deployment", "web", 100)));
        assert!(messages(&outcome, "shop/web").is_empty());
    }

    #[test]
    fn test_unlistable_targets_recorded_once() {
        let mut snapshot = snapshot(&format!(
            "{}{}{}",
            TARGETS,
            hpa("web", "Deployment", "web", 4),
            hpa("api", "Deployment", "api", 4)
        ));
        snapshot.record_failure::<Deployment>("forbidden");
        snapshot.record_failure::<StatefulSet>("forbidden");
        let mut sanitizer = Box::new(HpaSanitizer::new(collector("horizontalpodautoscaler"), &snapshot));
        sanitizer.sanitize().unwrap();
        let outcome = sanitizer.into_outcome();

        assert_eq!(
            messages(&outcome, "deployments"),
            vec!["failed to list deployments: forbidden"]
        );
        assert!(!outcome.contains("statefulsets"));
        assert!(messages(&outcome, "shop/web").is_empty());
        assert!(messages(&outcome, "shop/api").is_empty());
    }
}
