//! Pod checks: containers, service account, security and status.

use super::capabilities::{PodLister, ServiceAccountLister};
use super::container::check_pod_spec;
use super::{listed, Sanitizer};
use crate::analyzer::catalog::codes;
use crate::analyzer::fqn::{fqn, namespace_of};
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::builder::service_account_name;
use crate::error::Result;
use k8s_openapi::api::core::v1::{Pod, PodStatus, ServiceAccount};
use std::collections::BTreeMap;

/// Service account every namespace gets from the control plane.
pub(crate) const DEFAULT_SERVICE_ACCOUNT: &str = "default";

pub trait PodSource: PodLister + ServiceAccountLister {}

impl<T: PodLister + ServiceAccountLister + ?Sized> PodSource for T {}

pub struct PodSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
    /// Restart count at which a pod is reported.
    restarts: u32,
}

impl<'a, S: PodSource + ?Sized> PodSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S, restarts: u32) -> Self {
        Self {
            collector,
            source,
            restarts,
        }
    }

    fn check_service_account(
        &mut self,
        id: &str,
        pod: &Pod,
        accounts: Option<&BTreeMap<String, ServiceAccount>>,
    ) -> Result<()> {
        let Some(spec) = pod.spec.as_ref() else {
            return Ok(());
        };
        let name = service_account_name(spec);
        let account = accounts.and_then(|sa| sa.get(&fqn(namespace_of(id), name)));

        if name == DEFAULT_SERVICE_ACCOUNT {
            self.collector.add_code(id, codes::DEFAULT_SERVICE_ACCOUNT, &[])?;
        } else if accounts.is_some() && account.is_none() {
            self.collector
                .add_code(id, codes::MISSING_SERVICE_ACCOUNT, &[&"Pod", &name])?;
        }

        // The pod setting wins; otherwise the service account decides
        let automount = spec
            .automount_service_account_token
            .or_else(|| account.and_then(|sa| sa.automount_service_account_token));
        if automount != Some(false) {
            self.collector.add_code(id, codes::TOKEN_MOUNTED, &[])?;
        }
        Ok(())
    }

    fn check_status(&mut self, id: &str, status: &PodStatus) -> Result<()> {
        let phase = status.phase.as_deref().unwrap_or_default();
        if !phase.is_empty() && phase != "Running" && phase != "Succeeded" {
            self.collector
                .add_code(id, codes::POD_UNHAPPY_PHASE, &[&phase])?;
        }

        let statuses = status.container_statuses.as_deref().unwrap_or_default();
        if phase == "Running" {
            let ready = statuses.iter().filter(|s| s.ready).count();
            if ready < statuses.len() {
                self.collector
                    .add_code(id, codes::POD_NOT_READY, &[&ready, &statuses.len()])?;
            }
        }

        let restarts = statuses
            .iter()
            .map(|s| u32::try_from(s.restart_count).unwrap_or(0))
            .fold(0u32, u32::saturating_add);
        if self.restarts > 0 && restarts >= self.restarts {
            let unit = if restarts == 1 { "time" } else { "times" };
            self.collector
                .add_code(id, codes::POD_RESTARTED, &[&restarts, &unit])?;
        }
        Ok(())
    }
}

impl<S: PodSource + ?Sized> Sanitizer for PodSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let source = self.source;
        let Some(pods) = listed(&mut self.collector, source.list_pods()) else {
            return Ok(());
        };
        let accounts = listed(&mut self.collector, source.list_service_accounts());

        for (id, pod) in pods {
            self.collector.init_outcome(id);

            if let Some(spec) = &pod.spec {
                let root = check_pod_spec(&mut self.collector, id, spec)?;
                let pod_non_root = spec
                    .security_context
                    .as_ref()
                    .and_then(|sc| sc.run_as_non_root);
                if root && pod_non_root != Some(true) {
                    self.collector.add_code(id, codes::POD_RUNS_AS_ROOT, &[])?;
                }
            }
            self.check_service_account(id, pod, accounts)?;
            if let Some(status) = &pod.status {
                self.check_status(id, status)?;
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
