//! ServiceAccount checks: usage and dangling secret references.

use super::capabilities::{ReferenceIndex, SecretLister, ServiceAccountLister};
use super::{listed, Sanitizer};
use crate::analyzer::catalog::codes;
use crate::analyzer::fqn::{fqn, namespace_of, RefName};
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::{RefKind, References};
use crate::error::Result;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use std::collections::BTreeMap;

pub trait ServiceAccountSource: ServiceAccountLister + SecretLister + ReferenceIndex {}

impl<T: ServiceAccountLister + SecretLister + ReferenceIndex + ?Sized> ServiceAccountSource for T {}

pub struct ServiceAccountSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

impl<'a, S: ServiceAccountSource + ?Sized> ServiceAccountSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }

    fn check_references(&mut self, id: &str, families: [&References; 2]) -> Result<()> {
        let key = RefKind::ServiceAccount.key(id);
        if families.iter().all(|refs| !refs.contains(&key)) {
            self.collector.add_code(id, codes::UNUSED, &[])?;
        }
        Ok(())
    }

    fn check_secrets(
        &mut self,
        id: &str,
        sa: &ServiceAccount,
        secrets: &BTreeMap<String, Secret>,
    ) -> Result<()> {
        let namespace = namespace_of(id);

        for secret in sa.secrets.iter().flatten() {
            let Some(name) = secret.name.ref_name() else {
                continue;
            };
            let ns = secret.namespace.ref_name().unwrap_or(namespace);
            if !secrets.contains_key(&fqn(ns, name)) {
                self.collector.add_code(id, codes::MISSING_SECRET, &[&name])?;
            }
        }

        for pull in sa.image_pull_secrets.iter().flatten() {
            let Some(name) = pull.name.ref_name() else {
                continue;
            };
            if !secrets.contains_key(&fqn(namespace, name)) {
                self.collector.add_code(id, codes::MISSING_PULL_SECRET, &[&name])?;
            }
        }
        Ok(())
    }
}

impl<S: ServiceAccountSource + ?Sized> Sanitizer for ServiceAccountSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let source = self.source;
        let Some(accounts) = listed(&mut self.collector, source.list_service_accounts()) else {
            return Ok(());
        };
        let secrets = listed(&mut self.collector, source.list_secrets());
        let pods = listed(&mut self.collector, source.pod_references());
        let rbac = listed(&mut self.collector, source.rbac_references());
        let families = pods.zip(rbac).map(|(pods, rbac)| [pods, rbac]);

        for (id, sa) in accounts {
            self.collector.init_outcome(id);
            if let Some(families) = families {
                self.check_references(id, families)?;
            }
            if let Some(secrets) = secrets {
                self.check_secrets(id, sa, secrets)?;
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
    use crate::analyzer::sanitize::testing::{collector, has_code, messages, snapshot};
    use k8s_openapi::api::rbac::v1::ClusterRoleBinding;

    fn run(yaml: &str) -> Outcome {
        let snapshot = snapshot(yaml);
        let mut sanitizer = Box::new(ServiceAccountSanitizer::new(
            collector("serviceaccount"),
            &snapshot,
        ));
        sanitizer.sanitize().unwrap();
        sanitizer.into_outcome()
    }

    #[test]
    fn test_unreferenced_service_account() {
        let outcome = run("apiVersion: v1\nkind: ServiceAccount\nmetadata: { name: sa1, namespace: default }\n");
        assert_eq!(
            messages(&outcome, "default/sa1"),
            vec!["[POP-400] Used? Unable to locate resource reference"]
        );
    }

    #[test]
    fn test_service_account_used_by_pod() {
        let outcome = run(
            r#"
apiVersion: v1
kind: ServiceAccount
metadata: { name: sa1, namespace: default }
---
apiVersion: v1
kind: Pod
metadata: { name: p1, namespace: default }
spec:
  serviceAccountName: sa1
  containers: [{ name: c1, image: app:1 }]
"#,
        );
        assert!(messages(&outcome, "default/sa1").is_empty());
    }

    #[test]
    fn test_service_account_bound_by_role_binding() {
        let outcome = run(
            r#"
apiVersion: v1
kind: ServiceAccount
metadata: { name: ci, namespace: tools }
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata: { name: ci-admin }
roleRef: { apiGroup: rbac.authorization.k8s.io, kind: ClusterRole, name: admin }
subjects:
  - { kind: ServiceAccount, name: ci, namespace: tools }
"#,
        );
        assert!(!has_code(&outcome, "tools/ci", codes::UNUSED));
    }

    #[test]
    fn test_missing_secrets() {
        let outcome = run(
            r#"
apiVersion: v1
kind: ServiceAccount
metadata: { name: sa1, namespace: default }
secrets:
  - name: present
  - name: gone
imagePullSecrets:
  - name: registry
---
apiVersion: v1
kind: Secret
metadata: { name: present, namespace: default }
"#,
        );
        let msgs = messages(&outcome, "default/sa1");
        assert!(msgs.contains(&r#"[POP-304] References a secret "gone" which does not exist"#.to_string()));
        assert!(msgs.contains(
            &r#"[POP-305] References a docker-image "registry" pull secret which does not exist"#
                .to_string()
        ));
        assert!(!msgs.iter().any(|m| m.contains("present")));
    }

    #[test]
    fn test_unlistable_bindings_keep_secret_checks() {
        let mut snapshot = snapshot(
            "apiVersion: v1\nkind: ServiceAccount\nmetadata: { name: sa1, namespace: default }\nimagePullSecrets:\n  - name: gone\n",
        );
        snapshot.record_failure::<ClusterRoleBinding>("forbidden");
        let mut sanitizer = Box::new(ServiceAccountSanitizer::new(
            collector("serviceaccount"),
            &snapshot,
        ));
        sanitizer.sanitize().unwrap();

        let outcome = sanitizer.into_outcome();
        assert_eq!(
            messages(&outcome, "clusterrolebindings"),
            vec!["failed to list clusterrolebindings: forbidden"]
        );
        assert!(!has_code(&outcome, "default/sa1", codes::UNUSED));
        assert!(has_code(&outcome, "default/sa1", codes::MISSING_PULL_SECRET));
    }
}
