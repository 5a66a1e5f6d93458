//! Secret usage checks over the pod and RBAC reference families.

use super::capabilities::{ReferenceIndex, SecretLister};
use super::{check_usage, listed, Sanitizer};
use crate::analyzer::issues::{Collector, Outcome};
use crate::analyzer::references::{RefKind, StringSet};
use crate::error::Result;
use k8s_openapi::api::core::v1::Secret;

pub trait SecretSource: SecretLister + ReferenceIndex {}

impl<T: SecretLister + ReferenceIndex + ?Sized> SecretSource for T {}

pub struct SecretSanitizer<'a, S: ?Sized> {
    collector: Collector,
    source: &'a S,
}

impl<'a, S: SecretSource + ?Sized> SecretSanitizer<'a, S> {
    pub fn new(collector: Collector, source: &'a S) -> Self {
        Self { collector, source }
    }
}

impl<S: SecretSource + ?Sized> Sanitizer for SecretSanitizer<'_, S> {
    fn sanitize(&mut self) -> Result<()> {
        let Some(secrets) = listed(&mut self.collector, self.source.list_secrets()) else {
            return Ok(());
        };
        let pods = listed(&mut self.collector, self.source.pod_references());
        let rbac = listed(&mut self.collector, self.source.rbac_references());
        let (Some(pods), Some(rbac)) = (pods, rbac) else {
            return Ok(());
        };
        let families = [pods, rbac];

        for (id, secret) in secrets {
            self.collector.init_outcome(id);
            check_usage(
                &mut self.collector,
                id,
                &RefKind::Secret.key(id),
                &declared_keys(secret),
                &families,
            )?;
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

fn declared_keys(secret: &Secret) -> StringSet {
    let data = secret.data.iter().flat_map(|d| d.keys());
    let string_data = secret.string_data.iter().flat_map(|d| d.keys());
    data.chain(string_data).map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::issues::Severity;
    use crate::analyzer::sanitize::testing::{collector, issues, messages, snapshot};
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::api::rbac::v1::RoleBinding;

    const MANIFESTS: &str = r#"
apiVersion: v1
kind: Secret
metadata: { name: sec1, namespace: default }
data: { user: Zm9v, pass: YmFy }
---
apiVersion: v1
kind: Secret
metadata: { name: sec2, namespace: default }
stringData: { token: abc }
---
apiVersion: v1
kind: Secret
metadata: { name: sec3, namespace: default }
data: { k: dg== }
---
apiVersion: v1
kind: Pod
metadata: { name: p1, namespace: default }
spec:
  containers:
    - name: c1
      image: app:1
      env:
        - name: USER
          valueFrom: { secretKeyRef: { name: sec1, key: user } }
---
apiVersion: v1
kind: ServiceAccount
metadata: { name: builder, namespace: default }
imagePullSecrets:
  - name: sec2
"#;

    fn run() -> Outcome {
        let snapshot = snapshot(MANIFESTS);
        let mut sanitizer = Box::new(SecretSanitizer::new(collector("secret"), &snapshot));
        sanitizer.sanitize().unwrap();
        sanitizer.into_outcome()
    }

    #[test]
    fn test_unreferenced_secret() {
        let outcome = run();
        let found = issues(&outcome, "default/sec3");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Info);
        assert!(found[0].message.contains("Used?"));
    }

    #[test]
    fn test_partially_used_secret() {
        let outcome = run();
        assert_eq!(
            messages(&outcome, "default/sec1"),
            vec![r#"[POP-401] Key "pass" used? Unable to locate key reference"#]
        );
    }

    #[test]
    fn test_service_account_reference_counts() {
        let outcome = run();
        assert!(outcome.contains("default/sec2"));
        assert!(messages(&outcome, "default/sec2").is_empty());
    }

    #[test]
    fn test_unlistable_sources_skip_usage() {
        let mut snapshot = snapshot(MANIFESTS);
        snapshot.record_failure::<Pod>("forbidden");
        snapshot.record_failure::<RoleBinding>("forbidden");
        let mut sanitizer = Box::new(SecretSanitizer::new(collector("secret"), &snapshot));
        sanitizer.sanitize().unwrap();

        let outcome = sanitizer.into_outcome();
        assert_eq!(outcome.len(), 2);
        assert_eq!(issues(&outcome, "pods").len(), 1);
        assert_eq!(
            messages(&outcome, "rolebindings"),
            vec!["failed to list rolebindings: forbidden"]
        );
        assert!(!outcome.contains("default/sec3"));
    }
}
