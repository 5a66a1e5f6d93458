//! Scan orchestration.
//!
//! Runs the selected sanitizers over a cluster source, in section order,
//! and collects their outcomes into a [`Report`].

use crate::analyzer::catalog::Catalog;
use crate::analyzer::issues::{Collector, Exclusions};
use crate::analyzer::report::{Report, SectionReport};
use crate::analyzer::sanitize::capabilities::ClusterSource;
use crate::analyzer::sanitize::*;
use crate::config::types::AuditConfig;
use crate::error::Result;
use std::sync::Arc;

/// Audit `source` over `sections` (every section when empty).
pub fn scan<S: ClusterSource + ?Sized>(
    source: &S,
    config: &AuditConfig,
    catalog: Arc<Catalog>,
    sections: &[Section],
) -> Result<Report> {
    let exclusions = Arc::new(Exclusions::compile(&config.excludes)?);

    let mut selected: Vec<Section> = if sections.is_empty() {
        Section::ALL.to_vec()
    } else {
        sections.to_vec()
    };
    selected.sort();
    selected.dedup();

    let mut reports = Vec::with_capacity(selected.len());
    for section in selected {
        let collector = Collector::new(section.name(), Arc::clone(&catalog), Arc::clone(&exclusions));
        let mut sanitizer = sanitizer(section, collector, source, config);
        sanitizer.sanitize()?;

        let outcome = sanitizer.into_outcome();
        log::debug!("{}: {} resource(s) audited", section, outcome.len());
        reports.push(SectionReport::new(section, outcome));
    }

    let report = Report::new(reports);
    log::info!("scan complete: score {} ({})", report.score, report.grade);
    Ok(report)
}

fn sanitizer<'a, S: ClusterSource + ?Sized>(
    section: Section,
    collector: Collector,
    source: &'a S,
    config: &AuditConfig,
) -> Box<dyn Sanitizer + 'a> {
    match section {
        Section::ConfigMap => Box::new(ConfigMapSanitizer::new(collector, source)),
        Section::Secret => Box::new(SecretSanitizer::new(collector, source)),
        Section::ServiceAccount => Box::new(ServiceAccountSanitizer::new(collector, source)),
        Section::Role => Box::new(RoleSanitizer::new(collector, source)),
        Section::ClusterRole => Box::new(ClusterRoleSanitizer::new(collector, source)),
        Section::RoleBinding => Box::new(RoleBindingSanitizer::new(collector, source)),
        Section::ClusterRoleBinding => Box::new(ClusterRoleBindingSanitizer::new(collector, source)),
        Section::Namespace => Box::new(NamespaceSanitizer::new(
            collector,
            source,
            config.skip_namespaces.clone(),
        )),
        Section::Pod => Box::new(PodSanitizer::new(collector, source, config.pod.restarts)),
        Section::Deployment => {
            Box::new(DeploymentSanitizer::new(collector, source, config.allocations))
        }
        Section::StatefulSet => {
            Box::new(StatefulSetSanitizer::new(collector, source, config.allocations))
        }
        Section::HorizontalPodAutoscaler => Box::new(HpaSanitizer::new(collector, source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::issues::Severity;
    use crate::analyzer::snapshot::Snapshot;
    use crate::config::types::ExcludeRule;

    const MANIFESTS: &str = r#"
apiVersion: v1
kind: Namespace
metadata: { name: shop }
---
apiVersion: v1
kind: ConfigMap
metadata: { name: unused, namespace: shop }
data: { a: "1" }
---
apiVersion: v1
kind: Pod
metadata: { name: web, namespace: shop }
spec:
  containers: [{ name: web, image: nginx }]
"#;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::builtin().unwrap())
    }

    #[test]
    fn test_scan_selected_sections() {
        let snapshot = Snapshot::from_yaml_str(MANIFESTS).unwrap();
        let config = AuditConfig::new();
        let report = scan(
            &snapshot,
            &config,
            catalog(),
            &[Section::Pod, Section::ConfigMap, Section::Pod],
        )
        .unwrap();

        let sections: Vec<Section> = report.sections.iter().map(|s| s.section).collect();
        assert_eq!(sections, vec![Section::ConfigMap, Section::Pod]);
        assert_eq!(
            report.section(Section::ConfigMap).unwrap().outcome.max_severity("shop/unused"),
            Severity::Info
        );
        assert!(report.has_errors());
    }

    #[test]
    fn test_scan_all_sections() {
        let snapshot = Snapshot::from_yaml_str(MANIFESTS).unwrap();
        let report = scan(&snapshot, &AuditConfig::new(), catalog(), &[]).unwrap();
        assert_eq!(report.sections.len(), Section::ALL.len());
        let ns = report.section(Section::Namespace).unwrap();
        assert_eq!(ns.tally.ok, 1);
    }

    #[test]
    fn test_exclusions_apply() {
        let snapshot = Snapshot::from_yaml_str(MANIFESTS).unwrap();
        let config = AuditConfig::new()
            .exclude("configmap", ExcludeRule::resource("rx:^shop/"))
            .exclude("pod", ExcludeRule::codes("shop/web", &[100]));
        let report = scan(&snapshot, &config, catalog(), &[Section::ConfigMap, Section::Pod]).unwrap();

        assert!(report.section(Section::ConfigMap).unwrap().outcome.is_empty());
        let pod = &report.section(Section::Pod).unwrap().outcome;
        assert!(pod.contains("shop/web"));
        assert!(
            !pod.get("shop/web")
                .unwrap()
                .iter()
                .any(|i| i.message.starts_with("[POP-100]"))
        );
    }

    #[test]
    fn test_invalid_exclusion_pattern() {
        let snapshot = Snapshot::new();
        let config = AuditConfig::new().exclude("pod", ExcludeRule::resource("rx:("));
        assert!(scan(&snapshot, &config, catalog(), &[]).is_err());
    }
}
