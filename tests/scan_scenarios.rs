use std::path::PathBuf;
use std::sync::Arc;

use kube_audit::analyzer::issues::ROOT_GROUP;
use kube_audit::analyzer::report::{Grade, Report};
use kube_audit::analyzer::snapshot::manifest::load_paths;
use kube_audit::analyzer::{Catalog, Issue, Section, Severity, Snapshot, scan};
use kube_audit::config::types::{AuditConfig, ExcludeRule};

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::builtin().expect("builtin catalog"))
}

fn shop_report(config: &AuditConfig) -> Report {
    let snapshot = load_paths(&[PathBuf::from("tests/fixtures/shop")], config)
        .expect("fixtures should load");
    scan(&snapshot, config, catalog(), &[]).expect("scan should succeed")
}

fn issues(report: &Report, section: Section, id: &str) -> Vec<Issue> {
    report
        .section(section)
        .and_then(|s| s.outcome.get(id))
        .map(|issues| issues.iter().cloned().collect())
        .unwrap_or_default()
}

fn messages(report: &Report, section: Section, id: &str) -> Vec<String> {
    issues(report, section, id).into_iter().map(|i| i.message).collect()
}

fn codes(report: &Report, section: Section, id: &str) -> Vec<String> {
    let mut codes: Vec<String> = messages(report, section, id)
        .iter()
        .filter_map(|m| m.split(']').next().map(|c| c.trim_start_matches('[').to_string()))
        .collect();
    codes.sort();
    codes
}

#[test]
fn shop_fixture_scores() {
    let report = shop_report(&AuditConfig::new());

    let tally = |section| report.section(section).unwrap().tally;
    assert_eq!(tally(Section::ConfigMap).score, 100);
    assert_eq!(tally(Section::ServiceAccount).score, 50);
    assert_eq!(tally(Section::Deployment).score, 0);
    assert!(tally(Section::StatefulSet).is_empty());
    assert!(tally(Section::ClusterRoleBinding).is_empty());

    assert_eq!(report.score, 65);
    assert_eq!(report.grade, Grade::D);
    assert!(report.has_errors());
}

#[test]
fn shop_fixture_usage_findings() {
    let report = shop_report(&AuditConfig::new());

    assert_eq!(
        messages(&report, Section::ConfigMap, "shop/web-config"),
        vec![r#"[POP-401] Key "color" used? Unable to locate key reference"#]
    );
    assert_eq!(
        messages(&report, Section::ConfigMap, "shop/stale"),
        vec!["[POP-400] Used? Unable to locate resource reference"]
    );
    assert!(messages(&report, Section::Secret, "shop/web-tls").is_empty());
    assert_eq!(
        issues(&report, Section::Secret, "shop/sec3"),
        vec![Issue::root(
            Severity::Info,
            "[POP-400] Used? Unable to locate resource reference"
        )]
    );
    assert!(messages(&report, Section::ServiceAccount, "shop/web").is_empty());
    assert_eq!(codes(&report, Section::ServiceAccount, "shop/batch"), vec!["POP-305", "POP-400"]);
    assert!(report.section(Section::Role).unwrap().outcome.contains("shop/reader"));
    assert!(messages(&report, Section::Role, "shop/reader").is_empty());
    assert_eq!(codes(&report, Section::ClusterRole, "viewer"), vec!["POP-400"]);
    assert_eq!(
        messages(&report, Section::RoleBinding, "shop/ghost-reader"),
        vec!["[POP-1300] References a Role (shop/ghost) which does not exist"]
    );
}

#[test]
fn shop_fixture_workload_findings() {
    let report = shop_report(&AuditConfig::new());

    assert!(report.section(Section::Pod).unwrap().outcome.contains("shop/web-1"));
    assert!(messages(&report, Section::Pod, "shop/web-1").is_empty());
    assert_eq!(
        codes(&report, Section::Pod, "shop/debug"),
        vec!["POP-100", "POP-102", "POP-106", "POP-300", "POP-301", "POP-302", "POP-306"]
    );

    let web = messages(&report, Section::Deployment, "shop/web");
    assert!(web.contains(&"[POP-501] Unhealthy 2 desired but have 1 available".to_string()));
    assert!(web.contains(
        &"[POP-503] At current load, CPU under allocated. Current:450m vs Requested:100m (450.00%)"
            .to_string()
    ));
    assert_eq!(web.len(), 2);

    assert!(messages(&report, Section::HorizontalPodAutoscaler, "shop/web").is_empty());
    assert_eq!(
        messages(&report, Section::HorizontalPodAutoscaler, "shop/api"),
        vec!["[POP-600] HPA shop/api references a Deployment shop/api which does not exist"]
    );

    assert_eq!(codes(&report, Section::Namespace, "legacy"), vec!["POP-400", "POP-800"]);
    assert!(messages(&report, Section::Namespace, "shop").is_empty());
}

#[test]
fn untagged_image_is_a_root_error() {
    let snapshot = Snapshot::from_yaml_str(
        r#"
apiVersion: apps/v1
kind: Deployment
metadata: { name: dp1, namespace: default }
spec:
  selector: { matchLabels: { app: dp1 } }
  template:
    metadata: { labels: { app: dp1 } }
    spec:
      automountServiceAccountToken: false
      securityContext: { runAsNonRoot: true }
      containers:
        - name: c1
          image: fred
"#,
    )
    .unwrap();
    let report = scan(&snapshot, &AuditConfig::new(), catalog(), &[Section::Deployment]).unwrap();

    let found = issues(&report, Section::Deployment, "default/dp1");
    assert!(found.contains(&Issue::new(
        "c1",
        Severity::Error,
        "[POP-100] Untagged docker image in use"
    )));
    assert!(found.iter().all(|i| i.group == "c1" || i.group == ROOT_GROUP));
}

#[test]
fn env_from_uses_every_key() {
    let snapshot = Snapshot::from_yaml_str(
        r#"
apiVersion: v1
kind: ConfigMap
metadata: { name: cm1, namespace: default }
data: { k1: a, k2: b }
---
apiVersion: v1
kind: Pod
metadata: { name: p1, namespace: default }
spec:
  containers:
    - name: c1
      image: app:1
      envFrom: [{ configMapRef: { name: cm1 } }]
"#,
    )
    .unwrap();
    let report = scan(&snapshot, &AuditConfig::new(), catalog(), &[Section::ConfigMap]).unwrap();
    assert!(messages(&report, Section::ConfigMap, "default/cm1").is_empty());
}

#[test]
fn exclusions_and_overrides_from_config() {
    let config = AuditConfig::new()
        .exclude("pod", ExcludeRule::resource("shop/debug"))
        .exclude("namespace", ExcludeRule::codes("legacy", &[400]))
        .override_code(401, 3);
    let snapshot = load_paths(&[PathBuf::from("tests/fixtures/shop")], &config).unwrap();

    let mut catalog = Catalog::builtin().unwrap();
    catalog.refine(&config.codes);
    let report = scan(&snapshot, &config, Arc::new(catalog), &[]).unwrap();

    assert!(!report.section(Section::Pod).unwrap().outcome.contains("shop/debug"));
    assert_eq!(codes(&report, Section::Namespace, "legacy"), vec!["POP-800"]);
    assert_eq!(
        report
            .section(Section::ConfigMap)
            .unwrap()
            .outcome
            .max_severity("shop/web-config"),
        Severity::Error
    );
}

#[test]
fn listing_failure_is_reported_and_scan_continues() {
    let snapshot = Snapshot::from_yaml_str(
        r#"
apiVersion: v1
kind: ConfigMap
metadata: { name: broken, namespace: default }
data: [not, a, map]
---
apiVersion: v1
kind: Namespace
metadata: { name: apps }
"#,
    )
    .unwrap();
    let report = scan(&snapshot, &AuditConfig::new(), catalog(), &[]).unwrap();

    let failure = issues(&report, Section::ConfigMap, "configmaps");
    assert_eq!(failure.len(), 1);
    assert_eq!(failure[0].severity, Severity::Error);
    assert!(failure[0].message.starts_with("failed to list configmaps"));
    assert!(report.section(Section::Namespace).unwrap().outcome.contains("apps"));
}

#[test]
fn undecodable_pods_skip_usage_checks() {
    let snapshot = Snapshot::from_yaml_str(
        r#"
apiVersion: v1
kind: ConfigMap
metadata: { name: app, namespace: shop }
data: { k: v }
---
apiVersion: v1
kind: Pod
metadata: { name: web, namespace: shop }
spec: [not, a, map]
"#,
    )
    .unwrap();
    let report = scan(&snapshot, &AuditConfig::new(), catalog(), &[]).unwrap();

    let failure = issues(&report, Section::ConfigMap, "pods");
    assert_eq!(failure.len(), 1);
    assert!(failure[0].message.starts_with("failed to list pods"));
    assert!(!report.section(Section::ConfigMap).unwrap().outcome.contains("shop/app"));
}
