use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// The binary with an isolated home so no user configuration is picked up.
fn kube_audit(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kube-audit").expect("bin");
    cmd.current_dir(fixtures())
        .env("HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn scan_reports_errors_with_failing_status() {
    let home = tempfile::tempdir().unwrap();
    kube_audit(&home)
        .args(["scan", "shop"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("▶ POD (2 scanned)"))
        .stdout(predicate::str::contains("[POP-100] Untagged docker image in use"))
        .stdout(predicate::str::contains("SCORE 65% (D)"))
        .stderr(predicate::str::contains("Error: "));
}

#[test]
fn scan_no_fail_succeeds() {
    let home = tempfile::tempdir().unwrap();
    kube_audit(&home)
        .args(["scan", "shop", "--no-fail", "--sections", "pod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shop/debug"))
        .stdout(predicate::str::contains("CONFIGMAP").not());
}

#[test]
fn scan_info_only_sections_succeed() {
    let home = tempfile::tempdir().unwrap();
    kube_audit(&home)
        .args(["scan", "shop", "--sections", "cm,sec"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"[POP-401] Key "color" used?"#));
}

#[test]
fn scan_json_output_at_level() {
    let home = tempfile::tempdir().unwrap();
    let output = kube_audit(&home)
        .args(["scan", "shop", "--format", "json", "--level", "error", "--no-fail"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["audit"]["score"], 65);
    assert_eq!(value["audit"]["level"], "error");

    let sections = value["audit"]["sections"].as_array().unwrap();
    let configmap = sections.iter().find(|s| s["section"] == "configmap").unwrap();
    assert_eq!(configmap["tally"]["info"], 2);
    assert!(configmap["issues"].as_object().unwrap().is_empty());

    let deployment = sections.iter().find(|s| s["section"] == "deployment").unwrap();
    let web = deployment["issues"]["shop/web"].as_array().unwrap();
    assert_eq!(web.len(), 1);
    assert_eq!(web[0]["severity"], "error");
}

#[test]
fn scan_writes_report_file() {
    let home = tempfile::tempdir().unwrap();
    let out = home.path().join("report.yaml");
    kube_audit(&home)
        .args(["scan", "shop/workloads.yaml", "--format", "yaml", "--no-fail", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"));

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.contains("audit:"));
    assert!(written.contains("shop/debug"));
}

#[test]
fn scan_uses_config_file() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("audit.yaml");
    fs::write(
        &config,
        "audit:\n  prefix: AUD\n  excludes:\n    pod:\n      - name: rx:^shop/debug$\n",
    )
    .unwrap();

    kube_audit(&home)
        .arg("--config")
        .arg(&config)
        .args(["scan", "shop", "--sections", "pod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shop/debug").not());
}

#[test]
fn scan_rejects_unknown_section() {
    let home = tempfile::tempdir().unwrap();
    kube_audit(&home)
        .args(["scan", "shop", "--sections", "pod,gadget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown section 'gadget'"));
}

#[test]
fn codes_lists_catalog() {
    let home = tempfile::tempdir().unwrap();
    kube_audit(&home)
        .arg("codes")
        .assert()
        .success()
        .stdout(predicate::str::contains("POP-100"))
        .stdout(predicate::str::contains("POP-1300"));
}
