//! Container checks shared by pods and workload templates.
//!
//! Issues are recorded as a sub-group named after the container.

use crate::analyzer::catalog::codes;
use crate::analyzer::issues::Collector;
use crate::error::Result;
use k8s_openapi::api::core::v1::{Container, PodSpec, Probe};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Run every container check over a pod spec.
///
/// Returns true when at least one container may run as root.
pub fn check_pod_spec(collector: &mut Collector, id: &str, spec: &PodSpec) -> Result<bool> {
    let pod_non_root = spec
        .security_context
        .as_ref()
        .and_then(|sc| sc.run_as_non_root);

    let mut root = false;
    for container in spec.init_containers.iter().flatten() {
        root |= check_container(collector, id, container, pod_non_root, true)?;
    }
    for container in &spec.containers {
        root |= check_container(collector, id, container, pod_non_root, false)?;
    }
    Ok(root)
}

fn check_container(
    collector: &mut Collector,
    id: &str,
    container: &Container,
    pod_non_root: Option<bool>,
    init: bool,
) -> Result<bool> {
    let group = container.name.as_str();

    check_image(collector, id, group, container.image.as_deref())?;
    if !init {
        check_probes(collector, id, group, container)?;
    }
    check_resources(collector, id, group, container)?;
    check_ports(collector, id, group, container)?;

    // Container-level setting overrides the pod-level one
    let non_root = container
        .security_context
        .as_ref()
        .and_then(|sc| sc.run_as_non_root)
        .or(pod_non_root);
    if non_root != Some(true) {
        collector.add_sub_code(id, group, codes::CONTAINER_RUNS_AS_ROOT, &[])?;
        return Ok(true);
    }
    Ok(false)
}

fn check_image(collector: &mut Collector, id: &str, group: &str, image: Option<&str>) -> Result<()> {
    let Some(image) = image.filter(|i| !i.is_empty()) else {
        return Ok(());
    };
    match image_tag(image) {
        ImageTag::Untagged => collector.add_sub_code(id, group, codes::UNTAGGED_IMAGE, &[]),
        ImageTag::Latest => collector.add_sub_code(id, group, codes::LATEST_IMAGE, &[]),
        ImageTag::Pinned => Ok(()),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ImageTag {
    Untagged,
    Latest,
    Pinned,
}

fn image_tag(image: &str) -> ImageTag {
    if image.contains('@') {
        return ImageTag::Pinned;
    }
    // A ':' before the last '/' belongs to a registry port
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    match last_segment.split_once(':') {
        None => ImageTag::Untagged,
        Some((_, "latest")) => ImageTag::Latest,
        Some(_) => ImageTag::Pinned,
    }
}

fn check_probes(collector: &mut Collector, id: &str, group: &str, container: &Container) -> Result<()> {
    let liveness = container.liveness_probe.as_ref();
    let readiness = container.readiness_probe.as_ref();

    match (liveness, readiness) {
        (None, None) => return collector.add_sub_code(id, group, codes::NO_PROBES, &[]),
        (None, Some(_)) => collector.add_sub_code(id, group, codes::NO_LIVENESS_PROBE, &[])?,
        (Some(_), None) => collector.add_sub_code(id, group, codes::NO_READINESS_PROBE, &[])?,
        (Some(_), Some(_)) => {}
    }

    for (kind, probe) in [("Liveness", liveness), ("Readiness", readiness)] {
        if probe.is_some_and(uses_numeric_port) {
            collector.add_sub_code(id, group, codes::NUMERIC_PROBE_PORT, &[&kind])?;
        }
    }
    Ok(())
}

fn uses_numeric_port(probe: &Probe) -> bool {
    let http = probe.http_get.as_ref().map(|h| &h.port);
    let tcp = probe.tcp_socket.as_ref().map(|t| &t.port);
    http.into_iter()
        .chain(tcp)
        .any(|port| matches!(port, IntOrString::Int(_)))
}

fn check_resources(
    collector: &mut Collector,
    id: &str,
    group: &str,
    container: &Container,
) -> Result<()> {
    let resources = container.resources.as_ref();
    let has_requests = resources
        .and_then(|r| r.requests.as_ref())
        .is_some_and(|r| !r.is_empty());
    let has_limits = resources
        .and_then(|r| r.limits.as_ref())
        .is_some_and(|l| !l.is_empty());

    if !has_requests && !has_limits {
        collector.add_sub_code(id, group, codes::NO_RESOURCES, &[])
    } else if !has_limits {
        collector.add_sub_code(id, group, codes::NO_LIMITS, &[])
    } else {
        Ok(())
    }
}

fn check_ports(collector: &mut Collector, id: &str, group: &str, container: &Container) -> Result<()> {
    for port in container.ports.iter().flatten() {
        if port.name.as_deref().is_none_or(str::is_empty) {
            collector.add_sub_code(id, group, codes::UNNAMED_PORT, &[&port.container_port])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::issues::Severity;
    use crate::analyzer::sanitize::testing::{collector, issues, messages};

    fn spec(yaml: &str) -> PodSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_image_tag() {
        assert_eq!(image_tag("nginx"), ImageTag::Untagged);
        assert_eq!(image_tag("nginx:latest"), ImageTag::Latest);
        assert_eq!(image_tag("nginx:1.25"), ImageTag::Pinned);
        assert_eq!(image_tag("registry:5000/team/app"), ImageTag::Untagged);
        assert_eq!(image_tag("registry:5000/team/app:2.0"), ImageTag::Pinned);
        assert_eq!(image_tag("app@sha256:abcd"), ImageTag::Pinned);
    }

    #[test]
    fn test_untagged_image_without_other_concerns() {
        let spec = spec(
            r#"
securityContext: { runAsNonRoot: true }
containers:
  - name: c1
    image: fred
    livenessProbe: { httpGet: { port: http } }
    readinessProbe: { httpGet: { port: http } }
    resources:
      requests: { cpu: 100m, memory: 64Mi }
      limits: { cpu: 100m, memory: 64Mi }
"#,
        );
        let mut c = collector("pod");
        let root = check_pod_spec(&mut c, "default/p1", &spec).unwrap();
        assert!(!root);

        let found = issues(c.outcome(), "default/p1");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].group, "c1");
        assert_eq!(found[0].severity, Severity::Error);
        assert_eq!(found[0].message, "[POP-100] Untagged docker image in use");
    }

    #[test]
    fn test_probe_checks() {
        let spec = spec(
            r#"
securityContext: { runAsNonRoot: true }
initContainers:
  - name: init
    image: busybox:1.36
    resources: { limits: { cpu: 10m } }
containers:
  - name: none
    image: app:1
    resources: { limits: { cpu: 10m } }
  - name: ready-only
    image: app:1
    readinessProbe: { tcpSocket: { port: 8080 } }
    resources: { limits: { cpu: 10m } }
"#,
        );
        let mut c = collector("pod");
        check_pod_spec(&mut c, "default/p1", &spec).unwrap();

        let msgs = messages(c.outcome(), "default/p1");
        assert_eq!(
            msgs,
            vec![
                "[POP-102] No probes defined",
                "[POP-103] No liveness probe",
                "[POP-105] Readiness probe uses a port#, prefer a named port",
            ]
        );
    }

    #[test]
    fn test_resources_ports_and_root() {
        let spec = spec(
            r#"
containers:
  - name: app
    image: app:1
    livenessProbe: { exec: { command: ["true"] } }
    readinessProbe: { exec: { command: ["true"] } }
    ports:
      - containerPort: 8080
      - containerPort: 9090
        name: metrics
  - name: sidecar
    image: proxy:1
    livenessProbe: { exec: { command: ["true"] } }
    readinessProbe: { exec: { command: ["true"] } }
    resources: { requests: { cpu: 10m } }
    securityContext: { runAsNonRoot: true }
"#,
        );
        let mut c = collector("pod");
        let root = check_pod_spec(&mut c, "default/p1", &spec).unwrap();
        assert!(root);

        let found = issues(c.outcome(), "default/p1");
        let app: Vec<_> = found.iter().filter(|i| i.group == "app").map(|i| i.message.as_str()).collect();
        assert_eq!(
            app,
            vec![
                "[POP-106] No resources requests/limits defined",
                "[POP-108] Unnamed port 8080",
                "[POP-306] Container could be running as root user. Check SecurityContext/Image",
            ]
        );
        let sidecar: Vec<_> = found
            .iter()
            .filter(|i| i.group == "sidecar")
            .map(|i| i.message.as_str())
            .collect();
        assert_eq!(sidecar, vec!["[POP-107] No resource limits defined"]);
    }
}
