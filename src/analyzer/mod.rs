//! # Analyzer Module
//!
//! Audits a cluster snapshot for misconfigurations:
//! - Unused ConfigMaps, Secrets, ServiceAccounts and RBAC objects
//! - Container hygiene (image tags, probes, resources, root users)
//! - Workload health and resource utilization
//! - Autoscaler targets and burst capacity

pub mod catalog;
pub mod fqn;
pub mod issues;
pub mod references;
pub mod report;
pub mod sanitize;
pub mod scan;
pub mod snapshot;
pub mod utilization;

pub use catalog::Catalog;
pub use issues::{Issue, Outcome, Severity};
pub use report::{OutputFormat, Report, format_report_to_string};
pub use sanitize::Section;
pub use scan::scan;
pub use snapshot::Snapshot;
