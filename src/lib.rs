//! # kube-audit
//!
//! A Kubernetes cluster auditor. It scans a live cluster, or a directory of
//! manifests, and reports potential misconfigurations with a per-section
//! score.
//!
//! ## Features
//!
//! - **Usage Analysis**: Finds unused ConfigMaps, Secrets, ServiceAccounts and RBAC objects
//! - **Container Hygiene**: Image tags, probes, resource requests and root users
//! - **Workload Health**: Replica availability, restarts and pod phases
//! - **Utilization**: Compares live usage against requests with configurable thresholds
//! - **Autoscalers**: Detects missing targets and bursts beyond cluster capacity
//!
//! ## Example
//!
//! ```rust,no_run
//! use kube_audit::analyzer::{Catalog, Severity, Snapshot, scan};
//! use kube_audit::config::types::AuditConfig;
//! use std::sync::Arc;
//!
//! # fn main() -> kube_audit::Result<()> {
//! let snapshot = Snapshot::from_yaml_str(&std::fs::read_to_string("cluster.yaml")?)?;
//! let catalog = Arc::new(Catalog::builtin()?);
//! let report = scan(&snapshot, &AuditConfig::default(), catalog, &[])?;
//! println!("score {} ({})", report.score, report.grade);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;

pub use error::{AuditError, Result};
pub use handlers::*;
use cli::Commands;
use config::types::AuditConfig;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run_command(command: Commands, config: &AuditConfig) -> Result<()> {
    match command {
        Commands::Scan {
            paths,
            live,
            context,
            namespace,
            sections,
            level,
            format,
            output,
            no_fail,
        } => {
            let options = ScanOptions {
                paths,
                live,
                context,
                namespace,
                sections,
                level: level.map(Into::into),
                format: format.into(),
                output,
                no_fail,
            };
            handlers::handle_scan(config, options).await
        }
        Commands::Codes { format } => handlers::handle_codes(config, format.into()),
    }
}
