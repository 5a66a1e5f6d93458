//! Handler for the `scan` command.
//!
//! Loads a snapshot from manifests (offline) or from the current kube
//! context (`--live`), audits it and renders the report.

use super::effective_catalog;
use crate::analyzer::snapshot::{Snapshot, live, manifest};
use crate::analyzer::{OutputFormat, Section, Severity, format_report_to_string, scan};
use crate::config::types::AuditConfig;
use crate::error::{AuditError, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the scan command
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Manifest files or directories (offline mode)
    pub paths: Vec<PathBuf>,
    /// Fetch from the cluster instead of manifests
    pub live: bool,
    /// Kube context for a live scan
    pub context: Option<String>,
    /// Namespace restriction for a live scan
    pub namespace: Option<String>,
    /// Comma-separated section names; all sections when absent
    pub sections: Option<String>,
    /// Lowest severity to report; the configured level when absent
    pub level: Option<Severity>,
    /// Output format
    pub format: OutputFormat,
    /// Output file
    pub output: Option<PathBuf>,
    /// Succeed even when errors are reported
    pub no_fail: bool,
}

/// Handle the `scan` command.
pub async fn handle_scan(config: &AuditConfig, options: ScanOptions) -> Result<()> {
    let sections = Section::parse_list(options.sections.as_deref().unwrap_or_default())?;
    let catalog = Arc::new(effective_catalog(config)?);
    let level = options.level.unwrap_or(config.level);

    let snapshot = load_snapshot(config, &options).await?;
    log::info!("auditing {} resource(s)", snapshot.resource_count());

    let report = scan(&snapshot, config, catalog, &sections)?;
    let output = format_report_to_string(&report, options.format, level);

    if let Some(output_path) = &options.output {
        std::fs::write(output_path, output)?;
        println!("Report written to: {}", output_path.display());
    } else {
        print!("{}", output);
    }

    let errors: usize = report.sections.iter().map(|s| s.tally.error).sum();
    if errors > 0 && !options.no_fail {
        return Err(AuditError::IssuesFound(errors));
    }
    Ok(())
}

async fn load_snapshot(config: &AuditConfig, options: &ScanOptions) -> Result<Snapshot> {
    if options.live {
        let client = live::connect(options.context.as_deref()).await?;
        return Ok(live::fetch(&client, options.namespace.as_deref()).await);
    }
    if options.paths.is_empty() {
        return Err(AuditError::InvalidArgument(
            "no manifest paths given; pass paths or --live".to_string(),
        ));
    }
    manifest::load_paths(&options.paths, config)
}
