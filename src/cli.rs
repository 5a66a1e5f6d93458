use crate::analyzer::{OutputFormat, Severity};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kube-audit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Audit Kubernetes resources for potential misconfigurations")]
#[command(long_about = "Scans a live cluster or a set of manifests and reports unused ConfigMaps, Secrets, ServiceAccounts and RBAC objects, container hygiene problems, unhealthy workloads, misallocated resources and autoscalers that cannot burst.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit manifests or a live cluster
    Scan {
        /// Manifest files or directories to audit
        #[arg(value_name = "PATHS", required_unless_present = "live")]
        paths: Vec<PathBuf>,

        /// Audit the cluster of the current kube context instead of manifests
        #[arg(long, conflicts_with = "paths")]
        live: bool,

        /// Kube context to use with --live
        #[arg(long, requires = "live")]
        context: Option<String>,

        /// Restrict a live scan to one namespace
        #[arg(short, long, requires = "live")]
        namespace: Option<String>,

        /// Only run these sections (e.g. pod,secret,hpa)
        #[arg(short, long)]
        sections: Option<String>,

        /// Lowest severity to report (overrides the configuration)
        #[arg(short, long, value_enum)]
        level: Option<LintLevel>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: Format,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Exit successfully even when errors are reported
        #[arg(long)]
        no_fail: bool,
    },

    /// List the issue codes and their effective severities
    Codes {
        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Plain,
    Json,
    Yaml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Plain => OutputFormat::Plain,
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LintLevel {
    Ok,
    Info,
    Warn,
    Error,
}

impl From<LintLevel> for Severity {
    fn from(level: LintLevel) -> Self {
        match level {
            LintLevel::Ok => Severity::Ok,
            LintLevel::Info => Severity::Info,
            LintLevel::Warn => Severity::Warn,
            LintLevel::Error => Severity::Error,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
