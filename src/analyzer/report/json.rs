//! JSON and YAML formatters.

use super::{Grade, Report, SectionReport, Tally};
use crate::analyzer::issues::{Issues, Severity};
use serde::Serialize;
use std::collections::BTreeMap;

/// Format a report as JSON.
pub fn format(report: &Report, level: Severity) -> String {
    let output = Output::new(report, level);
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Format a report as YAML.
pub fn format_yaml(report: &Report, level: Severity) -> String {
    let output = Output::new(report, level);
    serde_yaml::to_string(&output).unwrap_or_default()
}

#[derive(Serialize)]
struct Output {
    audit: Audit,
}

#[derive(Serialize)]
struct Audit {
    generated_at: String,
    score: u8,
    grade: Grade,
    level: Severity,
    sections: Vec<SectionOutput>,
}

#[derive(Serialize)]
struct SectionOutput {
    section: &'static str,
    tally: Tally,
    /// Resource id to the issues at or above the level; sorted by id.
    issues: BTreeMap<String, Issues>,
}

impl SectionOutput {
    fn new(section: &SectionReport, level: Severity) -> Self {
        let mut outcome = section.outcome.clone();
        outcome.filter(level);
        Self {
            section: section.section.name(),
            tally: section.tally,
            issues: outcome
                .into_iter()
                .filter(|(_, issues)| !issues.is_empty())
                .collect(),
        }
    }
}

impl Output {
    fn new(report: &Report, level: Severity) -> Self {
        let sections = report
            .sections
            .iter()
            .map(|s| SectionOutput::new(s, level))
            .collect();

        Self {
            audit: Audit {
                generated_at: report.generated_at.to_rfc3339(),
                score: report.score,
                grade: report.grade,
                level,
                sections,
            },
        }
    }
}
