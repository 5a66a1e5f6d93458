//! Scan report: per-section tallies, overall score and rendering.

pub mod json;
pub mod plain;

use crate::analyzer::issues::{Outcome, Severity};
use crate::analyzer::sanitize::Section;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Resources of one section counted by their highest severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub ok: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    /// Percentage of resources at Ok or Info.
    pub score: u8,
}

impl Tally {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        let mut tally = Self::default();
        for (id, _) in outcome.iter() {
            match outcome.max_severity(id) {
                Severity::Ok => tally.ok += 1,
                Severity::Info => tally.info += 1,
                Severity::Warn => tally.warn += 1,
                Severity::Error => tally.error += 1,
            }
        }
        tally.score = if tally.is_empty() {
            100
        } else {
            let healthy = (tally.ok + tally.info) as f64;
            (100.0 * healthy / tally.total() as f64).ceil() as u8
        };
        tally
    }

    pub fn total(&self) -> usize {
        self.ok + self.info + self.warn + self.error
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Letter grade of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::A,
            80..=89 => Self::B,
            70..=79 => Self::C,
            60..=69 => Self::D,
            50..=59 => Self::E,
            _ => Self::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
        };
        write!(f, "{}", letter)
    }
}

/// Outcome and tally of one section.
#[derive(Debug, Clone)]
pub struct SectionReport {
    pub section: Section,
    pub tally: Tally,
    pub outcome: Outcome,
}

impl SectionReport {
    pub fn new(section: Section, outcome: Outcome) -> Self {
        Self {
            section,
            tally: Tally::from_outcome(&outcome),
            outcome,
        }
    }
}

/// Result of a scan.
#[derive(Debug, Clone)]
pub struct Report {
    pub sections: Vec<SectionReport>,
    /// Mean score of the sections that hold resources.
    pub score: u8,
    pub grade: Grade,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn new(sections: Vec<SectionReport>) -> Self {
        let counted: Vec<f64> = sections
            .iter()
            .filter(|s| !s.tally.is_empty())
            .map(|s| f64::from(s.tally.score))
            .collect();
        let score = if counted.is_empty() {
            100
        } else {
            (counted.iter().sum::<f64>() / counted.len() as f64).round() as u8
        };
        Self {
            sections,
            score,
            grade: Grade::from_score(score),
            generated_at: Utc::now(),
        }
    }

    pub fn section(&self, section: Section) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.section == section)
    }

    /// Whether any resource carries an error.
    pub fn has_errors(&self) -> bool {
        self.sections.iter().any(|s| s.tally.error > 0)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Colored plain text.
    #[default]
    Plain,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Parse from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "text" => Some(Self::Plain),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Render a report, showing issues at or above `level`.
pub fn format_report_to_string(report: &Report, format: OutputFormat, level: Severity) -> String {
    match format {
        OutputFormat::Plain => plain::format(report, level),
        OutputFormat::Json => json::format(report, level),
        OutputFormat::Yaml => json::format_yaml(report, level),
    }
}
