//! Issue collector.
//!
//! Each checker owns one collector. Codes are formatted through the shared
//! catalog and recorded against a resource id, optionally within a
//! sub-group such as a container name.

use super::exclusions::Exclusions;
use super::types::{Issue, Outcome, Severity, ROOT_GROUP};
use crate::analyzer::catalog::Catalog;
use crate::error::{AuditError, Result};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Collector {
    section: &'static str,
    catalog: Arc<Catalog>,
    exclusions: Arc<Exclusions>,
    outcome: Outcome,
}

impl Collector {
    pub fn new(section: &'static str, catalog: Arc<Catalog>, exclusions: Arc<Exclusions>) -> Self {
        Self {
            section,
            catalog,
            exclusions,
            outcome: Outcome::new(),
        }
    }

    pub fn section(&self) -> &'static str {
        self.section
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    /// Mark a resource as visited with an empty issue list.
    pub fn init_outcome(&mut self, id: &str) {
        self.outcome.reset(id);
    }

    /// Remove a resource from the outcome.
    pub fn clear_outcome(&mut self, id: &str) {
        self.outcome.remove(id);
    }

    /// Record a code against the resource itself.
    pub fn add_code(&mut self, id: &str, code: u16, args: &[&dyn fmt::Display]) -> Result<()> {
        self.add_sub_code(id, ROOT_GROUP, code, args)
    }

    /// Record a code against a sub-group of the resource.
    pub fn add_sub_code(
        &mut self,
        id: &str,
        group: &str,
        code: u16,
        args: &[&dyn fmt::Display],
    ) -> Result<()> {
        let severity = self
            .catalog
            .get(code)
            .map(|c| c.severity)
            .ok_or(AuditError::UnknownCode(code))?;
        if self.exclusions.excludes_code(self.section, id, code) {
            log::trace!("{}: code {} excluded for {}", self.section, code, id);
            return Ok(());
        }
        let message = self.catalog.format(code, args)?;
        self.outcome.push(id, Issue::new(group, severity, message));
        Ok(())
    }

    /// Record a raw error against the resource.
    pub fn add_err(&mut self, id: &str, err: &dyn fmt::Display) {
        log::warn!("{}: {}: {}", self.section, id, err);
        self.outcome
            .push(id, Issue::root(Severity::Error, err.to_string()));
    }

    pub fn no_concerns(&self, id: &str) -> bool {
        self.outcome.get(id).is_none_or(|issues| issues.is_empty())
    }

    pub fn max_severity(&self, id: &str) -> Severity {
        self.outcome.max_severity(id)
    }

    /// Drop a clean resource from the outcome when an exclusion rule names it.
    pub fn clear_if_excluded(&mut self, id: &str) {
        if self.no_concerns(id) && self.exclusions.excludes_resource(self.section, id) {
            self.clear_outcome(id);
        }
    }
}
