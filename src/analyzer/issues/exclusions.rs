//! Compiled exclusion rules.
//!
//! Rule names are matched against resource FQNs, either literally or as a
//! regular expression when prefixed with `rx:`.

use crate::config::types::ExcludeRule;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::BTreeMap;

const REGEX_PREFIX: &str = "rx:";

#[derive(Debug, Clone)]
enum NameMatcher {
    Exact(String),
    Pattern(Regex),
}

impl NameMatcher {
    fn matches(&self, fqn: &str) -> bool {
        match self {
            Self::Exact(name) => name == fqn,
            Self::Pattern(rx) => rx.is_match(fqn),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    matcher: NameMatcher,
    codes: Vec<u16>,
}

/// Exclusion rules grouped by section.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    sections: BTreeMap<String, Vec<CompiledRule>>,
}

impl Exclusions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile the configured rules; an invalid `rx:` pattern is an error.
    pub fn compile(excludes: &BTreeMap<String, Vec<ExcludeRule>>) -> Result<Self, ConfigError> {
        let mut sections = BTreeMap::new();
        for (section, rules) in excludes {
            let compiled = rules
                .iter()
                .map(|rule| {
                    let matcher = match rule.name.strip_prefix(REGEX_PREFIX) {
                        Some(pattern) => NameMatcher::Pattern(Regex::new(pattern).map_err(|e| {
                            ConfigError::InvalidPattern {
                                pattern: pattern.to_string(),
                                message: e.to_string(),
                            }
                        })?),
                        None => NameMatcher::Exact(rule.name.clone()),
                    };
                    Ok(CompiledRule {
                        matcher,
                        codes: rule.codes.clone(),
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            sections.insert(section.to_lowercase(), compiled);
        }
        Ok(Self { sections })
    }

    fn rules(&self, section: &str) -> &[CompiledRule] {
        self.sections.get(section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A rule without codes names this resource.
    pub fn excludes_resource(&self, section: &str, fqn: &str) -> bool {
        self.rules(section)
            .iter()
            .any(|r| r.codes.is_empty() && r.matcher.matches(fqn))
    }

    /// A rule names this resource, either entirely or for this code.
    pub fn excludes_code(&self, section: &str, fqn: &str, code: u16) -> bool {
        self.rules(section)
            .iter()
            .any(|r| (r.codes.is_empty() || r.codes.contains(&code)) && r.matcher.matches(fqn))
    }
}
