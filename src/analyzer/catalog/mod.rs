//! Severity catalog: the table of issue codes.
//!
//! Each code maps a numeric id to a message template and a default severity.
//! The built-in table ships inside the binary; a configuration file may raise
//! or lower the severity of individual codes but never their messages.

pub mod codes;

use crate::analyzer::issues::Severity;
use crate::config::types::CodeOverride;
use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix rendered in front of every formatted code (`[POP-100] ...`).
pub const DEFAULT_PREFIX: &str = "POP";

const BUILTIN_CATALOG: &str = include_str!("codes.yaml");

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Code {
    pub id: u16,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Deserialize)]
struct RawCode {
    id: u16,
    message: String,
    severity: u8,
}

/// Immutable-after-refinement code table.
#[derive(Debug, Clone)]
pub struct Catalog {
    prefix: String,
    codes: BTreeMap<u16, Code>,
}

impl Catalog {
    /// Parse a YAML catalog: a sequence of `{id, message, severity}` entries
    /// with severities in `1..=3`. A duplicated id keeps its last entry.
    pub fn load(source: &str) -> Result<Self> {
        let raw: Vec<RawCode> = serde_yaml::from_str(source)
            .map_err(|e| AuditError::MalformedCatalog(e.to_string()))?;

        let mut codes = BTreeMap::new();
        for entry in raw {
            let severity = Severity::from_level(entry.severity)
                .filter(|s| *s >= Severity::Info)
                .ok_or_else(|| {
                    AuditError::MalformedCatalog(format!(
                        "code {} has invalid severity {}",
                        entry.id, entry.severity
                    ))
                })?;
            codes.insert(
                entry.id,
                Code {
                    id: entry.id,
                    message: entry.message,
                    severity,
                },
            );
        }

        Ok(Self {
            prefix: DEFAULT_PREFIX.to_string(),
            codes,
        })
    }

    /// The catalog embedded in the binary, validated against every code the
    /// checkers can emit.
    pub fn builtin() -> Result<Self> {
        let catalog = Self::load(BUILTIN_CATALOG)?;
        catalog.validate(codes::ALL)?;
        Ok(catalog)
    }

    /// Replace the rendered prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Apply severity overrides. Only `Info..=Error` is accepted; unknown ids
    /// and out-of-range levels leave the default in place.
    pub fn refine(&mut self, overrides: &BTreeMap<u16, CodeOverride>) {
        for (id, over) in overrides {
            let Some(code) = self.codes.get_mut(id) else {
                log::debug!("ignoring severity override for unknown code {}", id);
                continue;
            };
            match Severity::from_level(over.severity) {
                Some(severity) if severity >= Severity::Info => code.severity = severity,
                _ => log::warn!(
                    "ignoring invalid severity {} for code {}",
                    over.severity,
                    id
                ),
            }
        }
    }

    pub fn get(&self, id: u16) -> Option<&Code> {
        self.codes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Code> {
        self.codes.values()
    }

    /// Render `[PREFIX-<id>] <message>` with the arguments substituted.
    pub fn format(&self, id: u16, args: &[&dyn fmt::Display]) -> Result<String> {
        let code = self.get(id).ok_or(AuditError::UnknownCode(id))?;
        Ok(format!(
            "[{}-{}] {}",
            self.prefix,
            id,
            render_template(&code.message, args)
        ))
    }

    /// Ensure every id in `ids` is present.
    pub fn validate(&self, ids: &[u16]) -> Result<()> {
        let missing: Vec<u16> = ids
            .iter()
            .copied()
            .filter(|id| !self.codes.contains_key(id))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuditError::MissingCodes(missing))
        }
    }
}

/// Substitute printf-style verbs: `%s`, `%d` and `%v` take the display form,
/// `%q` the quoted form, `%%` is a literal percent sign.
fn render_template(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut args = args.iter();
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'd' | 'v')) => match args.next() {
                Some(arg) => out.push_str(&arg.to_string()),
                None => out.push_str(&format!("%!{}(MISSING)", verb)),
            },
            Some('q') => match args.next() {
                Some(arg) => out.push_str(&format!("{:?}", arg.to_string())),
                None => out.push_str("%!q(MISSING)"),
            },
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
- id: 100
  message: Untagged docker image in use
  severity: 3
- id: 401
  message: Key %q used? Unable to locate key reference
  severity: 1
"#;

    #[test]
    fn test_load_and_format() {
        let catalog = Catalog::load(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.format(100, &[]).unwrap(),
            "[POP-100] Untagged docker image in use"
        );
        assert_eq!(catalog.get(100).unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_format_quoted_arg() {
        let catalog = Catalog::load(SAMPLE).unwrap();
        assert_eq!(
            catalog.format(401, &[&"k2"]).unwrap(),
            "[POP-401] Key \"k2\" used? Unable to locate key reference"
        );
    }

    #[test]
    fn test_format_unknown_code_is_error() {
        let catalog = Catalog::load(SAMPLE).unwrap();
        let err = catalog.format(999, &[]).unwrap_err();
        assert!(matches!(err, AuditError::UnknownCode(999)));
    }

    #[test]
    fn test_malformed_catalog() {
        assert!(matches!(
            Catalog::load("not: [a, list"),
            Err(AuditError::MalformedCatalog(_))
        ));
        let bad_severity = "- id: 1\n  message: x\n  severity: 7\n";
        assert!(matches!(
            Catalog::load(bad_severity),
            Err(AuditError::MalformedCatalog(_))
        ));
        let ok_severity = "- id: 1\n  message: x\n  severity: 0\n";
        assert!(Catalog::load(ok_severity).is_err());
    }

    #[test]
    fn test_duplicate_id_last_wins() {
        let dup = "- id: 7\n  message: first\n  severity: 1\n- id: 7\n  message: second\n  severity: 2\n";
        let catalog = Catalog::load(dup).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(7).unwrap().message, "second");
        assert_eq!(catalog.get(7).unwrap().severity, Severity::Warn);
    }

    #[test]
    fn test_refine_bounds() {
        let mut catalog = Catalog::load(SAMPLE).unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert(100, CodeOverride { severity: 1 });
        overrides.insert(401, CodeOverride { severity: 0 });
        overrides.insert(555, CodeOverride { severity: 2 });
        catalog.refine(&overrides);

        assert_eq!(catalog.get(100).unwrap().severity, Severity::Info);
        assert_eq!(catalog.get(401).unwrap().severity, Severity::Info);
        assert!(catalog.get(555).is_none());

        overrides.clear();
        overrides.insert(401, CodeOverride { severity: 9 });
        catalog.refine(&overrides);
        assert_eq!(catalog.get(401).unwrap().severity, Severity::Info);
    }

    #[test]
    fn test_builtin_covers_every_code() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.validate(codes::ALL).is_ok());
        assert_eq!(catalog.len(), codes::ALL.len());
    }

    #[test]
    fn test_validate_reports_missing() {
        let catalog = Catalog::load(SAMPLE).unwrap();
        match catalog.validate(&[100, 300, 301]) {
            Err(AuditError::MissingCodes(missing)) => assert_eq!(missing, vec![300, 301]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_render_template() {
        assert_eq!(render_template("a %d b %s", &[&1, &"x"]), "a 1 b x");
        assert_eq!(render_template("100%%", &[]), "100%");
        assert_eq!(render_template("%s", &[]), "%!s(MISSING)");
        assert_eq!(render_template("%x", &[]), "%x");
    }

    #[test]
    fn test_custom_prefix() {
        let catalog = Catalog::load(SAMPLE).unwrap().with_prefix("AUD");
        assert_eq!(
            catalog.format(100, &[]).unwrap(),
            "[AUD-100] Untagged docker image in use"
        );
    }
}
