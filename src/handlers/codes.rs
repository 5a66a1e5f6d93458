//! Handler for the `codes` command.

use super::effective_catalog;
use crate::analyzer::catalog::{Catalog, Code};
use crate::analyzer::{OutputFormat, Severity};
use crate::config::types::AuditConfig;
use crate::error::Result;
use colored::Colorize;

/// Handle the `codes` command.
pub fn handle_codes(config: &AuditConfig, format: OutputFormat) -> Result<()> {
    let catalog = effective_catalog(config)?;
    print!("{}", format_codes(&catalog, format)?);
    Ok(())
}

fn format_codes(catalog: &Catalog, format: OutputFormat) -> Result<String> {
    let codes: Vec<&Code> = catalog.iter().collect();
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&codes)? + "\n"),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(&codes)?),
        OutputFormat::Plain => {
            let mut output = String::new();
            for code in codes {
                let id = format!("{:<9}", format!("{}-{}", catalog.prefix(), code.id));
                let severity = format!("{:<5}", code.severity.as_str());
                let severity = match code.severity {
                    Severity::Error => severity.red(),
                    Severity::Warn => severity.yellow(),
                    _ => severity.bright_blue(),
                };
                output.push_str(&format!("{} {} {}\n", id.bold(), severity, code.message));
            }
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_reflect_overrides() {
        colored::control::set_override(false);

        let mut config = AuditConfig::new().override_code(100, 1);
        config.prefix = "AUD".to_string();
        let catalog = effective_catalog(&config).unwrap();

        let plain = format_codes(&catalog, OutputFormat::Plain).unwrap();
        assert!(plain.contains("AUD-100   info  Untagged docker image in use"));

        let json: serde_json::Value =
            serde_json::from_str(&format_codes(&catalog, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json[0]["id"], 100);
        assert_eq!(json[0]["severity"], "info");
    }
}
