pub mod types;

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use types::{AuditConfig, ConfigFile};

const CONFIG_FILE_NAMES: &[&str] = &[".kube-audit.yaml", ".kube-audit.yml", ".kube-audit.toml"];

/// Get the global config file paths (~/.kube-audit.*)
pub fn global_config_paths() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| CONFIG_FILE_NAMES.iter().map(|n| home.join(n)).collect())
        .unwrap_or_default()
}

/// Get the local config file paths (./.kube-audit.*)
pub fn local_config_paths(dir: &Path) -> Vec<PathBuf> {
    CONFIG_FILE_NAMES.iter().map(|n| dir.join(n)).collect()
}

/// Load configuration.
///
/// An explicit path must exist and parse. Otherwise the local config is
/// checked first, then the global one, then defaults apply.
pub fn load_config(path: Option<&Path>) -> Result<AuditConfig> {
    if let Some(path) = path {
        return load_from_file(path);
    }

    let candidates = local_config_paths(Path::new("."))
        .into_iter()
        .chain(global_config_paths());
    for candidate in candidates {
        if candidate.is_file() {
            log::debug!("loading configuration from {}", candidate.display());
            return load_from_file(&candidate);
        }
    }

    Ok(AuditConfig::default())
}

/// Load configuration from a YAML or TOML file (chosen by extension).
pub fn load_from_file(path: &Path) -> Result<AuditConfig> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    Ok(load_from_str(&content, is_toml)?)
}

/// Parse configuration content.
pub fn load_from_str(content: &str, is_toml: bool) -> std::result::Result<AuditConfig, ConfigError> {
    let file: ConfigFile = if is_toml {
        toml::from_str(content).map_err(|e| ConfigError::ParsingFailed(e.to_string()))?
    } else if content.trim().is_empty() {
        ConfigFile::default()
    } else {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParsingFailed(e.to_string()))?
    };
    Ok(file.audit)
}
