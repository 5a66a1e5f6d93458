use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Malformed code catalog: {0}")]
    MalformedCatalog(String),

    #[error("Unknown issue code {0}: every emitted code must exist in the catalog")]
    UnknownCode(u16),

    #[error("Catalog is missing codes: {0:?}")]
    MissingCodes(Vec<u16>),

    #[error("Manifest error in {path}: {message}")]
    Manifest { path: String, message: String },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to infer Kubernetes config: {0}")]
    KubeInfer(#[from] kube::config::InferConfigError),

    #[error("Failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} resource(s) reported errors")]
    IssuesFound(usize),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("Configuration parsing failed: {0}")]
    ParsingFailed(String),

    #[error("Invalid exclusion pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid severity level: {0}")]
    InvalidLevel(String),
}

/// A resource kind could not be listed from the cluster or decoded from
/// manifests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to list {kind}: {message}")]
pub struct ListError {
    pub kind: &'static str,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_code_message() {
        let err = AuditError::UnknownCode(4242);
        assert!(err.to_string().contains("4242"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: AuditError = ConfigError::ParsingFailed("bad".to_string()).into();
        assert!(matches!(err, AuditError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: Configuration parsing failed: bad");
    }
}
