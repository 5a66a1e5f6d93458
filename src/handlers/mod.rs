// Handler modules
pub mod codes;
pub mod scan;

// Re-export all handler functions
pub use codes::handle_codes;
pub use scan::{ScanOptions, handle_scan};

use crate::analyzer::Catalog;
use crate::config::types::AuditConfig;
use crate::error::Result;

/// The built-in catalog with the configured prefix and severity overrides.
pub(crate) fn effective_catalog(config: &AuditConfig) -> Result<Catalog> {
    let mut catalog = Catalog::builtin()?.with_prefix(config.prefix.clone());
    catalog.refine(&config.codes);
    Ok(catalog)
}
