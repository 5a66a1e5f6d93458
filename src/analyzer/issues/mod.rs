//! Findings model: severities, issues, per-resource outcomes and the
//! collector checkers write into.

pub mod collector;
pub mod exclusions;
pub mod types;

pub use collector::Collector;
pub use exclusions::Exclusions;
pub use types::{Issue, Issues, Outcome, Severity, ROOT_GROUP};
