//! Allocation verdicts and burst projection.

use crate::config::types::Thresholds;

/// Verdict of comparing usage against requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// Usage exceeds requests by more than the under threshold.
    Under,
    /// Usage is a small fraction of requests.
    Over,
}

/// Classify a current/requested percentage.
///
/// A ratio of 0 means no usage data and yields no verdict.
pub fn classify(ratio: f64, thresholds: &Thresholds) -> Option<Allocation> {
    if ratio > f64::from(thresholds.under_percent) {
        Some(Allocation::Under)
    } else if ratio > 0.0 && ratio < f64::from(thresholds.over_percent) {
        Some(Allocation::Over)
    } else {
        None
    }
}

/// Amount by which fanning a workload out to its maximum replica count
/// would exceed cluster capacity.
///
/// Every replica, current or projected, contributes `per_replica`.
pub fn burst_overflow(per_replica: u64, current: u32, max: u32, capacity: u64) -> Option<u64> {
    let replicas = u64::from(current.max(max));
    let projected = per_replica.saturating_mul(replicas);
    (projected > capacity).then(|| projected - capacity)
}
