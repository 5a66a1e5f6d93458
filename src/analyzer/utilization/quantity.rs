//! Resource quantity parsing and rendering.
//!
//! CPU is normalized to millicores, memory to bytes.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;
use std::sync::LazyLock;

// ============================================================================
// CPU
// ============================================================================

/// Regex for CPU values (e.g., "100m", "0.5", "2", "250000000n")
static CPU_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(n|u|m)?$").unwrap());

/// Parse a CPU value to millicores.
///
/// # Examples
/// - "100m" -> 100
/// - "1.5" -> 1500
/// - "500000000n" -> 500
pub fn parse_cpu_millis(cpu: &str) -> Option<u64> {
    let caps = CPU_REGEX.captures(cpu.trim())?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;

    let millis = match caps.get(2).map(|m| m.as_str()) {
        None => value * 1000.0,
        Some("m") => value,
        Some("u") => value / 1_000.0,
        Some("n") => value / 1_000_000.0,
        Some(_) => return None,
    };
    Some(millis.round() as u64)
}

/// Millicores of a CPU quantity, 0 when unparsable.
pub fn cpu_millis(quantity: &Quantity) -> u64 {
    parse_cpu_millis(&quantity.0).unwrap_or_else(|| {
        log::debug!("unparsable cpu quantity '{}'", quantity.0);
        0
    })
}

/// Render millicores, e.g. `250m`.
pub fn as_millicores(millis: u64) -> String {
    format!("{}m", millis)
}

// ============================================================================
// Memory
// ============================================================================

/// Regex for memory values (e.g., "128Mi", "1Gi", "1.5G", "1000000000")
static MEMORY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)(Ki|Mi|Gi|Ti|Pi|Ei|k|K|M|G|T|P|E)?$").unwrap()
});

/// Parse a memory value to bytes.
///
/// # Examples
/// - "128Mi" -> 134217728
/// - "1G" -> 1000000000
/// - "1024" -> 1024
pub fn parse_memory_bytes(memory: &str) -> Option<u64> {
    let caps = MEMORY_REGEX.captures(memory.trim())?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;

    let multiplier: f64 = match caps.get(2).map(|m| m.as_str()).unwrap_or("") {
        "" => 1.0,
        "Ki" => 1024.0,
        "Mi" => 1024.0_f64.powi(2),
        "Gi" => 1024.0_f64.powi(3),
        "Ti" => 1024.0_f64.powi(4),
        "Pi" => 1024.0_f64.powi(5),
        "Ei" => 1024.0_f64.powi(6),
        // Decimal units
        "k" | "K" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        _ => return None,
    };
    Some((value * multiplier).round() as u64)
}

/// Bytes of a memory quantity, 0 when unparsable.
pub fn memory_bytes(quantity: &Quantity) -> u64 {
    parse_memory_bytes(&quantity.0).unwrap_or_else(|| {
        log::debug!("unparsable memory quantity '{}'", quantity.0);
        0
    })
}

/// Render bytes as whole mebibytes, e.g. `128Mi`.
pub fn as_mebibytes(bytes: u64) -> String {
    format!("{}Mi", bytes / (1024 * 1024))
}

/// Render a percentage with two decimals, e.g. `61.50%`.
pub fn as_percent(value: f64) -> String {
    format!("{:.2}%", value)
}
