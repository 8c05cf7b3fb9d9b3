//! Memory overhead estimation for the threaded-worker model
//!
//! Overhead is memory held by supporting components (opcode cache, the
//! runtime itself, caches and database clients) that no single worker owns.

use serde::Serialize;
use std::process::Command;
use tracing::{debug, warn};

/// Opcode cache size assumed when the runtime cannot be queried
pub const DEFAULT_OPCACHE_MB: u64 = 128;

/// Fixed estimate for the server runtime
pub const RUNTIME_ESTIMATE_MB: u64 = 50;

/// Fixed estimate for application caches and database connections
pub const CACHE_ESTIMATE_MB: u64 = 100;

/// Read access to the PHP runtime configuration
pub trait RuntimeInspector {
    /// Raw value of an ini directive, or `None` when the runtime is not available
    fn ini_value(&self, directive: &str) -> Option<String>;
}

/// Queries the `php` binary on `PATH`
#[derive(Debug, Clone)]
pub struct PhpCliInspector {
    binary: String,
}

impl Default for PhpCliInspector {
    fn default() -> Self {
        Self::new("php")
    }
}

impl PhpCliInspector {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl RuntimeInspector for PhpCliInspector {
    fn ini_value(&self, directive: &str) -> Option<String> {
        let script = format!("echo ini_get('{}');", directive);
        let output = match Command::new(&self.binary).args(["-r", &script]).output() {
            Ok(output) => output,
            Err(e) => {
                debug!(binary = %self.binary, error = %e, "PHP runtime not available");
                return None;
            }
        };

        if !output.status.success() {
            warn!(binary = %self.binary, status = ?output.status, "PHP runtime query failed");
            return None;
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// Breakdown of an automatic overhead estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverheadEstimate {
    pub opcache_mb: u64,
    pub opcache_detected: bool,
    pub runtime_mb: u64,
    pub cache_mb: u64,
}

impl OverheadEstimate {
    pub fn total_mb(&self) -> u64 {
        self.opcache_mb + self.runtime_mb + self.cache_mb
    }
}

/// Builds an [`OverheadEstimate`] from the runtime's opcache configuration
pub struct OverheadEstimator<I> {
    inspector: I,
    runtime_mb: u64,
    cache_mb: u64,
}

impl<I: RuntimeInspector> OverheadEstimator<I> {
    pub fn new(inspector: I) -> Self {
        Self {
            inspector,
            runtime_mb: RUNTIME_ESTIMATE_MB,
            cache_mb: CACHE_ESTIMATE_MB,
        }
    }

    /// Override the fixed runtime and cache estimates
    pub fn with_estimates(mut self, runtime_mb: u64, cache_mb: u64) -> Self {
        self.runtime_mb = runtime_mb;
        self.cache_mb = cache_mb;
        self
    }

    pub fn estimate(&self) -> OverheadEstimate {
        let detected = self
            .inspector
            .ini_value("opcache.memory_consumption")
            .and_then(|raw| parse_ini_megabytes(&raw))
            .filter(|mb| *mb > 0);

        debug!(opcache_mb = ?detected, "Opcache memory consumption");

        OverheadEstimate {
            opcache_mb: detected.unwrap_or(DEFAULT_OPCACHE_MB),
            opcache_detected: detected.is_some(),
            runtime_mb: self.runtime_mb,
            cache_mb: self.cache_mb,
        }
    }
}

/// Parse an ini size value into MB.
///
/// `opcache.memory_consumption` is expressed in megabytes, so a bare number
/// is MB. PHP shorthand suffixes `K`, `M` and `G` are honored.
pub fn parse_ini_megabytes(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c.to_ascii_uppercase())),
        Some(_) => (raw, None),
        None => return None,
    };
    let value: u64 = digits.trim().parse().ok()?;

    match unit {
        None | Some('M') => Some(value),
        Some('K') => Some(value / 1024),
        Some('G') => value.checked_mul(1024),
        Some(_) => None,
    }
}
