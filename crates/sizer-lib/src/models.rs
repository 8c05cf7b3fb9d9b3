//! Core data models for worker sizing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{parse_non_negative, SizerError};

/// Host resources and measured worker footprint, taken once per run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub total_memory_gb: f64,
    pub cpu_count: u32,
    pub worker_size_mb: f64,
    /// How the worker size was obtained
    pub worker_source: WorkerSizeSource,
}

/// Origin of the per-worker memory figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerSizeSource {
    /// Averaged over this many running processes
    Measured { process_count: usize },
    /// Supplied by the operator
    Override,
    /// No process matched; the documented default was used
    Fallback,
}

/// Average resident size of processes matching a pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkerSample {
    pub process_count: usize,
    pub average_mb: f64,
}

/// Caller-supplied sizing inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingParameters {
    pub reserved_memory_gb: f64,
    pub buffer_percent: f64,
    /// Threaded model only
    pub worker_multiplier: f64,
    /// Threaded model only, already resolved from [`Overhead`]
    pub overhead_mb: u64,
}

impl SizingParameters {
    /// Parameters for the fixed-process model, which ignores multiplier and overhead
    pub fn fixed_process(reserved_memory_gb: f64, buffer_percent: f64) -> Self {
        Self {
            reserved_memory_gb,
            buffer_percent,
            worker_multiplier: 0.0,
            overhead_mb: 0,
        }
    }

    pub fn threaded_worker(
        reserved_memory_gb: f64,
        buffer_percent: f64,
        worker_multiplier: f64,
        overhead_mb: u64,
    ) -> Self {
        Self {
            reserved_memory_gb,
            buffer_percent,
            worker_multiplier,
            overhead_mb,
        }
    }
}

/// Process manager mode of a fixed-process pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    #[default]
    Dynamic,
    /// Only `max_children` applies; spare-server settings are suppressed
    Static,
}

impl PoolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Static => "static",
        }
    }
}

impl fmt::Display for PoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolMode {
    type Err = SizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Self::Dynamic),
            "static" => Ok(Self::Static),
            other => Err(SizerError::validation(
                "pool mode",
                format!("'{}' is not one of: dynamic, static", other),
            )),
        }
    }
}

/// Largest fixed overhead accepted, in MB (1 PiB)
pub const MAX_OVERHEAD_MB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Memory overhead for the threaded model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Overhead {
    /// Estimate from the PHP runtime configuration
    #[default]
    Auto,
    /// Fixed figure in MB
    Fixed(u64),
}

impl fmt::Display for Overhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(mb) => write!(f, "{}", mb),
        }
    }
}

impl FromStr for Overhead {
    type Err = SizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        Self::fixed_mb(parse_non_negative("overhead", s)?)
    }
}

impl Overhead {
    /// Fixed overhead from a non-negative MB figure, rounded to whole MB
    pub fn fixed_mb(mb: f64) -> Result<Self, SizerError> {
        if mb > MAX_OVERHEAD_MB {
            return Err(SizerError::validation(
                "overhead",
                format!("{} MB exceeds the maximum of {} MB", mb, MAX_OVERHEAD_MB),
            ));
        }
        Ok(Self::Fixed(mb.round() as u64))
    }
}
