//! Host resource probing
//!
//! A [`ResourceProbe`] reports total memory, CPU count and the average
//! resident size of worker processes. It performs no sizing. The OS-backed
//! implementation lives in [`SystemProbe`]; [`StaticProbe`] returns fixed
//! values so the sizing path can run without inspecting real processes.

mod procfs;
mod system;

pub use procfs::ProcessTable;
pub use system::SystemProbe;

use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{ensure_non_negative, Result, SizerError};
use crate::models::{ResourceSnapshot, WorkerSample, WorkerSizeSource};
use crate::sizing::round2;

/// Worker size assumed by the threaded model when no worker is running
pub const FALLBACK_WORKER_SIZE_MB: f64 = 50.0;

/// Regular expression matched against a process's full command line
#[derive(Debug, Clone)]
pub struct ProcessPattern {
    regex: Regex,
}

impl ProcessPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(SizerError::validation("process pattern", "must not be empty"));
        }
        let regex = Regex::new(pattern)
            .map_err(|e| SizerError::validation("process pattern", e.to_string()))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, command_line: &str) -> bool {
        self.regex.is_match(command_line)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Display for ProcessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw host measurements
pub trait ResourceProbe {
    /// Total memory in GB, two-decimal precision
    fn total_memory_gb(&self) -> Result<f64>;

    /// Logical CPU count, at least 1
    fn cpu_count(&self) -> Result<u32>;

    /// Average resident size of matching processes, `None` when nothing matches
    fn sample_workers(&self, pattern: &ProcessPattern) -> Result<Option<WorkerSample>>;
}

/// Average resident size in MB (two decimals) over a set of RSS values in bytes
pub fn average_rss_mb(rss_bytes: &[u64]) -> Option<WorkerSample> {
    if rss_bytes.is_empty() {
        return None;
    }
    let total: f64 = rss_bytes.iter().map(|b| *b as f64).sum();
    let average_mb = total / rss_bytes.len() as f64 / (1024.0 * 1024.0);
    Some(WorkerSample {
        process_count: rss_bytes.len(),
        average_mb: round2(average_mb),
    })
}

/// Probe returning fixed values
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    pub total_memory_gb: f64,
    pub cpu_count: u32,
    pub sample: Option<WorkerSample>,
}

impl StaticProbe {
    pub fn new(total_memory_gb: f64, cpu_count: u32, sample: Option<WorkerSample>) -> Self {
        Self {
            total_memory_gb,
            cpu_count,
            sample,
        }
    }
}

impl ResourceProbe for StaticProbe {
    fn total_memory_gb(&self) -> Result<f64> {
        if self.total_memory_gb > 0.0 {
            Ok(self.total_memory_gb)
        } else {
            Err(SizerError::ProbeUnavailable("total memory is zero".to_string()))
        }
    }

    fn cpu_count(&self) -> Result<u32> {
        if self.cpu_count > 0 {
            Ok(self.cpu_count)
        } else {
            Err(SizerError::ProbeUnavailable("no CPUs reported".to_string()))
        }
    }

    fn sample_workers(&self, _pattern: &ProcessPattern) -> Result<Option<WorkerSample>> {
        Ok(self.sample)
    }
}

/// Operator-supplied values that replace probe readings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProbeOverrides {
    pub total_memory_gb: Option<f64>,
    pub cpu_count: Option<u32>,
    pub worker_size_mb: Option<f64>,
}

/// What to do when no process matches the worker pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingWorkers {
    /// Abort with [`SizerError::NoMatchingProcesses`]
    Fatal,
    /// Continue with this worker size and a warning
    Fallback(f64),
}

/// Assemble a [`ResourceSnapshot`] from a probe and operator overrides
pub fn take_snapshot(
    probe: &dyn ResourceProbe,
    pattern: &ProcessPattern,
    overrides: ProbeOverrides,
    missing: MissingWorkers,
) -> Result<ResourceSnapshot> {
    let total_memory_gb = match overrides.total_memory_gb {
        Some(gb) => ensure_non_negative("total memory", gb)?,
        None => probe.total_memory_gb()?,
    };
    let cpu_count = match overrides.cpu_count {
        Some(0) => return Err(SizerError::validation("cpu count", "must be at least 1")),
        Some(cpus) => cpus,
        None => probe.cpu_count()?,
    };

    let (worker_size_mb, worker_source) = match overrides.worker_size_mb {
        Some(mb) => (ensure_non_negative("worker size", mb)?, WorkerSizeSource::Override),
        None => match probe.sample_workers(pattern)? {
            Some(sample) => (
                sample.average_mb,
                WorkerSizeSource::Measured {
                    process_count: sample.process_count,
                },
            ),
            None => match missing {
                MissingWorkers::Fatal => {
                    return Err(SizerError::NoMatchingProcesses {
                        pattern: pattern.to_string(),
                    })
                }
                MissingWorkers::Fallback(mb) => {
                    warn!(
                        pattern = %pattern,
                        fallback_mb = mb,
                        "No running workers matched, using fallback worker size"
                    );
                    (mb, WorkerSizeSource::Fallback)
                }
            },
        },
    };

    let snapshot = ResourceSnapshot {
        total_memory_gb,
        cpu_count,
        worker_size_mb,
        worker_source,
    };
    debug!(?snapshot, "Resource snapshot taken");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> ProcessPattern {
        ProcessPattern::new("php-fpm: pool").unwrap()
    }

    #[test]
    fn test_pattern_validation() {
        assert!(ProcessPattern::new("").is_err());
        assert!(ProcessPattern::new("   ").is_err());
        let err = ProcessPattern::new("php-fpm: pool (").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_VALIDATION);
    }

    #[test]
    fn test_pattern_matching() {
        let pattern = pattern();
        assert!(pattern.is_match("php-fpm: pool www"));
        assert!(!pattern.is_match("php-fpm: master process (/etc/php/8.2/fpm/php-fpm.conf)"));
        assert!(ProcessPattern::new("^frankenphp").unwrap().is_match("frankenphp run"));
    }

    #[test]
    fn test_average_rss_mb() {
        assert_eq!(average_rss_mb(&[]), None);
        let sample = average_rss_mb(&[10 * 1024 * 1024, 20 * 1024 * 1024]).unwrap();
        assert_eq!(sample.process_count, 2);
        assert_eq!(sample.average_mb, 15.0);

        let sample = average_rss_mb(&[8_315_000]).unwrap();
        assert_eq!(sample.average_mb, 7.93);
    }

    #[test]
    fn test_snapshot_from_measurement() {
        let probe = StaticProbe::new(
            0.94,
            1,
            Some(WorkerSample { process_count: 5, average_mb: 7.93 }),
        );
        let snapshot =
            take_snapshot(&probe, &pattern(), ProbeOverrides::default(), MissingWorkers::Fatal)
                .unwrap();
        assert_eq!(snapshot.total_memory_gb, 0.94);
        assert_eq!(snapshot.cpu_count, 1);
        assert_eq!(snapshot.worker_size_mb, 7.93);
        assert_eq!(snapshot.worker_source, WorkerSizeSource::Measured { process_count: 5 });
    }

    #[test]
    fn test_missing_workers_fatal_for_pools() {
        let probe = StaticProbe::new(4.0, 2, None);
        let err =
            take_snapshot(&probe, &pattern(), ProbeOverrides::default(), MissingWorkers::Fatal)
                .unwrap_err();
        assert!(matches!(err, SizerError::NoMatchingProcesses { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_NO_MATCHING_PROCESSES);
    }

    #[test]
    fn test_missing_workers_fallback_for_threads() {
        let probe = StaticProbe::new(4.0, 2, None);
        let snapshot = take_snapshot(
            &probe,
            &pattern(),
            ProbeOverrides::default(),
            MissingWorkers::Fallback(FALLBACK_WORKER_SIZE_MB),
        )
        .unwrap();
        assert_eq!(snapshot.worker_size_mb, 50.0);
        assert_eq!(snapshot.worker_source, WorkerSizeSource::Fallback);
    }

    #[test]
    fn test_probe_unavailable() {
        let probe = StaticProbe::new(0.0, 2, None);
        let err = take_snapshot(
            &probe,
            &pattern(),
            ProbeOverrides::default(),
            MissingWorkers::Fallback(50.0),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_PROBE_UNAVAILABLE);

        let probe = StaticProbe::new(4.0, 0, None);
        let err = take_snapshot(
            &probe,
            &pattern(),
            ProbeOverrides::default(),
            MissingWorkers::Fallback(50.0),
        )
        .unwrap_err();
        assert!(matches!(err, SizerError::ProbeUnavailable(_)));
    }

    #[test]
    fn test_overrides_skip_probe_readings() {
        let probe = StaticProbe::new(0.0, 0, None);
        let overrides = ProbeOverrides {
            total_memory_gb: Some(2.0),
            cpu_count: Some(4),
            worker_size_mb: Some(64.0),
        };
        let snapshot =
            take_snapshot(&probe, &pattern(), overrides, MissingWorkers::Fatal).unwrap();
        assert_eq!(snapshot.total_memory_gb, 2.0);
        assert_eq!(snapshot.cpu_count, 4);
        assert_eq!(snapshot.worker_size_mb, 64.0);
        assert_eq!(snapshot.worker_source, WorkerSizeSource::Override);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let probe = StaticProbe::new(4.0, 2, None);
        let overrides = ProbeOverrides {
            cpu_count: Some(0),
            ..Default::default()
        };
        let err = take_snapshot(&probe, &pattern(), overrides, MissingWorkers::Fatal).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_VALIDATION);

        let overrides = ProbeOverrides {
            worker_size_mb: Some(-1.0),
            ..Default::default()
        };
        let err = take_snapshot(&probe, &pattern(), overrides, MissingWorkers::Fatal).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_VALIDATION);
    }
}
