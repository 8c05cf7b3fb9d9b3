//! OS-backed resource probe
//!
//! Total memory and CPU count come from sysinfo; worker sizes come from the
//! procfs process table.

use sysinfo::System;
use tracing::debug;

use super::{average_rss_mb, ProcessPattern, ProcessTable, ResourceProbe};
use crate::error::{Result, SizerError};
use crate::models::WorkerSample;
use crate::sizing::round2;

/// Reads memory, CPUs and the process table of the current host
pub struct SystemProbe {
    system: System,
    processes: ProcessTable,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::with_process_table(ProcessTable::new())
    }

    pub fn with_process_table(processes: ProcessTable) -> Self {
        // Only memory and CPUs come from sysinfo; processes are read from procfs
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu();
        Self { system, processes }
    }
}

impl ResourceProbe for SystemProbe {
    fn total_memory_gb(&self) -> Result<f64> {
        let total_mib = self.system.total_memory() / (1024 * 1024);
        if total_mib == 0 {
            return Err(SizerError::ProbeUnavailable(
                "could not determine total memory".to_string(),
            ));
        }
        Ok(round2(total_mib as f64 / 1024.0))
    }

    fn cpu_count(&self) -> Result<u32> {
        let cpus = self.system.cpus().len();
        if cpus == 0 {
            return Err(SizerError::ProbeUnavailable(
                "could not determine CPU count".to_string(),
            ));
        }
        Ok(cpus as u32)
    }

    fn sample_workers(&self, pattern: &ProcessPattern) -> Result<Option<WorkerSample>> {
        let rss = self.processes.matching_rss_bytes(pattern)?;
        let sample = average_rss_mb(&rss);
        debug!(pattern = %pattern, matched = rss.len(), ?sample, "Sampled worker processes");
        Ok(sample)
    }
}
