//! Process table scanning through procfs
//!
//! Only numeric entries directly under `/proc` are read, which lists thread
//! group leaders and never individual threads:
//! - /proc/<pid>/cmdline for the NUL-separated command line
//! - /proc/<pid>/status for the VmRSS line (kB)

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ProcessPattern;
use crate::error::Result;

/// Reads resident sizes of processes matching a pattern
#[derive(Debug, Clone)]
pub struct ProcessTable {
    proc_path: PathBuf,
    own_pid: u32,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::with_proc_path("/proc")
    }

    /// Scan a different procfs root (for testing)
    pub fn with_proc_path(proc_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            own_pid: std::process::id(),
        }
    }

    /// Parse the VmRSS line of a status file, in kB
    pub fn parse_vm_rss_kb(status: &str) -> Option<u64> {
        status
            .lines()
            .find_map(|line| line.strip_prefix("VmRSS:"))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|value| value.parse().ok())
    }

    /// Join a NUL-separated cmdline into a single space-separated string
    pub fn parse_cmdline(raw: &[u8]) -> String {
        raw.split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Resident sizes in bytes of every process whose command line matches
    pub fn matching_rss_bytes(&self, pattern: &ProcessPattern) -> Result<Vec<u64>> {
        let entries = match fs::read_dir(&self.proc_path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %self.proc_path.display(), error = %e, "Process table unavailable");
                return Ok(Vec::new());
            }
        };

        let mut rss = Vec::new();
        for entry in entries {
            let entry = entry?;
            let pid: u32 = match entry.file_name().to_str().and_then(|name| name.parse().ok()) {
                Some(pid) => pid,
                None => continue,
            };
            if pid == self.own_pid {
                continue;
            }
            // Processes may exit mid-scan; unreadable entries are skipped
            if let Some(bytes) = self.read_matching_rss(&entry.path(), pattern) {
                rss.push(bytes);
            }
        }

        Ok(rss)
    }

    fn read_matching_rss(&self, pid_dir: &Path, pattern: &ProcessPattern) -> Option<u64> {
        let cmdline = fs::read(pid_dir.join("cmdline")).ok()?;
        let command_line = Self::parse_cmdline(&cmdline);
        if command_line.is_empty() || !pattern.is_match(&command_line) {
            return None;
        }
        let status = fs::read_to_string(pid_dir.join("status")).ok()?;
        Self::parse_vm_rss_kb(&status).map(|kb| kb * 1024)
    }
}
