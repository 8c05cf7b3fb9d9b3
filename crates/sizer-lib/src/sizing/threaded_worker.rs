//! Threaded-worker sizing (FrankenPHP style)
//!
//! A few long-lived worker processes each run several threads. The worker
//! count is the smaller of a CPU estimate and a memory estimate, never below
//! [`MIN_WORKERS`]; thread settings follow from it by fixed ratios.

use serde::Serialize;

use super::{
    available_memory_gb, clamp_non_negative, gb_to_mb, integer_divide_floor, round2,
    OverheadEstimate,
};
use crate::models::{ResourceSnapshot, SizingParameters, WorkerSizeSource};
use crate::report::{ConfigSnippet, Report, ReportRow};

/// Floor on the recommended worker count
pub const MIN_WORKERS: u64 = 2;

/// Threads started per worker
const THREADS_PER_WORKER: u64 = 2;

/// Ratio of `max_threads` to `num_threads`
const MAX_THREADS_FACTOR: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimatedMemory {
    pub worker_memory_mb: f64,
    pub overhead_mb: u64,
    pub total_mb: f64,
}

/// Settings for the `frankenphp` global option block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaddyfileSettings {
    pub num_threads: u64,
    pub max_threads: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_num: Option<u64>,
}

/// Output of the threaded-worker model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadedWorkerResult {
    pub total_memory_gb: f64,
    pub reserved_memory_gb: f64,
    pub buffer_percent: f64,
    pub cpu_count: u32,
    pub worker_multiplier: f64,
    pub available_memory_gb: f64,
    pub available_memory_mb: u64,
    pub overhead_mb: u64,
    pub usable_memory_mb: u64,
    pub avg_worker_size_mb: f64,
    pub worker_size_source: WorkerSizeSource,
    pub cpu_based_workers: u64,
    pub memory_based_workers: u64,
    pub recommended_workers: u64,
    pub num_threads: u64,
    pub max_threads: u64,
    pub estimated_memory: EstimatedMemory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overhead_estimate: Option<OverheadEstimate>,
    pub caddyfile: CaddyfileSettings,
}

/// Threaded-worker capacity model
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadedWorkerModel;

impl ThreadedWorkerModel {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(
        &self,
        snapshot: &ResourceSnapshot,
        params: &SizingParameters,
    ) -> ThreadedWorkerResult {
        let available_gb = available_memory_gb(
            snapshot.total_memory_gb,
            params.reserved_memory_gb,
            params.buffer_percent,
        );
        let available_mb = gb_to_mb(available_gb);
        let usable_mb = available_mb.saturating_sub(params.overhead_mb);

        let cpu_estimate = (snapshot.cpu_count as f64 * params.worker_multiplier).floor();
        let cpu_based_workers = clamp_non_negative(cpu_estimate) as u64;
        let memory_based_workers = integer_divide_floor(usable_mb as f64, snapshot.worker_size_mb);
        let recommended_workers = cpu_based_workers.min(memory_based_workers).max(MIN_WORKERS);

        let num_threads = recommended_workers.saturating_mul(THREADS_PER_WORKER);
        let max_threads = num_threads.saturating_mul(MAX_THREADS_FACTOR);

        let worker_memory_mb = round2(recommended_workers as f64 * snapshot.worker_size_mb);

        ThreadedWorkerResult {
            total_memory_gb: snapshot.total_memory_gb,
            reserved_memory_gb: params.reserved_memory_gb,
            buffer_percent: params.buffer_percent,
            cpu_count: snapshot.cpu_count,
            worker_multiplier: params.worker_multiplier,
            available_memory_gb: available_gb,
            available_memory_mb: available_mb,
            overhead_mb: params.overhead_mb,
            usable_memory_mb: usable_mb,
            avg_worker_size_mb: snapshot.worker_size_mb,
            worker_size_source: snapshot.worker_source,
            cpu_based_workers,
            memory_based_workers,
            recommended_workers,
            num_threads,
            max_threads,
            estimated_memory: EstimatedMemory {
                worker_memory_mb,
                overhead_mb: params.overhead_mb,
                total_mb: round2(worker_memory_mb + params.overhead_mb as f64),
            },
            overhead_estimate: None,
            caddyfile: CaddyfileSettings {
                num_threads,
                max_threads,
                worker_file: None,
                worker_num: None,
            },
        }
    }
}

impl ThreadedWorkerResult {
    /// Attach the breakdown behind an automatic overhead figure
    pub fn with_overhead_estimate(mut self, estimate: OverheadEstimate) -> Self {
        self.overhead_estimate = Some(estimate);
        self
    }

    /// Emit a `worker` block running `file` with the recommended worker count
    pub fn with_worker_script(mut self, file: impl Into<String>) -> Self {
        self.caddyfile.worker_file = Some(file.into());
        self.caddyfile.worker_num = Some(self.recommended_workers);
        self
    }

    /// True when resources alone would support fewer than [`MIN_WORKERS`]
    pub fn is_floored(&self) -> bool {
        self.cpu_based_workers.min(self.memory_based_workers) < MIN_WORKERS
    }
}

impl Report for ThreadedWorkerResult {
    fn title(&self) -> String {
        "FrankenPHP Worker Sizing".to_string()
    }

    fn rows(&self) -> Vec<ReportRow> {
        let mut rows = vec![
            ReportRow::new("Total memory", format!("{:.2} GB", self.total_memory_gb)),
            ReportRow::new("Reserved memory", format!("{:.2} GB", self.reserved_memory_gb)),
            ReportRow::new("Safety buffer", format!("{}%", self.buffer_percent)),
            ReportRow::new(
                "Available memory",
                format!("{:.2} GB ({} MB)", self.available_memory_gb, self.available_memory_mb),
            ),
            ReportRow::new("Overhead", format!("{} MB", self.overhead_mb)),
        ];
        if let Some(estimate) = &self.overhead_estimate {
            let opcache_origin = if estimate.opcache_detected { "detected" } else { "default" };
            rows.push(ReportRow::new(
                "  opcache",
                format!("{} MB ({})", estimate.opcache_mb, opcache_origin),
            ));
            rows.push(ReportRow::new("  runtime", format!("{} MB", estimate.runtime_mb)));
            rows.push(ReportRow::new("  cache/db", format!("{} MB", estimate.cache_mb)));
        }
        rows.extend([
            ReportRow::new("Usable memory", format!("{} MB", self.usable_memory_mb)),
            ReportRow::new("Avg worker size", format!("{:.2} MB", self.avg_worker_size_mb)),
            ReportRow::new("CPUs", self.cpu_count.to_string()),
            ReportRow::new("Workers per CPU", self.worker_multiplier.to_string()),
            ReportRow::new("CPU-based workers", self.cpu_based_workers.to_string()),
            ReportRow::new("Memory-based workers", self.memory_based_workers.to_string()),
            ReportRow::new("Recommended workers", self.recommended_workers.to_string()),
            ReportRow::new("num_threads", self.num_threads.to_string()),
            ReportRow::new("max_threads", self.max_threads.to_string()),
            ReportRow::new(
                "Estimated worker memory",
                format!("{:.2} MB", self.estimated_memory.worker_memory_mb),
            ),
            ReportRow::new(
                "Estimated total memory",
                format!("{:.2} MB", self.estimated_memory.total_mb),
            ),
        ]);
        rows
    }

    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.worker_size_source == WorkerSizeSource::Fallback {
            warnings.push(format!(
                "No running workers found; assumed {:.0} MB per worker",
                self.avg_worker_size_mb
            ));
        }
        if self.is_floored() {
            warnings.push(format!(
                "Resources support fewer than {} workers; recommending the minimum of {}",
                MIN_WORKERS, MIN_WORKERS
            ));
        }
        warnings
    }

    fn config_snippet(&self) -> Option<ConfigSnippet> {
        let mut body = format!(
            "{{\n\tfrankenphp {{\n\t\tnum_threads {}\n\t\tmax_threads {}\n",
            self.caddyfile.num_threads, self.caddyfile.max_threads
        );
        if let (Some(file), Some(num)) = (&self.caddyfile.worker_file, self.caddyfile.worker_num) {
            body.push_str(&format!(
                "\t\tworker {{\n\t\t\tfile {}\n\t\t\tnum {}\n\t\t}}\n",
                file, num
            ));
        }
        body.push_str("\t}\n}\n");
        Some(ConfigSnippet::new("Caddyfile global options", body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total_gb: f64, cpus: u32, worker_mb: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            total_memory_gb: total_gb,
            cpu_count: cpus,
            worker_size_mb: worker_mb,
            worker_source: WorkerSizeSource::Measured { process_count: 2 },
        }
    }

    #[test]
    fn test_scenario_single_cpu_host() {
        let result = ThreadedWorkerModel::new().compute(
            &snapshot(0.94, 1, 50.0),
            &SizingParameters::threaded_worker(0.2, 10.0, 2.0, 278),
        );

        assert_eq!(result.available_memory_mb, 686);
        assert_eq!(result.usable_memory_mb, 408);
        assert_eq!(result.cpu_based_workers, 2);
        assert_eq!(result.memory_based_workers, 8);
        assert_eq!(result.recommended_workers, 2);
        assert_eq!(result.num_threads, 4);
        assert_eq!(result.max_threads, 8);
        assert_eq!(result.estimated_memory.worker_memory_mb, 100.0);
        assert_eq!(result.estimated_memory.total_mb, 378.0);
        assert!(!result.is_floored());
    }

    #[test]
    fn test_scenario_floor_case() {
        let result = ThreadedWorkerModel::new().compute(
            &snapshot(0.5, 1, 100.0),
            &SizingParameters::threaded_worker(0.45, 50.0, 1.0, 50),
        );

        assert_eq!(result.usable_memory_mb, 0);
        assert_eq!(result.memory_based_workers, 0);
        assert_eq!(result.cpu_based_workers, 1);
        assert_eq!(result.recommended_workers, 2);
        assert!(result.is_floored());
        assert!(result.warnings().iter().any(|w| w.contains("minimum")));
    }

    #[test]
    fn test_floor_with_zero_estimates() {
        let result = ThreadedWorkerModel::new().compute(
            &snapshot(0.0, 1, 0.0),
            &SizingParameters::threaded_worker(0.0, 10.0, 0.0, 0),
        );
        assert_eq!(result.cpu_based_workers, 0);
        assert_eq!(result.memory_based_workers, 0);
        assert_eq!(result.recommended_workers, MIN_WORKERS);
        assert_eq!(result.num_threads, 4);
        assert_eq!(result.max_threads, 8);
    }

    #[test]
    fn test_conservative_selection() {
        let model = ThreadedWorkerModel::new();
        for cpus in 1..=16 {
            for total in [1.0, 2.0, 4.0, 8.0, 32.0] {
                let result = model.compute(
                    &snapshot(total, cpus, 64.0),
                    &SizingParameters::threaded_worker(0.5, 10.0, 2.0, 278),
                );
                let lower = result.cpu_based_workers.min(result.memory_based_workers);
                if lower >= MIN_WORKERS {
                    assert_eq!(result.recommended_workers, lower);
                } else {
                    assert_eq!(result.recommended_workers, MIN_WORKERS);
                }
                assert_eq!(result.num_threads, 2 * result.recommended_workers);
                assert_eq!(result.max_threads, 2 * result.num_threads);
            }
        }
    }

    #[test]
    fn test_tiny_worker_size_saturates_thread_counts() {
        let result = ThreadedWorkerModel::new().compute(
            &snapshot(100.0, 4, 1e-20),
            &SizingParameters::threaded_worker(1.0, 10.0, 1e30, 0),
        );

        assert_eq!(result.memory_based_workers, u64::MAX);
        assert_eq!(result.recommended_workers, u64::MAX);
        assert_eq!(result.num_threads, u64::MAX);
        assert_eq!(result.max_threads, u64::MAX);
        assert_eq!(result.caddyfile.max_threads, u64::MAX);
    }

    #[test]
    fn test_cpu_estimate_truncates() {
        let result = ThreadedWorkerModel::new().compute(
            &snapshot(64.0, 3, 10.0),
            &SizingParameters::threaded_worker(0.0, 0.0, 1.5, 0),
        );
        assert_eq!(result.cpu_based_workers, 4);
        assert_eq!(result.recommended_workers, 4);
    }

    #[test]
    fn test_worker_counts_monotonic_in_total_memory() {
        let model = ThreadedWorkerModel::new();
        let params = SizingParameters::threaded_worker(0.5, 10.0, 4.0, 278);
        let mut previous = (0, 0, 0);
        for step in 0..100 {
            let total = step as f64 * 0.25;
            let result = model.compute(&snapshot(total, 8, 40.0), &params);
            let current = (
                result.usable_memory_mb,
                result.memory_based_workers,
                result.recommended_workers,
            );
            assert!(current.0 >= previous.0);
            assert!(current.1 >= previous.1);
            assert!(current.2 >= previous.2);
            previous = current;
        }
    }

    #[test]
    fn test_worker_counts_monotonic_in_buffer() {
        let model = ThreadedWorkerModel::new();
        let mut previous = u64::MAX;
        for buffer in 0..=110 {
            let params = SizingParameters::threaded_worker(0.5, buffer as f64, 4.0, 278);
            let result = model.compute(&snapshot(16.0, 8, 40.0), &params);
            assert!(result.memory_based_workers <= previous);
            previous = result.memory_based_workers;
        }
    }

    #[test]
    fn test_json_groups_estimates_and_caddyfile() {
        let result = ThreadedWorkerModel::new().compute(
            &snapshot(0.94, 1, 50.0),
            &SizingParameters::threaded_worker(0.2, 10.0, 2.0, 278),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["estimated_memory"]["overhead_mb"], 278);
        assert_eq!(json["caddyfile"]["num_threads"], 4);
        assert!(json["caddyfile"].get("worker_file").is_none());
        assert!(json.get("overhead_estimate").is_none());

        let with_worker = result.with_worker_script("public/index.php");
        let json = serde_json::to_value(&with_worker).unwrap();
        assert_eq!(json["caddyfile"]["worker_file"], "public/index.php");
        assert_eq!(json["caddyfile"]["worker_num"], 2);
    }

    #[test]
    fn test_caddyfile_snippet() {
        let result = ThreadedWorkerModel::new()
            .compute(
                &snapshot(0.94, 1, 50.0),
                &SizingParameters::threaded_worker(0.2, 10.0, 2.0, 278),
            )
            .with_worker_script("/app/public/index.php");
        let body = result.config_snippet().unwrap().body;
        assert_eq!(
            body,
            concat!(
                "{\n\tfrankenphp {\n\t\tnum_threads 4\n\t\tmax_threads 8\n",
                "\t\tworker {\n\t\t\tfile /app/public/index.php\n\t\t\tnum 2\n\t\t}\n",
                "\t}\n}\n"
            )
        );
    }

    #[test]
    fn test_fallback_worker_size_warns() {
        let mut snap = snapshot(4.0, 2, 50.0);
        snap.worker_source = WorkerSizeSource::Fallback;
        let result = ThreadedWorkerModel::new()
            .compute(&snap, &SizingParameters::threaded_worker(0.5, 10.0, 2.0, 278));
        assert!(result.warnings().iter().any(|w| w.contains("50 MB")));
    }
}
