//! Fixed-process pool sizing (PHP-FPM style)
//!
//! Each worker is an independent OS process, so capacity is available memory
//! divided by the measured process size. The spare-server settings are then
//! derived from that single number.

use serde::Serialize;

use super::{available_memory_gb, gb_to_mb, integer_divide_floor};
use crate::models::{PoolMode, ResourceSnapshot, SizingParameters, WorkerSizeSource};
use crate::report::{ConfigSnippet, Report, ReportRow};

/// Spare bounds as fractions of `max_children`, expressed in tenths so the
/// arithmetic stays in integers
const MIN_SPARE_TENTHS: u64 = 1;
const MAX_SPARE_TENTHS: u64 = 3;

/// `floor(value * tenths / 10)` without overflowing for any `value`
fn tenths_floor(value: u64, tenths: u64) -> u64 {
    value / 10 * tenths + value % 10 * tenths / 10
}

/// Pool warmth settings for `pm = dynamic`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolWarmth {
    pub start_servers: u64,
    pub min_spare_servers: u64,
    pub max_spare_servers: u64,
}

impl PoolWarmth {
    /// Derive spare bounds from `max_children`.
    ///
    /// Guarantees `max_spare_servers > min_spare_servers >= 1` for every input.
    pub fn from_max_children(max_children: u64) -> Self {
        let min_spare = tenths_floor(max_children, MIN_SPARE_TENTHS).max(1);
        let mut max_spare = tenths_floor(max_children, MAX_SPARE_TENTHS);
        if max_spare <= min_spare {
            max_spare = min_spare + 1;
        }
        let start_servers = min_spare + (max_spare - min_spare) / 2;

        Self {
            start_servers,
            min_spare_servers: min_spare,
            max_spare_servers: max_spare,
        }
    }
}

/// Output of the fixed-process model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixedProcessResult {
    pub total_memory_gb: f64,
    pub reserved_memory_gb: f64,
    pub buffer_percent: f64,
    pub available_memory_gb: f64,
    pub available_memory_mb: u64,
    pub avg_process_size_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_count: Option<usize>,
    pub pm: PoolMode,
    pub max_children: u64,
    #[serde(flatten)]
    pub pool_warmth: Option<PoolWarmth>,
    #[serde(skip)]
    pub pool_name: String,
}

/// Fixed-process capacity model
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedProcessModel;

impl FixedProcessModel {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(
        &self,
        snapshot: &ResourceSnapshot,
        params: &SizingParameters,
        mode: PoolMode,
    ) -> FixedProcessResult {
        let available_gb = available_memory_gb(
            snapshot.total_memory_gb,
            params.reserved_memory_gb,
            params.buffer_percent,
        );
        let available_mb = gb_to_mb(available_gb);
        let max_children = integer_divide_floor(available_mb as f64, snapshot.worker_size_mb);

        let pool_warmth = match mode {
            PoolMode::Dynamic => Some(PoolWarmth::from_max_children(max_children)),
            PoolMode::Static => None,
        };

        let process_count = match snapshot.worker_source {
            WorkerSizeSource::Measured { process_count } => Some(process_count),
            _ => None,
        };

        FixedProcessResult {
            total_memory_gb: snapshot.total_memory_gb,
            reserved_memory_gb: params.reserved_memory_gb,
            buffer_percent: params.buffer_percent,
            available_memory_gb: available_gb,
            available_memory_mb: available_mb,
            avg_process_size_mb: snapshot.worker_size_mb,
            process_count,
            pm: mode,
            max_children,
            pool_warmth,
            pool_name: "www".to_string(),
        }
    }
}

impl FixedProcessResult {
    /// Pool section name used in the generated snippet
    pub fn with_pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    /// `max_children == 0` means no safe capacity, not success
    pub fn has_capacity(&self) -> bool {
        self.max_children > 0
    }
}

impl Report for FixedProcessResult {
    fn title(&self) -> String {
        "PHP-FPM Pool Sizing".to_string()
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
            ReportRow::new("Avg process size", format!("{:.2} MB", self.avg_process_size_mb)),
        ];
        if let Some(count) = self.process_count {
            rows.push(ReportRow::new("Processes sampled", count.to_string()));
        }
        rows.push(ReportRow::new("pm", self.pm.to_string()));
        rows.push(ReportRow::new("pm.max_children", self.max_children.to_string()));
        if let Some(warmth) = &self.pool_warmth {
            rows.push(ReportRow::new("pm.start_servers", warmth.start_servers.to_string()));
            rows.push(ReportRow::new("pm.min_spare_servers", warmth.min_spare_servers.to_string()));
            rows.push(ReportRow::new("pm.max_spare_servers", warmth.max_spare_servers.to_string()));
        }
        rows
    }

    fn warnings(&self) -> Vec<String> {
        if self.has_capacity() {
            Vec::new()
        } else {
            vec![
                "No safe capacity: available memory does not fit a single worker process"
                    .to_string(),
            ]
        }
    }

    fn config_snippet(&self) -> Option<ConfigSnippet> {
        let mut body = format!(
            "[{}]\npm = {}\npm.max_children = {}\n",
            self.pool_name, self.pm, self.max_children
        );
        if let Some(warmth) = &self.pool_warmth {
            body.push_str(&format!(
                "pm.start_servers = {}\npm.min_spare_servers = {}\npm.max_spare_servers = {}\n",
                warmth.start_servers, warmth.min_spare_servers, warmth.max_spare_servers
            ));
        }
        Some(ConfigSnippet::new(
            format!("Pool configuration (php-fpm.d/{}.conf)", self.pool_name),
            body,
        ))
    }
}
