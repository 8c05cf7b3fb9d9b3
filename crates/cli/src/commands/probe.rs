//! Show what the resource probe sees on this host

use anyhow::Result;
use serde::Serialize;
use sizer_lib::probe::{ProcessPattern, ResourceProbe};
use sizer_lib::report::{Report, ReportRow};
use sizer_lib::WorkerSample;

use crate::output::{print_report, OutputFormat};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeReport {
    pub total_memory_gb: f64,
    pub cpu_count: u32,
    pub pattern: String,
    pub workers: Option<WorkerSample>,
}

impl Report for ProbeReport {
    fn title(&self) -> String {
        "Host Resources".to_string()
    }

    fn rows(&self) -> Vec<ReportRow> {
        let mut rows = vec![
            ReportRow::new("Total memory", format!("{:.2} GB", self.total_memory_gb)),
            ReportRow::new("CPUs", self.cpu_count.to_string()),
            ReportRow::new("Pattern", self.pattern.clone()),
        ];
        match &self.workers {
            Some(sample) => {
                rows.push(ReportRow::new("Matching processes", sample.process_count.to_string()));
                rows.push(ReportRow::new("Average RSS", format!("{:.2} MB", sample.average_mb)));
            }
            None => rows.push(ReportRow::new("Matching processes", "0")),
        }
        rows
    }

    fn warnings(&self) -> Vec<String> {
        if self.workers.is_none() {
            vec![format!("No running process matched '{}'", self.pattern)]
        } else {
            Vec::new()
        }
    }
}

pub fn inspect(probe: &dyn ResourceProbe, pattern: &ProcessPattern) -> Result<ProbeReport> {
    Ok(ProbeReport {
        total_memory_gb: probe.total_memory_gb()?,
        cpu_count: probe.cpu_count()?,
        pattern: pattern.to_string(),
        workers: probe.sample_workers(pattern)?,
    })
}

pub fn run(probe: &dyn ResourceProbe, pattern: &str, format: OutputFormat) -> Result<()> {
    let pattern = ProcessPattern::new(pattern)?;
    let report = inspect(probe, &pattern)?;
    print_report(&report, format)
}
