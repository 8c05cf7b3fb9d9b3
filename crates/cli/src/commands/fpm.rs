//! Fixed-process pool sizing command

use anyhow::Result;
use sizer_lib::probe::{take_snapshot, MissingWorkers, ResourceProbe};
use sizer_lib::sizing::{FixedProcessModel, FixedProcessResult};
use tracing::info;

use crate::config::FixedProcessConfig;
use crate::output::{print_report, OutputFormat};

/// Measure the pool and compute its sizing
pub fn size(config: &FixedProcessConfig, probe: &dyn ResourceProbe) -> Result<FixedProcessResult> {
    let snapshot = take_snapshot(probe, &config.pattern, config.overrides, MissingWorkers::Fatal)?;
    let result = FixedProcessModel::new()
        .compute(&snapshot, &config.params(), config.mode)
        .with_pool_name(&config.pool_name);

    info!(
        max_children = result.max_children,
        pm = %result.pm,
        "Computed pool sizing"
    );
    Ok(result)
}

/// Print the pool sizing; zero capacity is reported and then treated as a failure
pub fn run(
    config: FixedProcessConfig,
    probe: &dyn ResourceProbe,
    format: OutputFormat,
) -> Result<()> {
    let result = size(&config, probe)?;
    print_report(&result, format)?;

    if !result.has_capacity() {
        anyhow::bail!(
            "no safe capacity: {} MB available cannot hold a {:.2} MB worker",
            result.available_memory_mb,
            result.avg_process_size_mb
        );
    }
    Ok(())
}
