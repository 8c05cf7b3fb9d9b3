//! Load-test command

use anyhow::Result;
use sizer_lib::load::{HttpLoadGenerator, LoadGenerator, LoadTestConfig, ProgressiveLoad};
use sizer_lib::probe::ResourceProbe;
use sizer_lib::sizing::RuntimeInspector;
use tracing::info;

use super::worker;
use crate::config::{LoadConfig, ThreadedWorkerConfig};
use crate::output::{print_info, print_report, OutputFormat};

/// Concurrency to drive: the explicit value, or the recommended `max_threads`
pub fn target_concurrency<I: RuntimeInspector>(
    config: &LoadConfig,
    sizing: &ThreadedWorkerConfig,
    probe: &dyn ResourceProbe,
    inspector: I,
) -> Result<u32> {
    if let Some(concurrency) = config.concurrency {
        return Ok(concurrency);
    }
    let sized = worker::size(sizing, probe, inspector)?;
    let concurrency = u32::try_from(sized.max_threads).unwrap_or(u32::MAX);
    info!(concurrency, "Using recommended max_threads as concurrency");
    Ok(concurrency)
}

/// Run a single or progressive load test with `generator`
pub async fn execute<G: LoadGenerator>(
    config: &LoadConfig,
    concurrency: u32,
    generator: G,
    format: OutputFormat,
) -> Result<()> {
    let base = LoadTestConfig::new(&config.url, concurrency, config.duration)?
        .with_timeout(config.timeout);

    if config.progressive {
        print_info(&format!(
            "Progressive load against {} up to {} connections",
            base.url, concurrency
        ));
        let report = ProgressiveLoad::new(generator, config.pause)
            .run(&base, concurrency)
            .await?;
        print_report(&report, format)
    } else {
        print_info(&format!(
            "Loading {} with {} connections for {:.0?}",
            base.url, concurrency, config.duration
        ));
        let report = generator.run(&base).await?;
        print_report(&report, format)
    }
}

pub async fn run<I: RuntimeInspector>(
    config: LoadConfig,
    sizing: ThreadedWorkerConfig,
    probe: &dyn ResourceProbe,
    inspector: I,
    format: OutputFormat,
) -> Result<()> {
    let concurrency = target_concurrency(&config, &sizing, probe, inspector)?;
    execute(&config, concurrency, HttpLoadGenerator::new(), format).await
}
