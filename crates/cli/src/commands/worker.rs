//! Threaded-worker sizing command

use anyhow::Result;
use sizer_lib::probe::{take_snapshot, MissingWorkers, ResourceProbe, FALLBACK_WORKER_SIZE_MB};
use sizer_lib::sizing::{
    OverheadEstimator, RuntimeInspector, ThreadedWorkerModel, ThreadedWorkerResult,
};
use sizer_lib::Overhead;
use tracing::{debug, info};

use crate::config::ThreadedWorkerConfig;
use crate::output::{print_report, OutputFormat};

/// Measure the host and compute worker and thread counts.
///
/// `inspector` is only consulted when the overhead is `auto`.
pub fn size<I: RuntimeInspector>(
    config: &ThreadedWorkerConfig,
    probe: &dyn ResourceProbe,
    inspector: I,
) -> Result<ThreadedWorkerResult> {
    let snapshot = take_snapshot(
        probe,
        &config.pattern,
        config.overrides,
        MissingWorkers::Fallback(FALLBACK_WORKER_SIZE_MB),
    )?;

    let (overhead_mb, estimate) = match config.overhead {
        Overhead::Fixed(mb) => (mb, None),
        Overhead::Auto => {
            let estimate = OverheadEstimator::new(inspector).estimate();
            debug!(?estimate, "Estimated runtime overhead");
            (estimate.total_mb(), Some(estimate))
        }
    };

    let mut result = ThreadedWorkerModel::new().compute(&snapshot, &config.params(overhead_mb));
    if let Some(estimate) = estimate {
        result = result.with_overhead_estimate(estimate);
    }
    if let Some(script) = &config.worker_script {
        result = result.with_worker_script(script.as_str());
    }

    info!(
        workers = result.recommended_workers,
        num_threads = result.num_threads,
        max_threads = result.max_threads,
        "Computed worker sizing"
    );
    Ok(result)
}

pub fn run<I: RuntimeInspector>(
    config: ThreadedWorkerConfig,
    probe: &dyn ResourceProbe,
    inspector: I,
    format: OutputFormat,
) -> Result<()> {
    let result = size(&config, probe, inspector)?;
    print_report(&result, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{OverrideArgs, WorkerArgs};
    use crate::config::WorkerDefaults;
    use sizer_lib::probe::StaticProbe;
    use sizer_lib::{WorkerSample, WorkerSizeSource};

    struct NoRuntime;

    impl RuntimeInspector for NoRuntime {
        fn ini_value(&self, _directive: &str) -> Option<String> {
            None
        }
    }

    struct Opcache(&'static str);

    impl RuntimeInspector for Opcache {
        fn ini_value(&self, directive: &str) -> Option<String> {
            (directive == "opcache.memory_consumption").then(|| self.0.to_string())
        }
    }

    fn config(args: WorkerArgs) -> ThreadedWorkerConfig {
        ThreadedWorkerConfig::resolve(&args, &WorkerDefaults::default()).unwrap()
    }

    fn measured() -> StaticProbe {
        StaticProbe::new(
            1.0,
            1,
            Some(WorkerSample { process_count: 3, average_mb: 50.0 }),
        )
    }

    #[test]
    fn test_auto_overhead_defaults_without_runtime() {
        let result = size(&config(WorkerArgs::default()), &measured(), NoRuntime).unwrap();
        assert_eq!(result.overhead_mb, 278);
        assert_eq!(result.available_memory_mb, 461);
        assert_eq!(result.usable_memory_mb, 183);
        assert_eq!(result.recommended_workers, 2);
        let estimate = result.overhead_estimate.unwrap();
        assert!(!estimate.opcache_detected);
    }

    #[test]
    fn test_auto_overhead_uses_detected_opcache() {
        let result = size(&config(WorkerArgs::default()), &measured(), Opcache("256")).unwrap();
        assert_eq!(result.overhead_mb, 406);
        assert!(result.overhead_estimate.unwrap().opcache_detected);
    }

    #[test]
    fn test_fixed_overhead_skips_estimate() {
        let args = WorkerArgs {
            overhead: Some(Overhead::Fixed(100)),
            ..Default::default()
        };
        let result = size(&config(args), &measured(), Opcache("256")).unwrap();
        assert_eq!(result.overhead_mb, 100);
        assert!(result.overhead_estimate.is_none());
    }

    #[test]
    fn test_missing_workers_use_fallback_size() {
        let probe = StaticProbe::new(8.0, 4, None);
        let result = size(&config(WorkerArgs::default()), &probe, NoRuntime).unwrap();
        assert_eq!(result.avg_worker_size_mb, FALLBACK_WORKER_SIZE_MB);
        assert_eq!(result.worker_size_source, WorkerSizeSource::Fallback);
    }

    #[test]
    fn test_overrides_and_worker_script() {
        let args = WorkerArgs {
            reserved_memory: Some(0.5),
            overhead: Some(Overhead::Fixed(278)),
            worker_script: Some("public/index.php".to_string()),
            overrides: OverrideArgs {
                total_memory: Some(1.5),
                cpus: Some(1),
                worker_size: Some(50.0),
            },
            ..Default::default()
        };
        let result = size(&config(args), &StaticProbe::default(), NoRuntime).unwrap();
        assert_eq!(result.available_memory_mb, 922);
        assert_eq!(result.recommended_workers, 2);
        assert_eq!(result.caddyfile.worker_file.as_deref(), Some("public/index.php"));
        assert_eq!(result.caddyfile.worker_num, Some(2));
    }
}
