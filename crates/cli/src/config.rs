//! Configuration management for the CLI
//!
//! Each run resolves one immutable config record per command. Precedence is
//! command-line flag, then environment variable (both handled by clap), then
//! the JSON defaults file, then the built-in default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sizer_lib::error::{ensure_non_negative, SizerError};
use sizer_lib::probe::{ProbeOverrides, ProcessPattern};
use sizer_lib::{Overhead, PoolMode, SizingParameters};
use std::path::{Path, PathBuf};

use sizer_lib::load::{DEFAULT_LEVEL_PAUSE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RUN_DURATION};
use std::time::Duration;

use crate::args::{FpmArgs, LoadArgs, OverrideArgs, WorkerArgs};

pub const DEFAULT_FPM_RESERVED_GB: f64 = 1.0;
pub const DEFAULT_WORKER_RESERVED_GB: f64 = 0.5;
pub const DEFAULT_BUFFER_PERCENT: f64 = 10.0;
pub const DEFAULT_WORKER_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_FPM_PATTERN: &str = "php-fpm: pool";
pub const DEFAULT_WORKER_PATTERN: &str = "frankenphp";
pub const DEFAULT_POOL_NAME: &str = "www";

/// Overhead as written in the defaults file: `"auto"` or a number of MB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverheadSetting {
    Mb(f64),
    Keyword(String),
}

impl OverheadSetting {
    fn resolve(&self) -> Result<Overhead, SizerError> {
        match self {
            Self::Mb(mb) => Overhead::fixed_mb(ensure_non_negative("overhead", *mb)?),
            Self::Keyword(raw) => raw.parse(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FpmDefaults {
    pub reserved_memory_gb: Option<f64>,
    pub buffer_percent: Option<f64>,
    pub pattern: Option<String>,
    pub pm: Option<String>,
    pub pool_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerDefaults {
    pub reserved_memory_gb: Option<f64>,
    pub buffer_percent: Option<f64>,
    pub pattern: Option<String>,
    pub multiplier: Option<f64>,
    pub overhead: Option<OverheadSetting>,
    pub worker_script: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadDefaults {
    pub url: Option<String>,
    pub duration: Option<String>,
    pub pause: Option<String>,
}

/// Defaults file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub fpm: FpmDefaults,
    pub worker: WorkerDefaults,
    pub load: LoadDefaults,
}

impl Config {
    /// Load the defaults file.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).map_err(|e| {
            SizerError::validation("config file", format!("{}: {}", path.display(), e)).into()
        })
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("php-sizer").join("config.json"))
    }
}

fn checked(field: &str, value: Option<f64>, default: f64) -> Result<f64, SizerError> {
    ensure_non_negative(field, value.unwrap_or(default))
}

fn overrides(args: &OverrideArgs) -> ProbeOverrides {
    ProbeOverrides {
        total_memory_gb: args.total_memory,
        cpu_count: args.cpus,
        worker_size_mb: args.worker_size,
    }
}

/// Resolved settings for the fixed-process model
#[derive(Debug, Clone)]
pub struct FixedProcessConfig {
    pub reserved_memory_gb: f64,
    pub buffer_percent: f64,
    pub pattern: ProcessPattern,
    pub mode: PoolMode,
    pub pool_name: String,
    pub overrides: ProbeOverrides,
}

impl FixedProcessConfig {
    pub fn resolve(args: &FpmArgs, defaults: &FpmDefaults) -> Result<Self, SizerError> {
        let mode = match (&args.pm, &defaults.pm) {
            (Some(mode), _) => *mode,
            (None, Some(raw)) => raw.parse()?,
            (None, None) => PoolMode::default(),
        };
        let pattern = args
            .pattern
            .as_deref()
            .or(defaults.pattern.as_deref())
            .unwrap_or(DEFAULT_FPM_PATTERN);

        Ok(Self {
            reserved_memory_gb: checked(
                "reserved memory",
                args.reserved_memory.or(defaults.reserved_memory_gb),
                DEFAULT_FPM_RESERVED_GB,
            )?,
            buffer_percent: checked(
                "buffer",
                args.buffer.or(defaults.buffer_percent),
                DEFAULT_BUFFER_PERCENT,
            )?,
            pattern: ProcessPattern::new(pattern)?,
            mode,
            pool_name: args
                .pool_name
                .clone()
                .or_else(|| defaults.pool_name.clone())
                .unwrap_or_else(|| DEFAULT_POOL_NAME.to_string()),
            overrides: overrides(&args.overrides),
        })
    }

    pub fn params(&self) -> SizingParameters {
        SizingParameters::fixed_process(self.reserved_memory_gb, self.buffer_percent)
    }
}

/// Resolved settings for the threaded-worker model
#[derive(Debug, Clone)]
pub struct ThreadedWorkerConfig {
    pub reserved_memory_gb: f64,
    pub buffer_percent: f64,
    pub worker_multiplier: f64,
    pub overhead: Overhead,
    pub pattern: ProcessPattern,
    pub worker_script: Option<String>,
    pub overrides: ProbeOverrides,
}

impl ThreadedWorkerConfig {
    pub fn resolve(args: &WorkerArgs, defaults: &WorkerDefaults) -> Result<Self, SizerError> {
        let overhead = match (&args.overhead, &defaults.overhead) {
            (Some(overhead), _) => *overhead,
            (None, Some(setting)) => setting.resolve()?,
            (None, None) => Overhead::default(),
        };
        let pattern = args
            .pattern
            .as_deref()
            .or(defaults.pattern.as_deref())
            .unwrap_or(DEFAULT_WORKER_PATTERN);

        Ok(Self {
            reserved_memory_gb: checked(
                "reserved memory",
                args.reserved_memory.or(defaults.reserved_memory_gb),
                DEFAULT_WORKER_RESERVED_GB,
            )?,
            buffer_percent: checked(
                "buffer",
                args.buffer.or(defaults.buffer_percent),
                DEFAULT_BUFFER_PERCENT,
            )?,
            worker_multiplier: checked(
                "multiplier",
                args.multiplier.or(defaults.multiplier),
                DEFAULT_WORKER_MULTIPLIER,
            )?,
            overhead,
            pattern: ProcessPattern::new(pattern)?,
            worker_script: args
                .worker_script
                .clone()
                .or_else(|| defaults.worker_script.clone()),
            overrides: overrides(&args.overrides),
        })
    }

    pub fn params(&self, overhead_mb: u64) -> SizingParameters {
        SizingParameters::threaded_worker(
            self.reserved_memory_gb,
            self.buffer_percent,
            self.worker_multiplier,
            overhead_mb,
        )
    }
}

fn file_duration(
    field: &str,
    raw: &Option<String>,
    parse: fn(&str) -> Result<Duration, String>,
) -> Result<Option<Duration>, SizerError> {
    raw.as_deref()
        .map(|raw| parse(raw).map_err(|reason| SizerError::validation(field, reason)))
        .transpose()
}

/// Resolved settings for the load driver
#[derive(Debug, Clone, PartialEq)]
pub struct LoadConfig {
    pub url: String,
    /// Explicit concurrency; `None` means use the sized `max_threads`
    pub concurrency: Option<u32>,
    pub progressive: bool,
    pub duration: Duration,
    pub pause: Duration,
    pub timeout: Duration,
}

impl LoadConfig {
    pub fn resolve(args: &LoadArgs, defaults: &LoadDefaults) -> Result<Self, SizerError> {
        let url = args
            .url
            .clone()
            .or_else(|| defaults.url.clone())
            .ok_or_else(|| SizerError::validation("url", "no endpoint given (use --url)"))?;

        let duration = match args.duration {
            Some(duration) => duration,
            None => file_duration("duration", &defaults.duration, crate::args::duration)?
                .unwrap_or(DEFAULT_RUN_DURATION),
        };
        let pause = match args.pause {
            Some(pause) => pause,
            None => file_duration("pause", &defaults.pause, crate::args::duration_allow_zero)?
                .unwrap_or(DEFAULT_LEVEL_PAUSE),
        };
        let concurrency = if args.progressive {
            args.max_concurrency.or(args.concurrency)
        } else {
            args.concurrency
        };

        Ok(Self {
            url,
            concurrency,
            progressive: args.progressive,
            duration,
            pause,
            timeout: args.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}
