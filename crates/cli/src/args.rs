//! Command-line arguments and value parsers
//!
//! Every numeric flag is checked here, so invalid input stops the run before
//! anything is probed or computed.

use clap::Args;
use sizer_lib::error::parse_non_negative;
use sizer_lib::{Overhead, PoolMode};
use std::time::Duration;

/// Values that replace probe readings, for sizing a host other than this one
#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    /// Total memory in GB instead of the detected value
    #[arg(long, value_parser = non_negative, allow_negative_numbers = true)]
    pub total_memory: Option<f64>,

    /// CPU count instead of the detected value
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub cpus: Option<u32>,

    /// Average worker size in MB instead of measuring running processes
    #[arg(long, value_parser = non_negative, allow_negative_numbers = true)]
    pub worker_size: Option<f64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FpmArgs {
    /// Memory reserved for the OS and other services, in GB [default: 1.0]
    #[arg(long, env = "PHP_SIZER_RESERVED_MEMORY", value_parser = non_negative, allow_negative_numbers = true)]
    pub reserved_memory: Option<f64>,

    /// Safety buffer in percent of the remaining memory [default: 10]
    #[arg(long, env = "PHP_SIZER_BUFFER", value_parser = non_negative, allow_negative_numbers = true)]
    pub buffer: Option<f64>,

    /// Regex matched against pool process command lines [default: "php-fpm: pool"]
    #[arg(long, env = "PHP_SIZER_FPM_PATTERN")]
    pub pattern: Option<String>,

    /// Process manager mode: dynamic or static [default: dynamic]
    #[arg(long, value_parser = pool_mode)]
    pub pm: Option<PoolMode>,

    /// Pool name used in the generated configuration [default: www]
    #[arg(long)]
    pub pool_name: Option<String>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WorkerArgs {
    /// Memory reserved for the OS and other services, in GB [default: 0.5]
    #[arg(long, env = "PHP_SIZER_RESERVED_MEMORY", value_parser = non_negative, allow_negative_numbers = true)]
    pub reserved_memory: Option<f64>,

    /// Safety buffer in percent of the remaining memory [default: 10]
    #[arg(long, env = "PHP_SIZER_BUFFER", value_parser = non_negative, allow_negative_numbers = true)]
    pub buffer: Option<f64>,

    /// Regex matched against worker process command lines [default: frankenphp]
    #[arg(long, env = "PHP_SIZER_WORKER_PATTERN")]
    pub pattern: Option<String>,

    /// Workers per CPU [default: 2]
    #[arg(long, env = "PHP_SIZER_MULTIPLIER", value_parser = non_negative, allow_negative_numbers = true)]
    pub multiplier: Option<f64>,

    /// Memory overhead in MB, or "auto" to estimate it from the PHP runtime [default: auto]
    #[arg(long, env = "PHP_SIZER_OVERHEAD", value_parser = overhead, allow_negative_numbers = true)]
    pub overhead: Option<Overhead>,

    /// Worker script to include in the generated Caddyfile
    #[arg(long)]
    pub worker_script: Option<String>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Endpoint to load (can also be set in the defaults file)
    #[arg(long, env = "PHP_SIZER_URL")]
    pub url: Option<String>,

    /// Concurrent connections for a single run [default: recommended max_threads]
    #[arg(long, short, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Step through 10/25/50/75/100% of the maximum concurrency
    #[arg(long)]
    pub progressive: bool,

    /// Maximum concurrency for progressive runs [default: recommended max_threads]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_concurrency: Option<u32>,

    /// Duration of each run, e.g. 30s, 2m [default: 30s]
    #[arg(long, short, value_parser = duration)]
    pub duration: Option<Duration>,

    /// Pause between progressive levels [default: 5s]
    #[arg(long, value_parser = duration_allow_zero)]
    pub pause: Option<Duration>,

    /// Per-request timeout [default: 30s]
    #[arg(long, value_parser = duration)]
    pub timeout: Option<Duration>,

    #[command(flatten, next_help_heading = "Sizing (used when no concurrency is given)")]
    pub sizing: WorkerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Regex matched against process command lines
    #[arg(long, default_value = "php-fpm|frankenphp")]
    pub pattern: String,
}

pub fn non_negative(raw: &str) -> Result<f64, String> {
    parse_non_negative("value", raw).map_err(|_| "must be a non-negative number".to_string())
}

pub fn pool_mode(raw: &str) -> Result<PoolMode, String> {
    raw.parse().map_err(|_| "expected one of: dynamic, static".to_string())
}

pub fn overhead(raw: &str) -> Result<Overhead, String> {
    raw.parse()
        .map_err(|_| "expected \"auto\" or a non-negative number of MB".to_string())
}

/// Parse `500ms`, `30s`, `2m`, `1h`, or a bare number of seconds
pub fn duration_allow_zero(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value = parse_non_negative("duration", number)
        .map_err(|_| format!("invalid duration '{}'", raw))?;

    let seconds = match unit.trim() {
        "" | "s" => value,
        "ms" => value / 1000.0,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit '{}'", other)),
    };
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("duration '{}' is too long", raw))
}

pub fn duration(raw: &str) -> Result<Duration, String> {
    let parsed = duration_allow_zero(raw)?;
    if parsed.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(parsed)
}
