//! Load generation against a configured endpoint
//!
//! Used to check a sizing recommendation empirically: drive the endpoint at
//! a fixed concurrency, or step through a ladder of concurrency levels
//! derived from a maximum.

mod http;
mod progressive;

pub use http::HttpLoadGenerator;
pub use progressive::{ladder, LevelReport, ProgressiveLoad, ProgressiveReport, LADDER_PERCENTAGES};

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::error::{Result, SizerError};
use crate::report::{Report, ReportRow};

/// Default pause between progressive levels
pub const DEFAULT_LEVEL_PAUSE: Duration = Duration::from_secs(5);

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Length of a single run when none is configured
pub const DEFAULT_RUN_DURATION: Duration = Duration::from_secs(30);

/// One load run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTestConfig {
    pub url: Url,
    pub concurrency: u32,
    pub duration: Duration,
    pub timeout: Duration,
}

impl LoadTestConfig {
    pub fn new(url: &str, concurrency: u32, duration: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| SizerError::validation("url", format!("'{}': {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SizerError::validation(
                "url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if concurrency == 0 {
            return Err(SizerError::validation("concurrency", "must be at least 1"));
        }
        if duration.is_zero() {
            return Err(SizerError::validation("duration", "must be greater than zero"));
        }

        Ok(Self {
            url,
            concurrency,
            duration,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same endpoint and timing at a different concurrency
    pub fn at_concurrency(&self, concurrency: u32) -> Self {
        Self {
            concurrency,
            ..self.clone()
        }
    }
}

/// Drives load against an endpoint
#[async_trait]
pub trait LoadGenerator: Send + Sync {
    async fn run(&self, config: &LoadTestConfig) -> Result<LoadReport>;
}

/// Latency distribution in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    /// Summarize request latencies using nearest-rank percentiles
    pub fn from_samples(samples: &mut [Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();

        let to_ms = |d: Duration| d.as_micros() as f64 / 1000.0;
        let percentile = |p: f64| {
            let rank = ((p / 100.0) * samples.len() as f64).ceil() as usize;
            to_ms(samples[rank.clamp(1, samples.len()) - 1])
        };
        let total: f64 = samples.iter().copied().map(to_ms).sum();

        Self {
            mean_ms: total / samples.len() as f64,
            p50_ms: percentile(50.0),
            p90_ms: percentile(90.0),
            p99_ms: percentile(99.0),
            max_ms: to_ms(samples[samples.len() - 1]),
        }
    }
}

/// Outcome of one load run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub url: String,
    pub concurrency: u32,
    pub duration_secs: f64,
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub requests_per_sec: f64,
    pub latency: LatencySummary,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl Report for LoadReport {
    fn title(&self) -> String {
        format!("Load Test: {}", self.url)
    }

    fn rows(&self) -> Vec<ReportRow> {
        vec![
            ReportRow::new("Concurrency", self.concurrency.to_string()),
            ReportRow::new("Duration", format!("{:.1}s", self.duration_secs)),
            ReportRow::new("Requests", self.total_requests.to_string()),
            ReportRow::new("Successful", self.successful.to_string()),
            ReportRow::new("Failed", self.failed.to_string()),
            ReportRow::new("Requests/sec", format!("{:.2}", self.requests_per_sec)),
            ReportRow::new("Latency mean", format!("{:.2} ms", self.latency.mean_ms)),
            ReportRow::new("Latency p50", format!("{:.2} ms", self.latency.p50_ms)),
            ReportRow::new("Latency p90", format!("{:.2} ms", self.latency.p90_ms)),
            ReportRow::new("Latency p99", format!("{:.2} ms", self.latency.p99_ms)),
            ReportRow::new("Latency max", format!("{:.2} ms", self.latency.max_ms)),
        ]
    }

    fn warnings(&self) -> Vec<String> {
        if self.failed > 0 {
            vec![format!("{} of {} requests failed", self.failed, self.total_requests)]
        } else {
            Vec::new()
        }
    }
}
