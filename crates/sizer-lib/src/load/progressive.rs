//! Progressive load: step through fractions of a maximum concurrency

use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::{LoadGenerator, LoadReport, LoadTestConfig};
use crate::error::{Result, SizerError};
use crate::report::{Report, ReportRow};

/// Concurrency levels as percentages of the maximum
pub const LADDER_PERCENTAGES: [u32; 5] = [10, 25, 50, 75, 100];

/// Concurrency for each ladder step, truncated and at least 1
pub fn ladder(max_concurrency: u32) -> Vec<(u32, u32)> {
    LADDER_PERCENTAGES
        .iter()
        .map(|percent| {
            let concurrency = (max_concurrency as u64 * *percent as u64 / 100) as u32;
            (*percent, concurrency.max(1))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelReport {
    pub percent: u32,
    #[serde(flatten)]
    pub report: LoadReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressiveReport {
    pub url: String,
    pub max_concurrency: u32,
    pub pause_secs: f64,
    pub levels: Vec<LevelReport>,
}

/// Runs a [`LoadGenerator`] once per ladder step with a pause in between
pub struct ProgressiveLoad<G> {
    generator: G,
    pause: Duration,
}

impl<G: LoadGenerator> ProgressiveLoad<G> {
    pub fn new(generator: G, pause: Duration) -> Self {
        Self { generator, pause }
    }

    pub async fn run(
        &self,
        base: &LoadTestConfig,
        max_concurrency: u32,
    ) -> Result<ProgressiveReport> {
        if max_concurrency == 0 {
            return Err(SizerError::validation("max concurrency", "must be at least 1"));
        }

        let steps = ladder(max_concurrency);
        let mut levels = Vec::with_capacity(steps.len());

        for (index, (percent, concurrency)) in steps.iter().enumerate() {
            if index > 0 && !self.pause.is_zero() {
                info!(pause_secs = self.pause.as_secs_f64(), "Pausing before next level");
                tokio::time::sleep(self.pause).await;
            }

            info!(percent, concurrency, "Running load level");
            let report = self.generator.run(&base.at_concurrency(*concurrency)).await?;
            levels.push(LevelReport {
                percent: *percent,
                report,
            });
        }

        Ok(ProgressiveReport {
            url: base.url.to_string(),
            max_concurrency,
            pause_secs: self.pause.as_secs_f64(),
            levels,
        })
    }
}

impl Report for ProgressiveReport {
    fn title(&self) -> String {
        format!("Progressive Load Test: {} (max concurrency {})", self.url, self.max_concurrency)
    }

    fn rows(&self) -> Vec<ReportRow> {
        self.levels
            .iter()
            .map(|level| {
                let r = &level.report;
                ReportRow::new(
                    format!("{}% (c={})", level.percent, r.concurrency),
                    format!(
                        "{:.2} req/s, p50 {:.2} ms, p99 {:.2} ms, {} failed",
                        r.requests_per_sec, r.latency.p50_ms, r.latency.p99_ms, r.failed
                    ),
                )
            })
            .collect()
    }

    fn warnings(&self) -> Vec<String> {
        self.levels
            .iter()
            .filter(|level| level.report.failed > 0)
            .map(|level| {
                format!(
                    "{}% level: {} of {} requests failed",
                    level.percent, level.report.failed, level.report.total_requests
                )
            })
            .collect()
    }
}
