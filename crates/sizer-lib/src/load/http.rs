//! HTTP load generator built on reqwest and tokio tasks

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{LatencySummary, LoadGenerator, LoadReport, LoadTestConfig};
use crate::error::{Result, SizerError};

/// Counts kept by one connection loop
#[derive(Debug, Default)]
struct Tally {
    successful: u64,
    failed: u64,
    latencies: Vec<Duration>,
    last_error: Option<String>,
}

impl Tally {
    fn merge(&mut self, other: Tally) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.latencies.extend(other.latencies);
        if other.last_error.is_some() {
            self.last_error = other.last_error;
        }
    }
}

/// Issues GET requests from `concurrency` concurrent loops until the
/// configured duration has elapsed
#[derive(Debug, Clone, Default)]
pub struct HttpLoadGenerator;

impl HttpLoadGenerator {
    pub fn new() -> Self {
        Self
    }

    async fn connection_loop(client: Client, url: reqwest::Url, deadline: Instant) -> Tally {
        let mut tally = Tally::default();
        while Instant::now() < deadline {
            let started = Instant::now();
            match client.get(url.clone()).send().await {
                Ok(response) => {
                    let success = response.status().is_success();
                    // Drain the body so the request is measured end to end
                    let body = response.bytes().await;
                    tally.latencies.push(started.elapsed());
                    if success && body.is_ok() {
                        tally.successful += 1;
                    } else {
                        tally.failed += 1;
                    }
                }
                Err(e) => {
                    tally.failed += 1;
                    tally.last_error = Some(e.to_string());
                    // Back off briefly so a refused connection does not spin
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
        tally
    }
}

#[async_trait]
impl LoadGenerator for HttpLoadGenerator {
    async fn run(&self, config: &LoadTestConfig) -> Result<LoadReport> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.concurrency as usize)
            .build()
            .map_err(|e| SizerError::LoadTest(format!("failed to create HTTP client: {}", e)))?;

        info!(
            url = %config.url,
            concurrency = config.concurrency,
            duration_secs = config.duration.as_secs_f64(),
            "Starting load run"
        );

        let started_at = chrono::Utc::now();
        let started = Instant::now();
        let deadline = started + config.duration;

        let handles: Vec<_> = (0..config.concurrency)
            .map(|_| {
                tokio::spawn(Self::connection_loop(
                    client.clone(),
                    config.url.clone(),
                    deadline,
                ))
            })
            .collect();

        let mut tally = Tally::default();
        for handle in handles {
            let worker = handle
                .await
                .map_err(|e| SizerError::LoadTest(format!("load task failed: {}", e)))?;
            tally.merge(worker);
        }

        let elapsed = started.elapsed().as_secs_f64();
        let total_requests = tally.successful + tally.failed;
        if let Some(error) = &tally.last_error {
            debug!(error = %error, failed = tally.failed, "Requests failed during load run");
        }

        Ok(LoadReport {
            url: config.url.to_string(),
            concurrency: config.concurrency,
            duration_secs: elapsed,
            total_requests,
            successful: tally.successful,
            failed: tally.failed,
            requests_per_sec: if elapsed > 0.0 {
                total_requests as f64 / elapsed
            } else {
                0.0
            },
            latency: LatencySummary::from_samples(&mut tally.latencies),
            started_at,
        })
    }
}
