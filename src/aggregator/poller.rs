use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::registry::InstanceRegistry;
use crate::indicators::ProbeFailure;
use crate::types::{CompositeHealth, HealthSnapshot, HealthStatus};

/// Polls ONLINE instances on its own cadence; an ONLINE instance may report DOWN.
pub struct HealthPoller {
    client: reqwest::Client,
    registry: Arc<InstanceRegistry>,
    concurrency: usize,
}

impl HealthPoller {
    pub fn new(registry: Arc<InstanceRegistry>, timeout: Duration, concurrency: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vitals-aggregator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            registry,
            concurrency: concurrency.max(1),
        })
    }

    pub async fn poll_once(&self) -> usize {
        let targets = self.registry.online();
        let count = targets.len();

        stream::iter(targets)
            .for_each_concurrent(self.concurrency, |record| async move {
                let snapshot = self.fetch(&record.health_url).await;
                if !snapshot.status.is_up() {
                    log::debug!(
                        "instance {} reports {} ({})",
                        record.instance_id,
                        snapshot.status,
                        snapshot.error.as_deref().unwrap_or("no error")
                    );
                }
                self.registry.record_health(&record.instance_id, snapshot);
            })
            .await;

        count
    }

    pub async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let polled = self.poll_once().await;
                    log::debug!("polled health of {} instances", polled);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("health poller stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn fetch(&self, url: &str) -> HealthSnapshot {
        let started = Instant::now();
        let outcome = self.request(url).await;
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok((status, body)) => HealthSnapshot {
                status,
                checked_at: Utc::now(),
                response_time_ms,
                body,
                error: None,
            },
            Err(failure) => HealthSnapshot {
                status: HealthStatus::Down,
                checked_at: Utc::now(),
                response_time_ms,
                body: None,
                error: Some(failure.to_string()),
            },
        }
    }

    async fn request(
        &self,
        url: &str,
    ) -> Result<(HealthStatus, Option<CompositeHealth>), ProbeFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeFailure::from_transport(&e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProbeFailure::from_transport(&e))?;

        // 503 is a normal answer from a health endpoint; its body still counts.
        if let Ok(body) = serde_json::from_slice::<CompositeHealth>(&bytes) {
            return Ok((body.status, Some(body)));
        }
        if let Some(reported) = reported_status(&bytes) {
            return Ok((reported, None));
        }
        match ProbeFailure::from_status(status) {
            Some(failure) => Err(failure),
            None if bytes.iter().all(u8::is_ascii_whitespace) => Ok((HealthStatus::Up, None)),
            None => match serde_json::from_slice::<serde_json::Value>(&bytes) {
                Ok(_) => Ok((HealthStatus::Up, None)),
                Err(e) => Err(ProbeFailure::InvalidBody(e.to_string())),
            },
        }
    }
}

/// Top-level `status` of a body whose components don't fit `CompositeHealth`.
fn reported_status(bytes: &[u8]) -> Option<HealthStatus> {
    let value = serde_json::from_slice::<serde_json::Value>(bytes).ok()?;
    serde_json::from_value(value.get("status")?.clone()).ok()
}
