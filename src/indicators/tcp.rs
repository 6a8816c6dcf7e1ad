use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use super::{Indicator, IndicatorKind};
use crate::types::{HealthStatus, IndicatorResult};

pub struct TcpIndicator {
    name: String,
    address: String,
    connect_timeout: Duration,
}

impl TcpIndicator {
    pub fn new(name: impl Into<String>, address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Indicator for TcpIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::LocalResource
    }

    async fn evaluate(&self) -> IndicatorResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(self.address.as_str()),
        )
        .await;
        let elapsed = started.elapsed().as_millis();

        let (status, error) = match outcome {
            Ok(Ok(_stream)) => (HealthStatus::Up, None),
            Ok(Err(e)) => (HealthStatus::Down, Some(format!("connection failed: {}", e))),
            Err(_) => (HealthStatus::Down, Some("timeout".to_string())),
        };

        let mut result = IndicatorResult::new(&self.name, status);
        if let Some(error) = error {
            log::warn!("tcp check {} against {} failed: {}", self.name, self.address, error);
            result = result.with_detail("error", error);
        }
        result
            .with_detail("address", self.address.as_str())
            .with_detail("responseTimeMs", elapsed)
    }
}
