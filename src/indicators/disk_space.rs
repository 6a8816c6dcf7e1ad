use async_trait::async_trait;
use std::path::PathBuf;

use super::{Indicator, IndicatorKind};
use crate::types::{HealthStatus, IndicatorResult};

pub struct DiskSpaceIndicator {
    name: String,
    path: PathBuf,
    threshold_bytes: u64,
}

struct DiskUsage {
    total: u64,
    free: u64,
}

impl DiskSpaceIndicator {
    pub fn new(name: impl Into<String>, path: PathBuf, threshold_bytes: u64) -> Self {
        Self {
            name: name.into(),
            path,
            threshold_bytes,
        }
    }

    fn base_result(&self, status: HealthStatus) -> IndicatorResult {
        IndicatorResult::new(&self.name, status)
            .with_detail("path", self.path.to_string_lossy().to_string())
            .with_detail("threshold", self.threshold_bytes)
    }
}

#[async_trait]
impl Indicator for DiskSpaceIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::LocalResource
    }

    async fn evaluate(&self) -> IndicatorResult {
        let path = self.path.clone();
        let usage = tokio::task::spawn_blocking(move || -> std::io::Result<DiskUsage> {
            Ok(DiskUsage {
                total: fs2::total_space(&path)?,
                free: fs2::available_space(&path)?,
            })
        })
        .await;

        match usage {
            Ok(Ok(usage)) => {
                let status = if usage.free >= self.threshold_bytes {
                    HealthStatus::Up
                } else {
                    HealthStatus::Down
                };
                let mut result = self
                    .base_result(status)
                    .with_detail("total", usage.total)
                    .with_detail("free", usage.free);
                if status == HealthStatus::Down {
                    result = result.with_detail("error", "free space below threshold");
                }
                result
            }
            Ok(Err(e)) => self
                .base_result(HealthStatus::Down)
                .with_detail("error", format!("failed to read disk usage: {}", e)),
            Err(e) => self
                .base_result(HealthStatus::Down)
                .with_detail("error", format!("disk usage check aborted: {}", e)),
        }
    }
}
