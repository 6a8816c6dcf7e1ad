use async_trait::async_trait;

use super::{Indicator, IndicatorKind};
use crate::types::{HealthStatus, IndicatorResult};

pub struct PingIndicator {
    name: String,
}

impl PingIndicator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Indicator for PingIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::LivenessMarker
    }

    async fn evaluate(&self) -> IndicatorResult {
        IndicatorResult::up(&self.name)
    }
}

/// Reports a fixed status, e.g. OUT_OF_SERVICE during maintenance.
pub struct StaticIndicator {
    name: String,
    status: HealthStatus,
    reason: Option<String>,
}

impl StaticIndicator {
    pub fn new(name: impl Into<String>, status: HealthStatus, reason: Option<String>) -> Self {
        Self {
            name: name.into(),
            status,
            reason,
        }
    }
}

#[async_trait]
impl Indicator for StaticIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::LocalResource
    }

    async fn evaluate(&self) -> IndicatorResult {
        let mut result = IndicatorResult::new(&self.name, self.status);
        match &self.reason {
            Some(reason) => result = result.with_detail("reason", reason.as_str()),
            None if !self.status.is_up() => {
                result = result.with_detail("reason", "status set by configuration")
            }
            None => {}
        }
        result
    }
}
