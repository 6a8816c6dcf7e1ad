use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

use super::{Indicator, IndicatorKind};
use crate::types::IndicatorResult;

/// `Display` text is the `error` detail of a DOWN result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error("timeout")]
    Timeout,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("403: target requires authentication for health endpoint")]
    Forbidden,
    #[error("404: health endpoint not installed on target")]
    NotFound,
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("invalid health response: {0}")]
    InvalidBody(String),
}

impl ProbeFailure {
    pub fn cause(&self) -> &'static str {
        match self {
            ProbeFailure::Timeout => "timeout",
            ProbeFailure::ConnectionFailed(_) => "transport",
            ProbeFailure::Forbidden => "forbidden",
            ProbeFailure::NotFound => "not_found",
            ProbeFailure::UnexpectedStatus(_) => "unexpected_status",
            ProbeFailure::InvalidBody(_) => "invalid_body",
        }
    }

    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return ProbeFailure::Timeout;
        }
        ProbeFailure::ConnectionFailed(root_cause(error))
    }

    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::FORBIDDEN => Some(ProbeFailure::Forbidden),
            StatusCode::NOT_FOUND => Some(ProbeFailure::NotFound),
            s if s.is_success() => None,
            s => Some(ProbeFailure::UnexpectedStatus(s.as_u16())),
        }
    }
}

fn root_cause(error: &(dyn std::error::Error + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

struct ProbeResponse {
    status: StatusCode,
    body: Vec<u8>,
}

/// Probes a remote instance's own health endpoint. Connect and read budgets
/// are enforced separately and the whole exchange is capped at their sum.
#[derive(Debug, Clone)]
pub struct DependencyProber {
    client: reqwest::Client,
    url: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl DependencyProber {
    pub fn new(
        url: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(concat!("vitals/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            connect_timeout,
            read_timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn budget(&self) -> Duration {
        self.connect_timeout + self.read_timeout
    }

    pub async fn probe(&self, name: &str) -> IndicatorResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.budget(), self.fetch()).await;
        let elapsed = started.elapsed().as_millis();

        let verdict = match outcome {
            Err(_) => Err((ProbeFailure::Timeout, None)),
            Ok(Err(failure)) => Err((failure, None)),
            Ok(Ok(response)) => classify_response(response),
        };

        match verdict {
            Ok(()) => IndicatorResult::up(name)
                .with_detail("url", self.url.as_str())
                .with_detail("responseTimeMs", elapsed),
            Err((failure, remote_status)) => {
                log::warn!(
                    "probe {} against {} failed after {}ms (cause={}): {}",
                    name,
                    self.url,
                    elapsed,
                    failure.cause(),
                    failure
                );
                let mut result = IndicatorResult::down(name, failure.to_string())
                    .with_detail("url", self.url.as_str())
                    .with_detail("responseTimeMs", elapsed);
                if let Some(remote_status) = remote_status {
                    result = result.with_detail("remoteStatus", remote_status);
                }
                result
            }
        }
    }

    async fn fetch(&self) -> Result<ProbeResponse, ProbeFailure> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProbeFailure::from_transport(&e))?;
        let status = response.status();
        // Headers arrived; the body gets its own read budget.
        let body = match tokio::time::timeout(self.read_timeout, response.bytes()).await {
            Ok(body) => body.map_err(|e| ProbeFailure::from_transport(&e))?,
            Err(_) => return Err(ProbeFailure::Timeout),
        };
        Ok(ProbeResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn classify_response(response: ProbeResponse) -> Result<(), (ProbeFailure, Option<String>)> {
    let body = &response.body;

    if let Some(failure) = ProbeFailure::from_status(response.status) {
        // A health endpoint answering 503 still tells us what it thinks of itself.
        let remote_status = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(str::to_string));
        return Err((failure, remote_status));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }

    serde_json::from_slice::<serde_json::Value>(body)
        .map(|_| ())
        .map_err(|e| (ProbeFailure::InvalidBody(e.to_string()), None))
}

pub async fn probe(
    target_health_url: &str,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> IndicatorResult {
    match DependencyProber::new(target_health_url, connect_timeout, read_timeout) {
        Ok(prober) => prober.probe(target_health_url).await,
        Err(e) => IndicatorResult::down(
            target_health_url,
            format!("connection failed: {}", root_cause(&*e)),
        )
        .with_detail("url", target_health_url)
        .with_detail("responseTimeMs", 0u64),
    }
}

pub struct RemoteIndicator {
    name: String,
    prober: DependencyProber,
}

impl RemoteIndicator {
    pub fn new(name: impl Into<String>, prober: DependencyProber) -> Self {
        Self {
            name: name.into(),
            prober,
        }
    }
}

#[async_trait]
impl Indicator for RemoteIndicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::RemoteDependency
    }

    async fn evaluate(&self) -> IndicatorResult {
        self.prober.probe(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HealthStatus;

    fn response(status: u16, body: &str) -> ProbeResponse {
        ProbeResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        assert_eq!(ProbeFailure::Timeout.to_string(), "timeout");
        assert!(ProbeFailure::Forbidden.to_string().starts_with("403"));
        assert!(ProbeFailure::NotFound.to_string().starts_with("404"));
        assert_eq!(
            ProbeFailure::UnexpectedStatus(502).to_string(),
            "unexpected status 502"
        );
        assert!(ProbeFailure::ConnectionFailed("refused".into())
            .to_string()
            .starts_with("connection failed"));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            ProbeFailure::from_status(StatusCode::FORBIDDEN),
            Some(ProbeFailure::Forbidden)
        );
        assert_eq!(
            ProbeFailure::from_status(StatusCode::NOT_FOUND),
            Some(ProbeFailure::NotFound)
        );
        assert_eq!(
            ProbeFailure::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(ProbeFailure::UnexpectedStatus(500))
        );
        assert_eq!(ProbeFailure::from_status(StatusCode::OK), None);
    }

    #[test]
    fn test_classify_success_requires_parseable_body() {
        assert!(classify_response(response(200, r#"{"status":"UP"}"#)).is_ok());
        assert!(classify_response(response(204, "")).is_ok());

        let (failure, _) = classify_response(response(200, "<html>")).unwrap_err();
        assert_eq!(failure.cause(), "invalid_body");
    }

    #[test]
    fn test_classify_503_keeps_remote_status() {
        let (failure, remote) =
            classify_response(response(503, r#"{"status":"OUT_OF_SERVICE","components":{}}"#))
                .unwrap_err();
        assert_eq!(failure, ProbeFailure::UnexpectedStatus(503));
        assert_eq!(remote.as_deref(), Some("OUT_OF_SERVICE"));
    }

    #[tokio::test]
    async fn test_invalid_url_does_not_panic() {
        let result = probe("not a url", Duration::from_millis(50), Duration::from_millis(50)).await;
        assert_eq!(result.status, HealthStatus::Down);
        assert!(result.error().is_some());
    }
}
