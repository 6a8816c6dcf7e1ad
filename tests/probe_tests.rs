use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vitals::indicators::{probe, DependencyProber, Indicator, RemoteIndicator};
use vitals::types::HealthStatus;

const CONNECT: Duration = Duration::from_millis(300);
const READ: Duration = Duration::from_millis(500);

async fn mock_health(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "application/json")
                .set_body_string(body.to_string()),
        )
        .mount(&server)
        .await;
    server
}

async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/health", addr)
}

#[tokio::test]
async fn test_probe_up_on_200() {
    let server = mock_health(200, r#"{"status":"UP","components":{}}"#).await;
    let url = format!("{}/health", server.uri());

    let result = probe(&url, CONNECT, READ).await;

    assert_eq!(result.status, HealthStatus::Up);
    assert_eq!(result.detail("url").and_then(|v| v.as_str()), Some(url.as_str()));
    assert!(result.detail("responseTimeMs").and_then(|v| v.as_i64()).is_some());
    assert!(result.error().is_none());
}

#[tokio::test]
async fn test_probe_403_is_misconfiguration() {
    let server = mock_health(403, "").await;

    let result = probe(&format!("{}/health", server.uri()), CONNECT, READ).await;

    assert_eq!(result.status, HealthStatus::Down);
    let error = result.error().unwrap();
    assert!(error.contains("403"));
    assert!(error.contains("requires authentication"));
}

#[tokio::test]
async fn test_probe_404_is_missing_endpoint() {
    let server = MockServer::start().await;

    let result = probe(&format!("{}/health", server.uri()), CONNECT, READ).await;

    assert_eq!(result.status, HealthStatus::Down);
    assert_eq!(
        result.error(),
        Some("404: health endpoint not installed on target")
    );
}

#[tokio::test]
async fn test_probe_5xx_is_unexpected_status() {
    let server = mock_health(503, r#"{"status":"DOWN","components":{}}"#).await;

    let result = probe(&format!("{}/health", server.uri()), CONNECT, READ).await;

    assert_eq!(result.status, HealthStatus::Down);
    assert_eq!(result.error(), Some("unexpected status 503"));
    assert_eq!(
        result.detail("remoteStatus").and_then(|v| v.as_str()),
        Some("DOWN")
    );
}

#[tokio::test]
async fn test_probe_connection_refused() {
    let url = closed_port_url().await;

    let result = probe(&url, CONNECT, READ).await;

    assert_eq!(result.status, HealthStatus::Down);
    assert!(result.error().unwrap().contains("connection"));
    assert!(result.detail("url").is_some());
}

#[tokio::test]
async fn test_403_and_refused_are_distinguishable() {
    let forbidden = mock_health(403, "").await;
    let forbidden = probe(&format!("{}/health", forbidden.uri()), CONNECT, READ).await;
    let refused = probe(&closed_port_url().await, CONNECT, READ).await;

    assert_eq!(forbidden.status, HealthStatus::Down);
    assert_eq!(refused.status, HealthStatus::Down);
    assert!(forbidden.error().unwrap().contains("403"));
    assert!(!forbidden.error().unwrap().contains("connection"));
    assert!(refused.error().unwrap().contains("connection"));
    assert!(!refused.error().unwrap().contains("403"));
}

#[tokio::test]
async fn test_probe_silent_target_times_out_within_budget() {
    // Accepts the connection, reads the request, never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            held.push(socket);
        }
    });

    let started = Instant::now();
    let result = probe(&format!("http://{}/health", addr), CONNECT, READ).await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, HealthStatus::Down);
    assert_eq!(result.error(), Some("timeout"));
    assert!(result.detail("responseTimeMs").is_some());
    assert!(elapsed >= READ);
    assert!(elapsed < CONNECT + READ + Duration::from_millis(500));

    hold.abort();
}

#[tokio::test]
async fn test_probe_slow_answer_exceeds_read_budget() {
    // Connect is instant on loopback; the answer lands after READ but before CONNECT + READ.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":"UP","components":{}}"#)
                .set_delay(READ + Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = probe(&format!("{}/health", server.uri()), CONNECT, READ).await;

    assert_eq!(result.status, HealthStatus::Down);
    assert_eq!(result.error(), Some("timeout"));
    assert!(started.elapsed() < READ + Duration::from_millis(200));
}

#[tokio::test]
async fn test_probe_invalid_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let result = probe(&format!("{}/health", server.uri()), CONNECT, READ).await;

    assert_eq!(result.status, HealthStatus::Down);
    assert!(result.error().unwrap().starts_with("invalid health response"));
}

#[tokio::test]
async fn test_prober_never_fails_across_outcomes() {
    let ok = mock_health(200, "{}").await;
    let forbidden = mock_health(403, "").await;
    let missing = MockServer::start().await;
    let broken = mock_health(500, "boom").await;

    let urls = vec![
        format!("{}/health", ok.uri()),
        format!("{}/health", forbidden.uri()),
        format!("{}/health", missing.uri()),
        format!("{}/health", broken.uri()),
        closed_port_url().await,
    ];

    for url in urls {
        let result = probe(&url, CONNECT, READ).await;
        if result.status != HealthStatus::Up {
            assert_eq!(result.status, HealthStatus::Down);
            assert!(result.error().is_some(), "DOWN without error for {}", url);
        }
    }
}

#[tokio::test]
async fn test_remote_indicator_uses_its_name() {
    let server = mock_health(200, "{}").await;
    let prober = DependencyProber::new(format!("{}/health", server.uri()), CONNECT, READ).unwrap();
    let indicator = RemoteIndicator::new("inventory", prober);

    let result = indicator.evaluate().await;
    assert_eq!(result.name, "inventory");
    assert_eq!(result.status, HealthStatus::Up);
}
