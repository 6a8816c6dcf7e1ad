use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::HealthStatus;

pub const ENV_AGGREGATOR_URL: &str = "VITALS_AGGREGATOR_URL";
pub const ENV_BIND: &str = "VITALS_BIND";
pub const ENV_HEALTH_URL: &str = "VITALS_HEALTH_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub instance: InstanceIdentity,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_instance_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_instance_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub name: String,
    /// Overrides the derived `<name>@<host>:<port>` identifier.
    #[serde(default)]
    pub instance_id: Option<String>,
    pub health_url: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl InstanceIdentity {
    pub fn resolved_instance_id(&self) -> String {
        if let Some(id) = &self.instance_id {
            return id.clone();
        }

        match reqwest::Url::parse(&self.health_url) {
            Ok(url) => {
                let host = url.host_str().unwrap_or("localhost");
                match url.port_or_known_default() {
                    Some(port) => format!("{}@{}:{}", self.name, host, port),
                    None => format!("{}@{}", self.name, host),
                }
            }
            Err(_) => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default)]
    pub aggregator_url: Option<String>,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            aggregator_url: None,
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl RegistrationConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub name: String,
    #[serde(flatten)]
    pub kind: IndicatorKindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorKindConfig {
    Ping,
    DiskSpace {
        #[serde(default = "default_disk_path")]
        path: PathBuf,
        #[serde(default = "default_disk_threshold_bytes")]
        threshold_bytes: u64,
    },
    Remote {
        url: String,
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
        #[serde(default = "default_read_timeout_ms")]
        read_timeout_ms: u64,
    },
    Tcp {
        address: String,
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
    },
    Static {
        status: HealthStatus,
        #[serde(default)]
        reason: Option<String>,
    },
    Composite {
        indicators: Vec<IndicatorConfig>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_aggregator_bind")]
    pub bind: String,
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bind: default_aggregator_bind(),
            grace_window_secs: default_grace_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_ms: default_poll_timeout_ms(),
            poll_concurrency: default_poll_concurrency(),
        }
    }
}

impl AggregatorConfig {
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("grace_window_secs", self.grace_window_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("poll_interval_secs", self.poll_interval_secs),
            ("poll_timeout_ms", self.poll_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid_setting(field, "must be greater than zero"));
            }
        }
        if self.poll_concurrency == 0 {
            return Err(invalid_setting(
                "poll_concurrency",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(bind) = std::env::var(ENV_BIND) {
            self.bind = bind;
        }
        self
    }
}

impl InstanceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance.name.trim().is_empty() {
            return Err(invalid_setting("instance.name", "must not be empty"));
        }
        if !is_http_url(&self.instance.health_url) {
            return Err(invalid_setting(
                "instance.health_url",
                "must be an http(s) URL",
            ));
        }
        if let Some(url) = &self.registration.aggregator_url {
            if !is_http_url(url) {
                return Err(invalid_setting(
                    "registration.aggregator_url",
                    "must be an http(s) URL",
                ));
            }
        }
        if self.registration.heartbeat_interval_secs == 0 {
            return Err(invalid_setting(
                "registration.heartbeat_interval_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(bind) = std::env::var(ENV_BIND) {
            self.server.bind = bind;
        }
        if let Ok(url) = std::env::var(ENV_AGGREGATOR_URL) {
            self.registration.aggregator_url = Some(url);
        }
        if let Ok(url) = std::env::var(ENV_HEALTH_URL) {
            self.instance.health_url = url;
        }
        self
    }
}

pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match extension.as_deref() {
        Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))
        }
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

fn invalid_setting(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn default_instance_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_aggregator_bind() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_disk_path() -> PathBuf {
    PathBuf::from("/")
}

fn default_disk_threshold_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_read_timeout_ms() -> u64 {
    2000
}

fn default_grace_window_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    15
}

fn default_poll_timeout_ms() -> u64 {
    3000
}

fn default_poll_concurrency() -> usize {
    16
}
