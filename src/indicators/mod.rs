pub mod disk_space;
pub mod local;
pub mod probe;
pub mod tcp;

pub use disk_space::DiskSpaceIndicator;
pub use local::{PingIndicator, StaticIndicator};
pub use probe::{probe, DependencyProber, ProbeFailure, RemoteIndicator};
pub use tcp::TcpIndicator;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{IndicatorConfig, IndicatorKindConfig};
use crate::error::ConfigError;
use crate::types::IndicatorResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    LocalResource,
    RemoteDependency,
    LivenessMarker,
}

#[async_trait]
pub trait Indicator: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> IndicatorKind;

    async fn evaluate(&self) -> IndicatorResult;
}

#[derive(Clone)]
pub enum Contributor {
    Indicator(Arc<dyn Indicator>),
    Composite {
        name: String,
        children: Arc<[Contributor]>,
    },
}

impl Contributor {
    pub fn name(&self) -> &str {
        match self {
            Contributor::Indicator(indicator) => indicator.name(),
            Contributor::Composite { name, .. } => name,
        }
    }

    pub fn is_remote(&self) -> bool {
        match self {
            Contributor::Indicator(indicator) => {
                indicator.kind() == IndicatorKind::RemoteDependency
            }
            Contributor::Composite { children, .. } => children.iter().any(Contributor::is_remote),
        }
    }
}

impl std::fmt::Debug for Contributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Contributor::Indicator(indicator) => f
                .debug_struct("Indicator")
                .field("name", &indicator.name())
                .field("kind", &indicator.kind())
                .finish(),
            Contributor::Composite { name, children } => f
                .debug_struct("Composite")
                .field("name", name)
                .field("children", &children.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorRegistry {
    contributors: BTreeMap<String, Contributor>,
}

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[IndicatorConfig]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for config in configs {
            registry.insert(build_contributor(config)?)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, indicator: Arc<dyn Indicator>) -> Result<(), ConfigError> {
        self.insert(Contributor::Indicator(indicator))
    }

    pub fn insert(&mut self, contributor: Contributor) -> Result<(), ConfigError> {
        let name = contributor.name().to_string();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyIndicatorName);
        }
        if self.contributors.contains_key(&name) {
            return Err(ConfigError::DuplicateIndicator(name));
        }
        self.contributors.insert(name, contributor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Contributor> {
        self.contributors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contributors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contributors.keys().map(String::as_str)
    }

    pub fn contributors(&self) -> impl Iterator<Item = &Contributor> {
        self.contributors.values()
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }
}

fn build_contributor(config: &IndicatorConfig) -> Result<Contributor, ConfigError> {
    let name = config.name.clone();
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyIndicatorName);
    }

    let invalid = |reason: &str| ConfigError::InvalidIndicator {
        name: config.name.clone(),
        reason: reason.to_string(),
    };

    let indicator: Arc<dyn Indicator> = match &config.kind {
        IndicatorKindConfig::Ping => Arc::new(PingIndicator::new(name)),
        IndicatorKindConfig::DiskSpace {
            path,
            threshold_bytes,
        } => Arc::new(DiskSpaceIndicator::new(name, path.clone(), *threshold_bytes)),
        IndicatorKindConfig::Remote {
            url,
            connect_timeout_ms,
            read_timeout_ms,
        } => {
            if !crate::config::is_http_url(url) {
                return Err(invalid("url must be an http(s) URL"));
            }
            if *connect_timeout_ms == 0 || *read_timeout_ms == 0 {
                return Err(invalid("timeouts must be greater than zero"));
            }
            let prober = DependencyProber::new(
                url.clone(),
                Duration::from_millis(*connect_timeout_ms),
                Duration::from_millis(*read_timeout_ms),
            )
            .map_err(|e| invalid(&e.to_string()))?;
            Arc::new(RemoteIndicator::new(name, prober))
        }
        IndicatorKindConfig::Tcp {
            address,
            connect_timeout_ms,
        } => {
            if address.trim().is_empty() {
                return Err(invalid("address must not be empty"));
            }
            if *connect_timeout_ms == 0 {
                return Err(invalid("connect timeout must be greater than zero"));
            }
            Arc::new(TcpIndicator::new(
                name,
                address.clone(),
                Duration::from_millis(*connect_timeout_ms),
            ))
        }
        IndicatorKindConfig::Static { status, reason } => {
            Arc::new(StaticIndicator::new(name, *status, reason.clone()))
        }
        IndicatorKindConfig::Composite { indicators } => {
            if indicators.is_empty() {
                return Err(invalid("composite must contain at least one indicator"));
            }
            let mut seen = std::collections::BTreeSet::new();
            let mut children = Vec::with_capacity(indicators.len());
            for child in indicators {
                if !seen.insert(child.name.clone()) {
                    return Err(ConfigError::DuplicateIndicator(format!(
                        "{}.{}",
                        config.name, child.name
                    )));
                }
                children.push(build_contributor(child)?);
            }
            return Ok(Contributor::Composite {
                name,
                children: children.into(),
            });
        }
    };

    Ok(Contributor::Indicator(indicator))
}
