pub mod composite;
pub mod groups;

pub use composite::{evaluate, evaluate_contributors, merge_statuses};
pub use groups::{project, HealthGroup, HealthGroups, FULL, LIVENESS, READINESS};

use std::collections::BTreeMap;

use crate::config::IndicatorConfig;
use crate::error::ConfigError;
use crate::indicators::{Contributor, IndicatorRegistry};
use crate::types::CompositeHealth;

pub struct HealthService {
    registry: IndicatorRegistry,
    groups: HealthGroups,
}

impl HealthService {
    pub fn new(registry: IndicatorRegistry, groups: HealthGroups) -> Self {
        Self { registry, groups }
    }

    pub fn from_config(
        indicators: &[IndicatorConfig],
        groups: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let registry = IndicatorRegistry::from_config(indicators)?;
        let groups = HealthGroups::from_config(groups, &registry)?;
        Ok(Self::new(registry, groups))
    }

    pub fn registry(&self) -> &IndicatorRegistry {
        &self.registry
    }

    pub fn groups(&self) -> &HealthGroups {
        &self.groups
    }

    pub async fn health(&self, group: &str) -> Option<CompositeHealth> {
        let group = self.groups.get(group)?;
        let members: Vec<Contributor> = group
            .members
            .iter()
            .filter_map(|name| self.registry.get(name).cloned())
            .collect();
        Some(evaluate_contributors(members).await)
    }

    pub async fn full(&self) -> CompositeHealth {
        evaluate_contributors(self.registry.contributors().cloned().collect()).await
    }
}
