use std::collections::{BTreeMap, BTreeSet};

use super::composite::evaluate;
use crate::error::ConfigError;
use crate::indicators::IndicatorRegistry;
use crate::types::CompositeHealth;

pub const FULL: &str = "full";
pub const LIVENESS: &str = "liveness";
pub const READINESS: &str = "readiness";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthGroup {
    pub name: String,
    pub members: BTreeSet<String>,
}

impl HealthGroup {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, indicator: &str) -> bool {
        self.members.contains(indicator)
    }
}

#[derive(Debug, Clone)]
pub struct HealthGroups {
    groups: BTreeMap<String, HealthGroup>,
}

impl HealthGroups {
    pub fn from_config(
        configured: &BTreeMap<String, Vec<String>>,
        registry: &IndicatorRegistry,
    ) -> Result<Self, ConfigError> {
        let mut groups = BTreeMap::new();

        for (name, members) in configured {
            if name == FULL {
                return Err(ConfigError::ReservedGroup(name.clone()));
            }
            for member in members {
                if !registry.contains(member) {
                    return Err(ConfigError::UnknownGroupMember {
                        group: name.clone(),
                        member: member.clone(),
                    });
                }
            }
            groups.insert(name.clone(), HealthGroup::new(name.clone(), members.iter().cloned()));
        }

        groups.entry(LIVENESS.to_string()).or_insert_with(|| {
            HealthGroup::new(
                LIVENESS,
                registry
                    .contributors()
                    .filter(|c| !c.is_remote())
                    .map(|c| c.name().to_string()),
            )
        });
        groups
            .entry(READINESS.to_string())
            .or_insert_with(|| HealthGroup::new(READINESS, registry.names()));
        groups.insert(FULL.to_string(), HealthGroup::new(FULL, registry.names()));

        // A remote outage must never make an orchestrator restart a healthy process.
        if let Some(liveness) = groups.get(LIVENESS) {
            for member in &liveness.members {
                if registry.get(member).is_some_and(|c| c.is_remote()) {
                    return Err(ConfigError::RemoteInLiveness(member.clone()));
                }
            }
        }

        for group in groups.values() {
            log::debug!(
                "health group {} -> [{}]",
                group.name,
                group.members.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(Self { groups })
    }

    pub fn get(&self, name: &str) -> Option<&HealthGroup> {
        self.groups.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

/// Restrict a full composite to the group's members and re-merge the status.
pub fn project(full: &CompositeHealth, group: &HealthGroup) -> CompositeHealth {
    let children = full
        .components
        .iter()
        .filter(|(name, _)| group.contains(name))
        .map(|(name, component)| (name.clone(), component.clone()))
        .collect();
    evaluate(children)
}
