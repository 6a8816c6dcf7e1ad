use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DetailValue, Details, HealthStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    // The name is the key of the enclosing `components` map on the wire.
    #[serde(skip)]
    pub name: String,
    pub status: HealthStatus,
    #[serde(default)]
    pub details: Details,
}

impl IndicatorResult {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            details: Details::new(),
        }
    }

    pub fn up(name: impl Into<String>) -> Self {
        Self::new(name, HealthStatus::Up)
    }

    pub fn down(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(name, HealthStatus::Down).with_detail("error", error.into())
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&DetailValue> {
        self.details.get(key)
    }

    pub fn error(&self) -> Option<&str> {
        self.detail("error").and_then(DetailValue::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeHealth {
    pub status: HealthStatus,
    pub components: BTreeMap<String, HealthComponent>,
}

impl CompositeHealth {
    pub fn component(&self, name: &str) -> Option<&HealthComponent> {
        self.components.get(name)
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HealthComponent {
    // Tried first: only composites carry `components`.
    Composite(CompositeHealth),
    Indicator(IndicatorResult),
}

impl HealthComponent {
    pub fn status(&self) -> HealthStatus {
        match self {
            HealthComponent::Composite(composite) => composite.status,
            HealthComponent::Indicator(result) => result.status,
        }
    }

    pub fn as_indicator(&self) -> Option<&IndicatorResult> {
        match self {
            HealthComponent::Indicator(result) => Some(result),
            HealthComponent::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeHealth> {
        match self {
            HealthComponent::Composite(composite) => Some(composite),
            HealthComponent::Indicator(_) => None,
        }
    }
}

impl From<IndicatorResult> for HealthComponent {
    fn from(result: IndicatorResult) -> Self {
        HealthComponent::Indicator(result)
    }
}

impl From<CompositeHealth> for HealthComponent {
    fn from(composite: CompositeHealth) -> Self {
        HealthComponent::Composite(composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_details_keep_insertion_order() {
        let result = IndicatorResult::down("db", "timeout")
            .with_detail("url", "http://db/health")
            .with_detail("responseTimeMs", 12u64);

        let keys: Vec<&str> = result.details.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["error", "url", "responseTimeMs"]);
        assert_eq!(result.error(), Some("timeout"));
    }

    #[test]
    fn test_wire_shape_distinguishes_leaves_and_composites() {
        let body = r#"{
            "status": "DOWN",
            "components": {
                "diskSpace": {"status": "UP", "details": {"free": 100}},
                "downstreams": {
                    "status": "DOWN",
                    "components": {
                        "orders": {"status": "DOWN", "details": {"error": "timeout"}}
                    }
                }
            }
        }"#;

        let parsed: CompositeHealth = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, HealthStatus::Down);
        assert!(parsed.component("diskSpace").unwrap().as_indicator().is_some());

        let nested = parsed.component("downstreams").unwrap().as_composite().unwrap();
        let orders = nested.component("orders").unwrap().as_indicator().unwrap();
        assert_eq!(orders.error(), Some("timeout"));
    }

    #[test]
    fn test_name_is_not_serialized() {
        let json = serde_json::to_value(IndicatorResult::up("ping")).unwrap();
        assert!(json.get("name").is_none());
        assert_eq!(json["status"], "UP");
    }
}
