pub mod health;
pub mod instance;

pub use health::{CompositeHealth, HealthComponent, IndicatorResult};
pub use instance::{
    HealthSnapshot, InstanceRecord, InstanceState, RegistrationRequest, StateChangeEvent,
    TransitionReason,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type InstanceId = String;
pub type Details = IndexMap<String, DetailValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Up,
    Down,
    Unknown,
    OutOfService,
}

impl HealthStatus {
    pub fn as_str(&self) -> &str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Down => "DOWN",
            HealthStatus::Unknown => "UNKNOWN",
            HealthStatus::OutOfService => "OUT_OF_SERVICE",
        }
    }

    // DOWN > OUT_OF_SERVICE > UNKNOWN > UP
    fn severity(&self) -> u8 {
        match self {
            HealthStatus::Up => 0,
            HealthStatus::Unknown => 1,
            HealthStatus::OutOfService => 2,
            HealthStatus::Down => 3,
        }
    }

    pub fn merge(self, other: HealthStatus) -> HealthStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn is_up(&self) -> bool {
        *self == HealthStatus::Up
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl DetailValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DetailValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DetailValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Bool(b) => write!(f, "{}", b),
            DetailValue::Int(n) => write!(f, "{}", n),
            DetailValue::Float(x) => write!(f, "{}", x),
            DetailValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        DetailValue::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        DetailValue::Text(value)
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        DetailValue::Bool(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        DetailValue::Int(value)
    }
}

impl From<u64> for DetailValue {
    fn from(value: u64) -> Self {
        DetailValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u128> for DetailValue {
    fn from(value: u128) -> Self {
        DetailValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for DetailValue {
    fn from(value: f64) -> Self {
        DetailValue::Float(value)
    }
}
