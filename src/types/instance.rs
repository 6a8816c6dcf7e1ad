use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::{CompositeHealth, HealthStatus, InstanceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Online,
    Offline,
    Unknown,
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Online => "ONLINE",
            InstanceState::Offline => "OFFLINE",
            InstanceState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub instance_id: InstanceId,
    pub health_url: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<CompositeHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub instance_id: InstanceId,
    pub health_url: String,
    pub tags: BTreeMap<String, String>,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub state: InstanceState,
    pub health: Option<HealthSnapshot>,
}

impl InstanceRecord {
    pub fn new(request: RegistrationRequest, now: DateTime<Utc>) -> Self {
        Self {
            instance_id: request.instance_id,
            health_url: request.health_url,
            tags: request.tags,
            registered_at: now,
            last_heartbeat_at: now,
            state: InstanceState::Online,
            health: None,
        }
    }

    pub fn refreshed(&self, request: RegistrationRequest, now: DateTime<Utc>) -> Self {
        Self {
            instance_id: self.instance_id.clone(),
            health_url: request.health_url,
            tags: request.tags,
            registered_at: self.registered_at,
            last_heartbeat_at: now,
            state: InstanceState::Online,
            health: self.health.clone(),
        }
    }

    pub fn silent_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_heartbeat_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    Registered,
    Heartbeat,
    GraceExpired,
    Deregistered,
}

impl TransitionReason {
    pub fn as_str(&self) -> &str {
        match self {
            TransitionReason::Registered => "registered",
            TransitionReason::Heartbeat => "heartbeat",
            TransitionReason::GraceExpired => "grace_expired",
            TransitionReason::Deregistered => "deregistered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeEvent {
    pub id: Uuid,
    pub instance_id: InstanceId,
    pub from: InstanceState,
    pub to: InstanceState,
    pub reason: TransitionReason,
    pub at: DateTime<Utc>,
}

impl StateChangeEvent {
    pub fn new(
        instance_id: impl Into<InstanceId>,
        from: InstanceState,
        to: InstanceState,
        reason: TransitionReason,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instance_id: instance_id.into(),
            from,
            to,
            reason,
            at,
        }
    }
}
