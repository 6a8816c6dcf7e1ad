use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::types::{
    HealthSnapshot, InstanceId, InstanceRecord, InstanceState, RegistrationRequest,
    StateChangeEvent, TransitionReason,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct InstanceRegistry {
    instances: DashMap<InstanceId, Arc<InstanceRecord>>,
    grace_window: chrono::Duration,
    events: broadcast::Sender<StateChangeEvent>,
}

impl InstanceRegistry {
    pub fn new(grace_window: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            instances: DashMap::new(),
            grace_window: chrono::Duration::from_std(grace_window)
                .unwrap_or(chrono::Duration::MAX),
            events,
        }
    }

    pub fn grace_window(&self) -> chrono::Duration {
        self.grace_window
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChangeEvent> {
        self.events.subscribe()
    }

    pub fn register(&self, request: RegistrationRequest, now: DateTime<Utc>) -> InstanceRecord {
        let (record, event) = match self.instances.entry(request.instance_id.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get().clone();
                let next = previous.refreshed(request, now);
                let event = (previous.state != InstanceState::Online).then(|| {
                    StateChangeEvent::new(
                        next.instance_id.clone(),
                        previous.state,
                        InstanceState::Online,
                        TransitionReason::Heartbeat,
                        now,
                    )
                });
                entry.insert(Arc::new(next.clone()));
                (next, event)
            }
            Entry::Vacant(entry) => {
                let record = InstanceRecord::new(request, now);
                let event = StateChangeEvent::new(
                    record.instance_id.clone(),
                    InstanceState::Unknown,
                    InstanceState::Online,
                    TransitionReason::Registered,
                    now,
                );
                entry.insert(Arc::new(record.clone()));
                (record, Some(event))
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
        record
    }

    /// Silence strictly longer than the grace window goes OFFLINE.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<StateChangeEvent> {
        let ids: Vec<InstanceId> = self.instances.iter().map(|e| e.key().clone()).collect();
        let mut events = Vec::new();

        for id in ids {
            let Some(mut entry) = self.instances.get_mut(&id) else {
                continue;
            };
            let current = entry.value().clone();
            if current.state == InstanceState::Offline || current.silent_for(now) <= self.grace_window {
                continue;
            }

            let mut next = (*current).clone();
            next.state = InstanceState::Offline;
            *entry = Arc::new(next);
            drop(entry);

            events.push(StateChangeEvent::new(
                id,
                current.state,
                InstanceState::Offline,
                TransitionReason::GraceExpired,
                now,
            ));
        }

        for event in &events {
            self.emit(event.clone());
        }
        events
    }

    pub fn record_health(&self, instance_id: &str, snapshot: HealthSnapshot) -> bool {
        match self.instances.get_mut(instance_id) {
            Some(mut entry) => {
                let mut next = (**entry.value()).clone();
                next.health = Some(snapshot);
                *entry = Arc::new(next);
                true
            }
            None => false,
        }
    }

    pub fn deregister(&self, instance_id: &str, now: DateTime<Utc>) -> Option<InstanceRecord> {
        let (_, record) = self.instances.remove(instance_id)?;
        self.emit(StateChangeEvent::new(
            record.instance_id.clone(),
            record.state,
            InstanceState::Unknown,
            TransitionReason::Deregistered,
            now,
        ));
        Some((*record).clone())
    }

    pub fn get(&self, instance_id: &str) -> Option<InstanceRecord> {
        self.instances.get(instance_id).map(|e| (**e.value()).clone())
    }

    pub fn list(&self) -> Vec<InstanceRecord> {
        let mut records: Vec<InstanceRecord> = self
            .instances
            .iter()
            .map(|e| (**e.value()).clone())
            .collect();
        records.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        records
    }

    pub fn online(&self) -> Vec<InstanceRecord> {
        self.list()
            .into_iter()
            .filter(|r| r.state == InstanceState::Online)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn emit(&self, event: StateChangeEvent) {
        log::info!(
            "instance {} {} -> {} ({})",
            event.instance_id,
            event.from,
            event.to,
            event.reason.as_str()
        );
        // No subscribers is fine: the log line above is the durable record.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HealthStatus;
    use std::collections::BTreeMap;

    fn request(id: &str) -> RegistrationRequest {
        RegistrationRequest {
            instance_id: id.to_string(),
            health_url: format!("http://{}/health", id),
            tags: BTreeMap::from([("zone".to_string(), "eu-1".to_string())]),
        }
    }

    fn registry() -> InstanceRegistry {
        InstanceRegistry::new(Duration::from_secs(30))
    }

    #[test]
    fn test_register_round_trip() {
        let registry = registry();
        let now = Utc::now();
        registry.register(request("orders"), now);

        let record = registry.get("orders").unwrap();
        assert_eq!(record.instance_id, "orders");
        assert_eq!(record.health_url, "http://orders/health");
        assert_eq!(record.state, InstanceState::Online);
        assert_eq!(record.last_heartbeat_at, now);
    }

    #[test]
    fn test_repeated_registration_is_idempotent() {
        let registry = registry();
        let first = Utc::now();
        let second = first + chrono::Duration::seconds(5);

        registry.register(request("orders"), first);
        registry.register(request("orders"), second);

        assert_eq!(registry.len(), 1);
        let record = registry.get("orders").unwrap();
        assert_eq!(record.last_heartbeat_at, second);
        assert_eq!(record.registered_at, first);
    }

    #[test]
    fn test_sweep_emits_one_event_per_transition() {
        let registry = registry();
        let now = Utc::now();
        let stale = now - registry.grace_window() - chrono::Duration::seconds(1);
        registry.register(request("orders"), stale);
        registry.register(request("billing"), now);

        let mut events = registry.subscribe();

        let first = registry.sweep(now);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].instance_id, "orders");
        assert_eq!(first[0].to, InstanceState::Offline);
        assert_eq!(registry.get("orders").unwrap().state, InstanceState::Offline);
        assert_eq!(registry.get("billing").unwrap().state, InstanceState::Online);

        let second = registry.sweep(now + chrono::Duration::seconds(5));
        assert!(second.is_empty());

        let received = events.try_recv().unwrap();
        assert_eq!(received.reason, TransitionReason::GraceExpired);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_exactly_grace_window_is_still_online() {
        let registry = registry();
        let now = Utc::now();
        registry.register(request("orders"), now - registry.grace_window());
        assert!(registry.sweep(now).is_empty());
    }

    #[test]
    fn test_heartbeat_brings_offline_instance_back() {
        let registry = registry();
        let now = Utc::now();
        registry.register(request("orders"), now - chrono::Duration::seconds(60));
        registry.sweep(now);

        let mut events = registry.subscribe();
        let record = registry.register(request("orders"), now);

        assert_eq!(record.state, InstanceState::Online);
        let event = events.try_recv().unwrap();
        assert_eq!(event.from, InstanceState::Offline);
        assert_eq!(event.to, InstanceState::Online);
        assert_eq!(event.reason, TransitionReason::Heartbeat);
    }

    #[test]
    fn test_health_snapshot_survives_heartbeat() {
        let registry = registry();
        let now = Utc::now();
        registry.register(request("orders"), now);

        let snapshot = HealthSnapshot {
            status: HealthStatus::Down,
            checked_at: now,
            response_time_ms: 3,
            body: None,
            error: Some("unexpected status 503".to_string()),
        };
        assert!(registry.record_health("orders", snapshot.clone()));

        registry.register(request("orders"), now + chrono::Duration::seconds(1));
        let record = registry.get("orders").unwrap();
        assert_eq!(record.state, InstanceState::Online);
        assert_eq!(record.health, Some(snapshot));
    }

    #[test]
    fn test_deregister_removes_record() {
        let registry = registry();
        registry.register(request("orders"), Utc::now());

        let mut events = registry.subscribe();
        let removed = registry.deregister("orders", Utc::now()).unwrap();

        assert_eq!(removed.instance_id, "orders");
        assert!(registry.is_empty());
        assert_eq!(events.try_recv().unwrap().reason, TransitionReason::Deregistered);
        assert!(registry.deregister("orders", Utc::now()).is_none());
        assert!(!registry.record_health(
            "orders",
            HealthSnapshot {
                status: HealthStatus::Up,
                checked_at: Utc::now(),
                response_time_ms: 1,
                body: None,
                error: None,
            }
        ));
    }
}
