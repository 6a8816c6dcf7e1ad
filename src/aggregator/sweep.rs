use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::registry::InstanceRegistry;

pub async fn run_sweeper(
    registry: Arc<InstanceRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let transitioned = registry.sweep(Utc::now());
                if !transitioned.is_empty() {
                    log::warn!("{} instance(s) went offline", transitioned.len());
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    log::info!("registry sweeper stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstanceState, RegistrationRequest};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_sweeper_marks_silent_instance_offline() {
        let registry = Arc::new(InstanceRegistry::new(Duration::from_secs(1)));
        registry.register(
            RegistrationRequest {
                instance_id: "orders".to_string(),
                health_url: "http://orders/health".to_string(),
                tags: BTreeMap::new(),
            },
            Utc::now() - chrono::Duration::seconds(5),
        );

        let mut events = registry.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_sweeper(
            registry.clone(),
            Duration::from_millis(20),
            shutdown_rx,
        ));

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.to, InstanceState::Offline);

        // Further ticks while still OFFLINE stay silent.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
