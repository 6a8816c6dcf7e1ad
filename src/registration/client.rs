use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::state_machine::{RegistrationEvent, RegistrationState, RegistrationStateMachine};
use crate::config::InstanceConfig;
use crate::types::RegistrationRequest;

pub struct RegistrationClient {
    client: reqwest::Client,
    register_url: String,
    registration: RegistrationRequest,
    interval: Duration,
    state: watch::Sender<RegistrationState>,
}

impl RegistrationClient {
    pub fn new(
        aggregator_url: &str,
        registration: RegistrationRequest,
        interval: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("vitals/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (state, _) = watch::channel(RegistrationState::Unregistered);

        Ok(Self {
            client,
            register_url: format!("{}/register", aggregator_url.trim_end_matches('/')),
            registration,
            interval,
            state,
        })
    }

    pub fn from_config(config: &InstanceConfig) -> Result<Option<Self>> {
        let Some(aggregator_url) = &config.registration.aggregator_url else {
            return Ok(None);
        };

        let registration = RegistrationRequest {
            instance_id: config.instance.resolved_instance_id(),
            health_url: config.instance.health_url.clone(),
            tags: config.instance.tags.clone(),
        };

        Self::new(
            aggregator_url,
            registration,
            config.registration.heartbeat_interval(),
            config.registration.request_timeout(),
        )
        .map(Some)
    }

    pub fn registration(&self) -> &RegistrationRequest {
        &self.registration
    }

    pub fn state(&self) -> RegistrationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    pub async fn heartbeat(&self) -> Result<()> {
        if self.state() == RegistrationState::Unregistered {
            self.apply(RegistrationEvent::Start)?;
        }

        match self.send().await {
            Ok(()) => {
                self.apply(RegistrationEvent::SendSucceeded)?;
                Ok(())
            }
            Err(e) => {
                self.apply(RegistrationEvent::SendFailed)?;
                Err(e)
            }
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "registering {} with {} every {:?}",
            self.registration.instance_id,
            self.register_url,
            self.interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.heartbeat().await {
                        log::warn!(
                            "heartbeat for {} failed, will retry next tick: {}",
                            self.registration.instance_id,
                            e
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        log::info!("registration client for {} stopping", self.registration.instance_id);
                        break;
                    }
                }
            }
        }
    }

    async fn send(&self) -> Result<()> {
        let response = self
            .client
            .post(&self.register_url)
            .json(&self.registration)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("aggregator rejected registration ({}): {}", status, body));
        }
        Ok(())
    }

    fn apply(&self, event: RegistrationEvent) -> Result<()> {
        let current = self.state();
        let next = RegistrationStateMachine::transition(current, event)?;
        if next != current {
            log::info!(
                "registration state for {}: {} -> {}",
                self.registration.instance_id,
                current,
                next
            );
        }
        self.state.send_replace(next);
        Ok(())
    }
}
