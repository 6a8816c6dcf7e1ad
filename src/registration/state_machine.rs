use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
    Degraded,
}

impl RegistrationState {
    pub fn as_str(&self) -> &str {
        match self {
            RegistrationState::Unregistered => "UNREGISTERED",
            RegistrationState::Registering => "REGISTERING",
            RegistrationState::Registered => "REGISTERED",
            RegistrationState::Degraded => "DEGRADED",
        }
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationEvent {
    Start,
    SendSucceeded,
    SendFailed,
}

pub struct RegistrationStateMachine;

impl RegistrationStateMachine {
    pub fn transition(
        state: RegistrationState,
        event: RegistrationEvent,
    ) -> Result<RegistrationState> {
        let next = match (state, event) {
            (RegistrationState::Unregistered, RegistrationEvent::Start) => {
                RegistrationState::Registering
            }
            (
                RegistrationState::Registering
                | RegistrationState::Registered
                | RegistrationState::Degraded,
                RegistrationEvent::SendSucceeded,
            ) => RegistrationState::Registered,
            (
                RegistrationState::Registering
                | RegistrationState::Registered
                | RegistrationState::Degraded,
                RegistrationEvent::SendFailed,
            ) => RegistrationState::Degraded,
            _ => {
                return Err(anyhow!(
                    "Invalid registration transition from {:?} with event {:?}",
                    state,
                    event
                ));
            }
        };

        Ok(next)
    }
}
