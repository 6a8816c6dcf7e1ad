pub mod client;
pub mod state_machine;

pub use client::RegistrationClient;
pub use state_machine::{RegistrationEvent, RegistrationState, RegistrationStateMachine};
