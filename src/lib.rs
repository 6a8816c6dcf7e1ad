pub mod aggregator;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod registration;
pub mod types;

pub use config::{AggregatorConfig, InstanceConfig};
pub use error::ConfigError;
pub use types::*;
