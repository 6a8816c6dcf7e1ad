pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{create_aggregator_router, create_instance_router, serve};
