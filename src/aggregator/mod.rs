pub mod poller;
pub mod registry;
pub mod sweep;

pub use poller::HealthPoller;
pub use registry::InstanceRegistry;
pub use sweep::run_sweeper;
