pub mod loader;
pub mod models;

pub use loader::load_routing_config;
pub use models::{RoutingConfig, RoutingMode};
