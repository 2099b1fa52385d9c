pub mod forwarder;
pub mod http_client;
pub mod interceptor;
pub mod settings;

/// Re-export commonly used types from adapters
pub use forwarder::{Forwarder, OutboundRequest};
pub use http_client::HttpClientAdapter;
pub use interceptor::{RoutingState, intercept};
pub use settings::{FileSettings, MemorySettings};
