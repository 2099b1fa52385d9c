//! Switchyard - a traffic-splitting proxy for incremental migration of a
//! legacy XML-over-HTTP service.
//!
//! Switchyard sits in front of a single legacy endpoint and decides, per
//! request, whether to let the legacy handler answer, to replace its response
//! with one from a new backend service, or to shadow the request: legacy
//! answers the client while a copy races to the new service and the two
//! response bodies are compared for equivalence monitoring.
//!
//! # Features
//! - Per-method and per-request-type routing rules from a key/value settings
//!   source, with fail-safe fallback to the legacy handler on any defect
//! - Synchronous replacement forwarding with synthetic 503/500 error
//!   responses on failure
//! - Shadow forwarding with cancellation at end-of-request and byte-for-byte
//!   response comparison
//! - Loop prevention via a marker header on every outbound request
//! - Structured logging via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, middleware, routing::any};
//! use switchyard::{
//!     adapters::{HttpClientAdapter, MemorySettings, RoutingState, intercept},
//!     ports::http_client::HttpClient,
//! };
//!
//! # fn main() -> eyre::Result<()> {
//! let settings = Arc::new(MemorySettings::from_pairs(&[
//!     ("Routing.NewService", "http://new-service/dct"),
//!     ("Routing.GET", "RN"),
//! ]));
//! let client: Arc<dyn HttpClient> = Arc::new(HttpClientAdapter::new()?);
//! let state = Arc::new(RoutingState::new(settings, client));
//!
//! let app: Router = Router::new()
//!     .route("/{*path}", any(|| async { "legacy handler" }))
//!     .layer(middleware::from_fn_with_state(state, intercept));
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters**
//! (implementations) while keeping the pure request logic inside `core`.
//! The decision engine, comparator and capture filter in `core` do no I/O,
//! so the routing semantics are testable without a server.
//!
//! # Error Handling
//! Fallible setup APIs return `eyre::Result<T>`; domain errors use dedicated
//! `thiserror` enums. The interceptor itself never surfaces an error to the
//! host - every failure becomes a legacy fall-through, a synthetic error
//! response, or a log line.
pub mod adapters;
pub mod config;
pub mod core;
pub mod ports;
pub mod tracing_setup;

// Re-export the types most embedders need.
pub use crate::{
    adapters::{
        FileSettings, Forwarder, HttpClientAdapter, MemorySettings, OutboundRequest, RoutingState,
        intercept,
        interceptor::INTERCEPT_PATH,
    },
    config::{RoutingConfig, RoutingMode, load_routing_config},
    ports::http_client::HttpClient,
};
