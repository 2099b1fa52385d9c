//! Routing-rule data structures.
//!
//! A [`RoutingConfig`] is an immutable snapshot of the splitting rules for the
//! intercepted endpoint. Snapshots are built once by the loader and never
//! mutated; the interceptor reads exactly one snapshot per request.
use std::collections::HashMap;

/// How a matched request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingMode {
    /// Pass the request through to the legacy handler untouched.
    #[default]
    RouteOld,
    /// Forward to the new service and return its response instead.
    RouteNew,
    /// Legacy handler answers; a shadow copy goes to the new service and the
    /// responses are compared after the fact.
    RunParallel,
}

impl RoutingMode {
    /// Parse a configuration token (`RO` / `RN` / `RP`, case-insensitive).
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "RO" => Some(Self::RouteOld),
            "RN" => Some(Self::RouteNew),
            "RP" => Some(Self::RunParallel),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RouteOld => write!(f, "RO"),
            Self::RouteNew => write!(f, "RN"),
            Self::RunParallel => write!(f, "RP"),
        }
    }
}

/// Immutable snapshot of the routing rules.
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    /// Absolute URL of the new service. Required whenever any mode other
    /// than [`RoutingMode::RouteOld`] is configured.
    pub new_service_url: Option<String>,
    /// Mode applied to every GET request.
    pub get_mode: RoutingMode,
    /// Request-type name (lowercased) to mode, for POST bodies.
    pub post_modes: HashMap<String, RoutingMode>,
    /// False when any rule failed to parse. An invalid snapshot routes every
    /// request to the legacy handler.
    pub is_valid: bool,
}

impl RoutingConfig {
    /// A snapshot that sends everything to the legacy handler.
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            ..Self::default()
        }
    }

    /// Look up the mode configured for a POST request-type name,
    /// case-insensitively.
    pub fn post_mode(&self, request_type: &str) -> Option<RoutingMode> {
        self.post_modes
            .get(&request_type.to_ascii_lowercase())
            .copied()
    }

    /// True when at least one rule routes away from the legacy handler,
    /// which is what makes `new_service_url` mandatory.
    pub fn routes_to_new_service(&self) -> bool {
        self.get_mode != RoutingMode::RouteOld
            || self
                .post_modes
                .values()
                .any(|mode| *mode != RoutingMode::RouteOld)
    }
}
