//! Per-request interception and orchestration.
//!
//! [`intercept`] is an axum middleware applied to the legacy endpoint. It
//! buffers the request body once, asks the decision engine for a mode and
//! then either lets the wrapped legacy handler run, replaces its response
//! with the new service's, or shadows the request while the legacy handler
//! answers the client.
//!
//! No failure in here ever reaches the host: everything converts into a
//! legacy fall-through, a synthetic error response, or a log line.
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body as AxumBody,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::BodyExt;
use hyper::{
    HeaderMap, StatusCode,
    header::{self, HeaderName, HeaderValue},
};
use tokio::{task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    adapters::forwarder::{FORWARD_TIMEOUT, FORWARDED_HEADER, Forwarder, OutboundRequest},
    config::{load_routing_config, models::RoutingConfig, models::RoutingMode},
    core::{
        capture::CaptureBody,
        compare::{ComparisonOutcome, compare_bodies},
        decision::decide,
    },
    ports::{http_client::HttpClient, settings::Settings},
};

/// The one legacy endpoint this module splits traffic for.
pub const INTERCEPT_PATH: &str = "/dctserver.aspx";

static X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Upstream response headers that never travel back to the client.
fn is_stripped_response_header(name: &HeaderName) -> bool {
    name == header::TRANSFER_ENCODING || name == header::SERVER || name == &X_POWERED_BY
}

/// Shared interceptor state: the settings source, the routing snapshot and
/// the forwarder over the process-wide HTTP client.
pub struct RoutingState {
    settings: Arc<dyn Settings>,
    forwarder: Forwarder,
    config: ArcSwap<RoutingConfig>,
}

impl RoutingState {
    /// Build the state and load the initial snapshot. Defects in the rules
    /// are logged here and the snapshot is marked invalid, which routes
    /// everything to the legacy handler until [`RoutingState::reload`].
    pub fn new(settings: Arc<dyn Settings>, client: Arc<dyn HttpClient>) -> Self {
        let config = ArcSwap::from_pointee(load_routing_config(settings.as_ref()));
        Self {
            settings,
            forwarder: Forwarder::new(client),
            config,
        }
    }

    /// Re-read the settings source and swap in a fresh snapshot. In-flight
    /// requests keep the snapshot they started with.
    pub fn reload(&self) {
        self.config
            .store(Arc::new(load_routing_config(self.settings.as_ref())));
    }

    /// The snapshot new requests will see.
    pub fn snapshot(&self) -> Arc<RoutingConfig> {
        self.config.load_full()
    }
}

/// Middleware entry point. Apply with
/// `axum::middleware::from_fn_with_state(state, intercept)` on the route
/// serving [`INTERCEPT_PATH`].
pub async fn intercept(
    State(state): State<Arc<RoutingState>>,
    req: Request,
    next: Next,
) -> Response {
    // Requests this module sent out must never be intercepted again.
    if req
        .headers()
        .get(&FORWARDED_HEADER)
        .is_some_and(|value| value.as_bytes() == b"true")
    {
        return next.run(req).await;
    }

    if !req.uri().path().eq_ignore_ascii_case(INTERCEPT_PATH) {
        return next.run(req).await;
    }

    let config = state.snapshot();

    let (parts, body) = req.into_parts();
    let method = parts.method.clone();
    let headers = parts.headers.clone();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    let body_bytes = match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            (!bytes.is_empty()).then_some(bytes)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read request body");
            None
        }
    };

    // Reinstall the buffered bytes so the legacy handler sees the body from
    // the start.
    let req = Request::from_parts(
        parts,
        AxumBody::from(body_bytes.clone().unwrap_or_default()),
    );

    let mode = decide(&method, body_bytes.as_deref(), &config);
    tracing::info!(%mode, method = %method, "routing decision");

    match mode {
        RoutingMode::RouteOld => next.run(req).await,
        RoutingMode::RouteNew => {
            let outbound = OutboundRequest {
                method,
                headers,
                content_type,
                body: body_bytes.unwrap_or_default(),
            };
            route_new(&state, &config, &outbound).await
        }
        RoutingMode::RunParallel => {
            let outbound = OutboundRequest {
                method,
                headers,
                content_type,
                body: body_bytes.unwrap_or_default(),
            };
            run_parallel(&state, &config, outbound, req, next).await
        }
    }
}

/// Replace the legacy response with the new service's. The legacy handler
/// does not run.
async fn route_new(
    state: &RoutingState,
    config: &RoutingConfig,
    outbound: &OutboundRequest,
) -> Response {
    match try_route_new(state, config, outbound).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "unexpected error routing request to new service");
            synthetic_response(StatusCode::INTERNAL_SERVER_ERROR, "Error routing request")
        }
    }
}

async fn try_route_new(
    state: &RoutingState,
    config: &RoutingConfig,
    outbound: &OutboundRequest,
) -> eyre::Result<Response> {
    let url = config
        .new_service_url
        .as_deref()
        .ok_or_else(|| eyre::eyre!("routing mode requires a new service URL but none is set"))?;

    match state.forwarder.forward(url, outbound).await {
        Some(upstream) => Ok(copy_response(upstream).await),
        None => Ok(synthetic_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Error contacting backend service",
        )),
    }
}

/// Legacy handler answers the client while a shadow copy races it to the new
/// service. The response body is teed so the two can be compared once the
/// client has been served.
async fn run_parallel(
    state: &RoutingState,
    config: &RoutingConfig,
    outbound: OutboundRequest,
    req: Request,
    next: Next,
) -> Response {
    let Some(url) = config.new_service_url.clone() else {
        tracing::error!("routing mode requires a new service URL but none is set");
        return next.run(req).await;
    };

    let forwarder = state.forwarder.clone();
    let cancel = CancellationToken::new();
    let shadow_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        forwarder
            .forward_shadow(&url, &outbound, shadow_cancel)
            .await
    });
    let shadow = ShadowState { cancel, task };

    let response = next.run(req).await;
    let (parts, body) = response.into_parts();
    let capture = CaptureBody::new(body, move |captured| {
        shadow.finish(captured);
    });
    Response::from_parts(parts, AxumBody::new(capture))
}

/// Everything the shadow path holds for one request. Disposed at
/// end-of-request regardless of outcome.
struct ShadowState {
    cancel: CancellationToken,
    task: JoinHandle<Option<String>>,
}

impl ShadowState {
    /// End-of-request: stop the shadow if it is still running, and compare
    /// only when it already finished of its own accord. Returns the
    /// comparison outcome, or `None` when the comparison was skipped.
    fn finish(self, captured: Bytes) -> Option<ComparisonOutcome> {
        self.cancel.cancel();

        if !self.task.is_finished() {
            tracing::info!("shadow request still in flight at end of request, skipping comparison");
            return None;
        }

        match self.task.now_or_never() {
            Some(Ok(shadow_body)) => Some(compare_bodies(&captured, shadow_body.as_deref())),
            Some(Err(e)) => {
                tracing::error!(error = %e, "shadow task failed, skipping comparison");
                None
            }
            None => {
                tracing::info!(
                    "shadow request still in flight at end of request, skipping comparison"
                );
                None
            }
        }
    }
}

/// Mirror the upstream response into the client-facing one: status, headers
/// (minus the stripped set, multi-valued headers comma-joined) and the body
/// read fully as bytes.
async fn copy_response(upstream: Response<AxumBody>) -> Response {
    let (parts, body) = upstream.into_parts();

    let mut out_headers = HeaderMap::new();
    for name in parts.headers.keys() {
        if is_stripped_response_header(name) {
            continue;
        }
        let values: Vec<&str> = parts
            .headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if values.is_empty() {
            continue;
        }
        match HeaderValue::from_str(&values.join(",")) {
            Ok(value) => {
                out_headers.insert(name.clone(), value);
            }
            Err(e) => {
                tracing::error!(header = %name, error = %e, "dropping unrepresentable response header");
            }
        }
    }

    let bytes = match timeout(FORWARD_TIMEOUT, body.collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "failed to read new service response body");
            Bytes::new()
        }
        Err(_) => {
            tracing::error!("timed out reading new service response body");
            Bytes::new()
        }
    };

    let mut response = Response::new(AxumBody::from(bytes));
    *response.status_mut() = parts.status;
    *response.headers_mut() = out_headers;
    response
}

fn synthetic_response(status: StatusCode, message: &'static str) -> Response {
    Response::builder()
        .status(status)
        .body(AxumBody::from(message))
        .unwrap_or_else(|_| Response::new(AxumBody::from(message)))
}
