//! Outbound request construction and dispatch.
//!
//! Both the replace path and the shadow path build their request here so the
//! header and body handling stays identical. Failures never propagate: every
//! transport error, timeout or cancellation resolves to `None` after logging.
use std::{sync::Arc, time::Duration};

use axum::body::Body as AxumBody;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{
    HeaderMap, Method, Request, Response,
    header::{self, HeaderName, HeaderValue},
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// Marks a request as emitted by this module. Honored on inbound requests as
/// a hard bypass so the module never intercepts its own traffic.
pub static FORWARDED_HEADER: HeaderName = HeaderName::from_static("x-requestrouting-forwarded");
pub static FORWARDED_VALUE: HeaderValue = HeaderValue::from_static("true");

/// Fixed per-call timeout for forwarded requests.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Inbound headers that must not travel to the new service. Content-Type is
/// re-set explicitly from the captured value.
fn is_stripped_request_header(name: &HeaderName) -> bool {
    name == header::HOST
        || name == header::CONNECTION
        || name == header::CONTENT_LENGTH
        || name == header::EXPECT
        || name == header::TRANSFER_ENCODING
        || name == header::CONTENT_TYPE
}

/// Request material captured from the inbound request before dispatch.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Sends copies of intercepted requests to the new service through the
/// shared [`HttpClient`].
#[derive(Clone)]
pub struct Forwarder {
    client: Arc<dyn HttpClient>,
}

impl Forwarder {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Forward and wait for the upstream response. `None` on any failure.
    pub async fn forward(&self, url: &str, outbound: &OutboundRequest) -> Option<Response<AxumBody>> {
        let request = match self.build_request(url, outbound) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, url, "failed to build forwarded request");
                return None;
            }
        };

        match timeout(FORWARD_TIMEOUT, self.client.send_request(request)).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                tracing::error!(error = %e, url, "forwarded request failed");
                None
            }
            Err(_) => {
                tracing::error!(
                    url,
                    "forwarded request timed out after {}s",
                    FORWARD_TIMEOUT.as_secs()
                );
                None
            }
        }
    }

    /// Forward out-of-band and read the response body as text. Observes
    /// `cancel` at dispatch and again before reading the body; resolves to
    /// `None` on cancellation or any failure.
    pub async fn forward_shadow(
        &self,
        url: &str,
        outbound: &OutboundRequest,
        cancel: CancellationToken,
    ) -> Option<String> {
        let request = match self.build_request(url, outbound) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, url, "failed to build shadow request");
                return None;
            }
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(url, "shadow request cancelled before dispatch");
                return None;
            }
            result = timeout(FORWARD_TIMEOUT, self.client.send_request(request)) => match result {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, url, "shadow request failed");
                    return None;
                }
                Err(_) => {
                    tracing::error!(
                        url,
                        "shadow request timed out after {}s",
                        FORWARD_TIMEOUT.as_secs()
                    );
                    return None;
                }
            }
        };

        let collected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(url, "shadow request cancelled before reading response body");
                return None;
            }
            result = timeout(FORWARD_TIMEOUT, response.into_body().collect()) => match result {
                Ok(Ok(collected)) => collected.to_bytes(),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, url, "failed to read shadow response body");
                    return None;
                }
                Err(_) => {
                    tracing::error!(url, "timed out reading shadow response body");
                    return None;
                }
            }
        };

        Some(String::from_utf8_lossy(&collected).into_owned())
    }

    fn build_request(
        &self,
        url: &str,
        outbound: &OutboundRequest,
    ) -> HttpClientResult<Request<AxumBody>> {
        let attach_body = !outbound.body.is_empty()
            && (outbound.method == Method::POST || outbound.method == Method::PUT);
        let body = if attach_body {
            AxumBody::from(outbound.body.clone())
        } else {
            AxumBody::empty()
        };

        let mut request = Request::builder()
            .method(outbound.method.clone())
            .uri(url)
            .body(body)
            .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(FORWARDED_HEADER.clone(), FORWARDED_VALUE.clone());

        for (name, value) in outbound.headers.iter() {
            if is_stripped_request_header(name) || value.is_empty() {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        if attach_body && let Some(content_type) = &outbound.content_type {
            match HeaderValue::from_str(content_type) {
                Ok(value) => {
                    headers.insert(header::CONTENT_TYPE, value);
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        content_type,
                        "unparseable Content-Type, forwarding without one"
                    );
                }
            }
        }

        Ok(request)
    }
}
