//! Per-request routing decision.
//!
//! The decision is a pure function of the request method, the buffered body
//! bytes and one configuration snapshot. All I/O (body buffering, snapshot
//! loading) happens in the interceptor before this runs, which keeps the
//! decision trivially testable.
use hyper::Method;
use quick_xml::{Reader, events::Event};

use crate::config::models::{RoutingConfig, RoutingMode};

/// Decide how a request should be routed.
///
/// An invalid snapshot, a non-GET/POST method, a missing or unparseable POST
/// body, or a body naming no configured request type all fall through to
/// [`RoutingMode::RouteOld`].
pub fn decide(method: &Method, body: Option<&[u8]>, config: &RoutingConfig) -> RoutingMode {
    if !config.is_valid {
        return RoutingMode::RouteOld;
    }

    if method == Method::GET {
        return config.get_mode;
    }

    if method != Method::POST {
        return RoutingMode::RouteOld;
    }

    if config.post_modes.is_empty() {
        return RoutingMode::RouteOld;
    }

    let Some(body) = body.filter(|bytes| !bytes.is_empty()) else {
        tracing::info!("POST request has no readable body, routing to legacy handler");
        return RoutingMode::RouteOld;
    };

    let Ok(text) = std::str::from_utf8(body) else {
        tracing::error!("POST body is not valid UTF-8, routing to legacy handler");
        return RoutingMode::RouteOld;
    };

    match first_configured_request_type(text, config) {
        Ok(Some(mode)) => mode,
        Ok(None) => RoutingMode::RouteOld,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse POST body as XML");
            RoutingMode::RouteOld
        }
    }
}

/// Scan `root/requests` and return the mode of the first direct child (in
/// document order) whose local name is configured in `post_modes`.
fn first_configured_request_type(
    text: &str,
    config: &RoutingConfig,
) -> Result<Option<RoutingMode>, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    let mut depth = 0usize;
    let mut in_requests = false;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                depth += 1;
                if in_requests {
                    if depth == 3
                        && let Some(mode) = lookup_local_name(start.local_name().as_ref(), config)
                    {
                        return Ok(Some(mode));
                    }
                } else if depth == 2 && start.local_name().as_ref() == b"requests" {
                    in_requests = true;
                }
            }
            Event::Empty(empty) => {
                // Self-closing element; depth is unchanged.
                if in_requests
                    && depth == 2
                    && let Some(mode) = lookup_local_name(empty.local_name().as_ref(), config)
                {
                    return Ok(Some(mode));
                }
            }
            Event::End(_) => {
                if in_requests && depth == 2 {
                    // Left the requests element, nothing matched.
                    return Ok(None);
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn lookup_local_name(local_name: &[u8], config: &RoutingConfig) -> Option<RoutingMode> {
    let name = std::str::from_utf8(local_name).ok()?;
    config.post_mode(name)
}
