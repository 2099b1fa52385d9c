use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// Process-wide HTTP client over Hyper and Rustls.
///
/// Every outbound call goes to one of two configured upstreams (the legacy
/// service or the new one), so a single pooled client covers the whole
/// process and is safe to share across requests.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
}

impl HttpClientAdapter {
    pub fn new() -> Result<Self> {
        // May already be installed by the host; a second install is a no-op.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let tls = rustls::ClientConfig::builder()
            .with_root_certificates(native_root_store())
            .with_no_client_auth();

        let mut tcp = HttpConnector::new();
        tcp.enforce_http(false);

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .wrap_connector(tcp);

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
        })
    }
}

fn native_root_store() -> rustls::RootCertStore {
    let mut store = rustls::RootCertStore::empty();
    let loaded = load_native_certs();
    for error in &loaded.errors {
        tracing::warn!(%error, "skipping unloadable native root certificate");
    }
    let (added, ignored) = store.add_parsable_certificates(loaded.certs);
    tracing::debug!(added, ignored, "native root certificates loaded");
    store
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> HttpClientResult<Response<AxumBody>> {
        // Upstreams are addressed by configured URL; Host must name that
        // target, never whatever the client dialed.
        let authority = req.uri().authority().cloned().ok_or_else(|| {
            HttpClientError::InvalidRequest(format!("outbound URI {} has no host", req.uri()))
        })?;
        let host = HeaderValue::from_str(authority.as_str()).map_err(|_| {
            HttpClientError::InvalidRequest(format!("authority {authority} is not a valid Host"))
        })?;
        req.headers_mut().insert(header::HOST, host);

        let method = req.method().clone();
        let uri = req.uri().clone();
        *req.version_mut() = Version::HTTP_11;

        match self.client.request(req).await {
            Ok(response) => {
                let (mut parts, incoming) = response.into_parts();
                // The body arrives decoded; framing towards the client is
                // recomputed when it is written out.
                parts.headers.remove(header::TRANSFER_ENCODING);
                Ok(Response::from_parts(parts, AxumBody::new(incoming)))
            }
            Err(e) => {
                tracing::error!(error = %e, %method, %uri, "upstream request failed");
                Err(HttpClientError::ConnectionError(format!(
                    "{method} {uri} failed: {e}"
                )))
            }
        }
    }
}
