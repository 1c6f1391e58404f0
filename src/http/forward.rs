//! Proxy forwarder: the single HTTP hop to a route's origin.
//!
//! # Responsibilities
//! - Build the origin request from method, target URL, forward headers, body
//! - Bound connection setup and the wait for response headers
//! - Hand back the origin response with its body still streaming
//!
//! # Design Decisions
//! - No retries: an origin failure is reported once and surfaced as a proxy error
//! - Dropping the returned body aborts the origin transfer

use std::error::Error as StdError;
use std::sync::OnceLock;
use std::time::Duration;

use axum::http::{HeaderMap, Method, Request, Response, Uri};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TimeoutConfig;
use crate::error::UpstreamError;

/// Pooled HTTP/1.1 client used for every origin call, plain or TLS.
pub type OriginClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

pub fn build_client(timeouts: &TimeoutConfig) -> OriginClient {
    static CRYPTO_PROVIDER: OnceLock<()> = OnceLock::new();
    CRYPTO_PROVIDER.get_or_init(|| {
        // Err only means a provider is already installed for the process.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });

    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
    connector.set_nodelay(true);
    connector.enforce_http(false);

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(connector);

    Client::builder(TokioExecutor::new()).build(https)
}

/// A fully prepared origin request.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Send `request` and wait at most `timeout` for the response headers.
pub async fn forward(
    client: &OriginClient,
    request: OriginRequest,
    timeout: Duration,
) -> Result<Response<Incoming>, UpstreamError> {
    let uri: Uri = request
        .target
        .parse()
        .map_err(|_| UpstreamError::InvalidTarget(request.target.clone()))?;

    let mut builder = Request::builder().method(request.method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        *headers = request.headers;
    }
    let outbound = builder
        .body(Full::new(request.body))
        .map_err(|_| UpstreamError::InvalidTarget(request.target.clone()))?;

    match tokio::time::timeout(timeout, client.request(outbound)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(UpstreamError::Connect(error_chain(&e))),
        Err(_) => Err(UpstreamError::Timeout(timeout.as_secs())),
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
