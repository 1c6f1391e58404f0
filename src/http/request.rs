//! Request identification and client context.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Expose it to handlers as an extension and echo it in `x-request-id`
//! - Extract proxy-provenance facts (client IP, scheme, Host)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied `x-request-id` is replaced, so ids stay unique

use std::net::IpAddr;
use std::task::{Context, Poll};

use axum::http::{header, HeaderValue, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier assigned to each inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access the request ID attached by [`RequestIdLayer`].
pub trait RequestIdExt {
    /// The attached id, or a fresh one when the layer is absent.
    fn request_id(&self) -> RequestId;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> RequestId {
        self.extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_default()
    }
}

/// Layer assigning a [`RequestId`] to every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let id = RequestId::new();
        let header_value = HeaderValue::from_str(id.as_str()).ok();

        if let Some(value) = &header_value {
            request.headers_mut().insert(X_REQUEST_ID, value.clone());
        }
        request.extensions_mut().insert(id);

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            if let Some(value) = header_value {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            Ok(response)
        })
    }
}

/// Provenance of the inbound request as seen by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Peer address of the TCP connection.
    pub client_ip: IpAddr,
    /// Inbound scheme ("http" unless the request line carried one).
    pub scheme: String,
    /// Inbound `Host` header, if any.
    pub host: Option<String>,
}

impl ClientContext {
    pub fn from_request<B>(request: &Request<B>, client_ip: IpAddr) -> Self {
        let scheme = request
            .uri()
            .scheme_str()
            .unwrap_or("http")
            .to_string();
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| request.uri().authority().map(|a| a.to_string()));

        Self {
            client_ip,
            scheme,
            host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::convert::Infallible;
    use tower::ServiceExt;

    #[tokio::test]
    async fn assigns_fresh_id_and_echoes_it() {
        let service = RequestIdLayer.layer(tower::service_fn(|req: Request<Body>| async move {
            let id = req.request_id();
            let seen = req.headers().get(X_REQUEST_ID).cloned();
            assert_eq!(seen.unwrap().to_str().unwrap(), id.as_str());
            Ok::<_, Infallible>(Response::new(Body::from(id.to_string())))
        }));

        let request = Request::builder()
            .header(X_REQUEST_ID, "client-chosen")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();

        let echoed = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert_ne!(echoed, "client-chosen");
        assert!(Uuid::parse_str(echoed).is_ok());
    }

    #[test]
    fn client_context_reads_host_and_scheme() {
        let request = Request::builder()
            .uri("/ab12cd/users")
            .header("host", "proxy.local:3002")
            .body(())
            .unwrap();
        let ctx = ClientContext::from_request(&request, "10.0.0.7".parse().unwrap());
        assert_eq!(ctx.scheme, "http");
        assert_eq!(ctx.host.as_deref(), Some("proxy.local:3002"));

        let request = Request::builder()
            .uri("https://edge.example/ab12cd")
            .body(())
            .unwrap();
        let ctx = ClientContext::from_request(&request, "10.0.0.7".parse().unwrap());
        assert_eq!(ctx.scheme, "https");
        assert_eq!(ctx.host.as_deref(), Some("edge.example"));
    }
}
