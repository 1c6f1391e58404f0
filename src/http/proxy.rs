//! The proxy hop handler.
//!
//! # Data Flow
//! ```text
//! /{code}/{*rest}
//!     → parse routing key (reserved prefixes fall through as 404)
//!     → guardrails (rate, size, content type)
//!     → resolve route (fresh store read) → authorize
//!     → read body up to the ceiling
//!     → build forward headers → forward to origin
//!     → relay response through CaptureBody
//!     → on stream end: ExchangeLogger::emit
//! ```

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    response::Response,
};

use crate::error::ProxyError;
use crate::http::capture::CaptureBody;
use crate::http::forward::{forward, OriginRequest};
use crate::http::request::{ClientContext, RequestId, RequestIdExt, X_REQUEST_ID};
use crate::http::response::strip_hop_by_hop;
use crate::http::server::AppState;
use crate::observability::{metrics, ExchangeDraft, ExchangeResponse};
use crate::routing::{parse_routing_key, resolve};
use crate::security::access_control::{proxy_credential, AccessDecision};
use crate::security::guardrail;
use crate::security::headers::{build_forward_headers, headers_to_log_map, sanitize_for_log};
use crate::security::limits::{content_type, is_loggable_content_type, read_body_capped};
use crate::store::ExchangeOutcome;

/// Entry point for every path not claimed by the status or admin routes.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request.request_id();
    let method = request.method().to_string();

    let response = match proxy_exchange(&state, request, &request_id, started).await {
        Ok(response) => response,
        Err(err) => err.into_response_for(&request_id),
    };

    metrics::record_request(&method, response.status().as_u16(), started);
    response
}

async fn proxy_exchange(
    state: &AppState,
    request: Request<Body>,
    request_id: &RequestId,
    started: Instant,
) -> Result<Response, ProxyError> {
    let policy = state.policy.load_full();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let path = request.uri().path().to_string();
    let key = parse_routing_key(&path, &policy.reserved_prefixes).ok_or(ProxyError::NotFound)?;

    guardrail::admit(&state.limiter, &policy.guardrails, client_ip, request.headers())?;

    let route = resolve(state.stores.routes.as_ref(), key.code).await?;

    let decision = state
        .authorizer
        .authorize(proxy_credential(request.headers()), &route)
        .await?;
    if let AccessDecision::Deny(reason) = decision {
        tracing::debug!(request_id = %request_id, route_code = %route.code, reason = reason.as_str(), "Access denied");
        return Err(reason.into_error());
    }

    let origin = route
        .origin()
        .map_err(|e| ProxyError::Internal(format!("stored origin for {} is invalid: {}", route.code, e)))?;
    let client = ClientContext::from_request(&request, client_ip);
    let query = request.uri().query().map(str::to_string);
    let target = route.target_url(key.remainder, query.as_deref());
    let original_request_path = match &query {
        Some(q) => format!("{}?{}", path, q),
        None => path.clone(),
    };

    let (parts, body) = request.into_parts();
    let body = read_body_capped(body, policy.guardrails.max_body_bytes).await?;
    let request_body = is_loggable_content_type(content_type(&parts.headers))
        .then(|| String::from_utf8_lossy(&body).into_owned());

    let mut forward_headers = build_forward_headers(&parts.headers, &client, &origin);
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        forward_headers.insert(X_REQUEST_ID, value);
    }

    let draft = ExchangeDraft {
        request_id: request_id.to_string(),
        route_code: route.code.clone(),
        resolved_origin_url: target.clone(),
        original_request_path,
        method: parts.method.to_string(),
        request_headers: headers_to_log_map(&sanitize_for_log(&parts.headers)),
        request_body,
        started,
    };

    tracing::debug!(
        request_id = %request_id,
        route_code = %route.code,
        method = %parts.method,
        target = %target,
        "Forwarding request"
    );

    let outbound = OriginRequest {
        method: parts.method,
        target,
        headers: forward_headers,
        body,
    };

    let origin_response = match forward(&state.client, outbound, policy.upstream_timeout).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                route_code = %route.code,
                target = %draft.resolved_origin_url,
                error = %err,
                "Upstream request failed"
            );
            metrics::record_upstream_failure(err.kind());

            let detail = err.to_string();
            let error = ProxyError::from(err);
            let error_body = serde_json::to_string(&error.body(request_id.as_str()))
                .unwrap_or_else(|_| error.to_string());
            state.exchanges.emit(draft.finish(ExchangeResponse {
                status: error.status().as_u16(),
                headers: BTreeMap::new(),
                body: error_body,
                outcome: ExchangeOutcome::UpstreamFailure,
                error: Some(detail),
            }));
            return Err(error);
        }
    };

    let (mut parts, body) = origin_response.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    let status = parts.status.as_u16();
    let response_headers = headers_to_log_map(&sanitize_for_log(&parts.headers));
    let response_content_type = content_type(&parts.headers).map(str::to_string);
    let logger = state.exchanges.clone();

    let body = CaptureBody::new(body, policy.guardrails.max_body_bytes, move |capture| {
        let outcome = if capture.completed {
            ExchangeOutcome::Completed
        } else {
            ExchangeOutcome::Incomplete
        };
        let body = capture.render_body(response_content_type.as_deref());
        logger.emit(draft.finish(ExchangeResponse {
            status,
            headers: response_headers,
            body,
            outcome,
            error: capture.error,
        }));
    });

    Ok(Response::from_parts(parts, Body::new(body)))
}
