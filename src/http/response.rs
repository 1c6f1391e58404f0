//! Response decoration: CORS, hardening headers and preflight handling.
//!
//! # Responsibilities
//! - Attach the fixed CORS and hardening header set to every response
//! - Answer `OPTIONS` preflights with an empty 200 before any routing
//! - Strip hop-by-hop headers from relayed origin responses
//!
//! # Design Decisions
//! - Header set is fixed, not configurable
//! - Preflight never reaches guardrails, routing or the origin

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Fixed header set applied to every response.
pub const CORS_HEADERS: &[(&str, &str)] = &[
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-methods",
        "GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS, CONNECT",
    ),
    (
        "access-control-allow-headers",
        "Content-Type, Authorization, apikey, Upgrade, Connection, X-Requested-With, Accept, \
         Accept-Language, Cache-Control, X-API-Key, X-Auth-Token, X-CSRF-Token, X-Forwarded-For, \
         X-Forwarded-Proto, X-Real-IP, User-Agent, Origin, Referer, Proxy-Authorization",
    ),
    ("access-control-max-age", "86400"),
    ("access-control-allow-credentials", "false"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Insert the CORS and hardening headers, overriding existing values.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

/// Remove hop-by-hop headers from a relayed origin response.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Preflight short-circuit plus header decoration for everything else.
pub async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        response
    } else {
        next.run(request).await
    };

    apply_cors_headers(response.headers_mut());
    response
}
