//! Guardrail filter: the cheap rejects run before any route lookup.
//!
//! Order is rate limit, declared size, then content type. A rejection
//! short-circuits the pipeline and produces no exchange record.

use std::net::IpAddr;

use axum::http::HeaderMap;

use crate::config::GuardrailConfig;
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::security::limits::check_request_headers;
use crate::security::rate_limit::{RateDecision, RateLimiter};

pub fn admit(
    limiter: &RateLimiter,
    config: &GuardrailConfig,
    client_ip: IpAddr,
    headers: &HeaderMap,
) -> Result<(), ProxyError> {
    if let RateDecision::Limited { retry_after } = limiter.check(&client_ip.to_string()) {
        tracing::warn!(client_ip = %client_ip, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
        metrics::record_guardrail_rejection("rate_limit");
        return Err(ProxyError::RateLimited);
    }

    check_request_headers(headers, config).map_err(|err| {
        let reason = match err {
            ProxyError::PayloadTooLarge => "payload_too_large",
            ProxyError::UnsupportedMediaType => "unsupported_media_type",
            _ => "other",
        };
        tracing::debug!(client_ip = %client_ip, reason, "Guardrail rejected request");
        metrics::record_guardrail_rejection(reason);
        err
    })
}
