//! Size and content-type guardrails.
//!
//! # Responsibilities
//! - Reject declared content-lengths over the ceiling before any body is read
//! - Read bodies with a hard cap, whatever the declared length claimed
//! - Decide which content types are loggable, optionally rejecting the rest
//!
//! # Design Decisions
//! - Declared-length check is cheap and happens before route lookup
//! - Absent content-type is always admissible

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};

use crate::config::GuardrailConfig;
use crate::error::ProxyError;

/// Content types captured as text in exchange records.
pub const LOGGABLE_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "text/",
    "application/x-www-form-urlencoded",
];

/// True when a body of this content type may be logged as text.
pub fn is_loggable_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            LOGGABLE_CONTENT_TYPES.iter().any(|t| ct.contains(t))
        }
        None => false,
    }
}

pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Declared `content-length`, if present and numeric.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Header-only checks run before routing: size, then content type.
pub fn check_request_headers(headers: &HeaderMap, config: &GuardrailConfig) -> Result<(), ProxyError> {
    if let Some(len) = declared_length(headers) {
        if len > config.max_body_bytes as u64 {
            return Err(ProxyError::PayloadTooLarge);
        }
    }

    if config.reject_unloggable_content_types {
        if let Some(ct) = content_type(headers) {
            if !is_loggable_content_type(Some(ct)) {
                return Err(ProxyError::UnsupportedMediaType);
            }
        }
    }

    Ok(())
}

/// Read a request body, never buffering more than `limit` bytes.
pub async fn read_body_capped(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ProxyError::PayloadTooLarge)
}
