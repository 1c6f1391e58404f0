//! Header policy: log sanitization and forward-header construction.
//!
//! # Responsibilities
//! - Strip secrets and client-identifying headers before logging
//! - Build the allow-listed header set forwarded to the origin
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host and rewrite Host
//!
//! # Design Decisions
//! - Both transforms are pure functions over a `HeaderMap`
//! - `HeaderName`s are stored lowercase, so membership checks are
//!   case-insensitive by construction
//! - Never trust inbound X-Forwarded-* (dropped, then set fresh)

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::http::request::ClientContext;

/// Headers never written to an exchange record.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "cf-connecting-ip",
    "x-real-ip",
    "true-client-ip",
    "x-forwarded-for",
];

/// Headers copied from the client request to the origin.
pub const FORWARD_ALLOW_LIST: &[&str] = &[
    "content-type",
    "authorization",
    "user-agent",
    "accept",
    "accept-language",
    "cache-control",
    "x-requested-with",
    "x-api-key",
    "x-auth-token",
];

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

fn is_sensitive(name: &HeaderName) -> bool {
    SENSITIVE_HEADERS.contains(&name.as_str())
}

/// Drop every sensitive header; everything else passes through unchanged.
pub fn sanitize_for_log(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_sensitive(name) {
            sanitized.append(name.clone(), value.clone());
        }
    }
    sanitized
}

/// Flatten a header map for a log record. Repeated values are comma-joined.
pub fn headers_to_log_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    map
}

/// Build the header set sent to the origin.
///
/// Only allow-listed headers survive; `host`, `origin` and `referer` never do.
/// Provenance headers are then set from `client` and `Host` is rewritten to
/// the origin's authority.
pub fn build_forward_headers(headers: &HeaderMap, client: &ClientContext, origin: &Url) -> HeaderMap {
    let mut forward = HeaderMap::new();
    for (name, value) in headers {
        if FORWARD_ALLOW_LIST.contains(&name.as_str()) {
            forward.append(name.clone(), value.clone());
        }
    }

    if let Ok(val) = HeaderValue::from_str(&client.client_ip.to_string()) {
        forward.insert(X_FORWARDED_FOR, val);
    }
    if let Ok(val) = HeaderValue::from_str(&client.scheme) {
        forward.insert(X_FORWARDED_PROTO, val);
    }
    let inbound_host = client.host.as_deref().unwrap_or("unknown");
    match HeaderValue::from_str(inbound_host) {
        Ok(val) => {
            forward.insert(X_FORWARDED_HOST, val);
        }
        Err(_) => {
            forward.insert(X_FORWARDED_HOST, HeaderValue::from_static("unknown"));
        }
    }

    if let Some(authority) = origin_authority(origin) {
        if let Ok(val) = HeaderValue::from_str(&authority) {
            forward.insert(header::HOST, val);
        }
    }

    forward
}

fn origin_authority(origin: &Url) -> Option<String> {
    let host = origin.host_str()?;
    Some(match origin.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
