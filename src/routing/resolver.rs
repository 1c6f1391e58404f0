//! Routing-key resolution.

use crate::error::ProxyError;
use crate::store::{Route, RouteStore};

/// A routing code and the path that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingKey<'a> {
    pub code: &'a str,
    /// Remainder of the path after the code, starting with '/' or empty.
    pub remainder: &'a str,
}

/// Split `path` into routing code and remainder.
///
/// Returns `None` for the root path, an empty first segment, or a first
/// segment listed in `reserved`.
pub fn parse_routing_key<'a>(path: &'a str, reserved: &[String]) -> Option<RoutingKey<'a>> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let (code, remainder) = match trimmed.find('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    };

    if code.is_empty() || reserved.iter().any(|r| r == code) {
        return None;
    }

    Some(RoutingKey { code, remainder })
}

/// Look up the active route for `code`.
pub async fn resolve(store: &dyn RouteStore, code: &str) -> Result<Route, ProxyError> {
    match store.get(code).await {
        Ok(Some(route)) if route.active => Ok(route),
        Ok(Some(_)) => {
            tracing::debug!(route_code = %code, "Route inactive");
            Err(ProxyError::NotFound)
        }
        Ok(None) => Err(ProxyError::NotFound),
        Err(e) => {
            tracing::error!(route_code = %code, error = %e, "Route lookup failed");
            Err(ProxyError::Store(e))
        }
    }
}
