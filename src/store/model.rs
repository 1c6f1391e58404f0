//! Records exchanged with the store collaborators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

const CODE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const CODE_LEN: usize = 6;

/// Owner recorded for routes created in the open posture.
pub const SYSTEM_OWNER: &str = "system";

/// A proxy route (an "interceptor"): routing code to origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Short opaque routing code, unique.
    #[serde(rename = "id")]
    pub code: String,
    pub name: String,
    /// Absolute origin URL without a trailing slash.
    #[serde(rename = "base_url")]
    pub origin_base_url: String,
    #[serde(rename = "is_active")]
    pub active: bool,
    #[serde(rename = "user_id")]
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl Route {
    /// Create an active route with a fresh code.
    pub fn new(name: &str, base_url: &str, owner: &str) -> Result<Self, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Name and baseUrl are required".to_string());
        }
        Ok(Self {
            code: generate_code(),
            name: name.to_string(),
            origin_base_url: normalize_origin(base_url)?,
            active: true,
            owner: owner.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Parsed origin URL.
    pub fn origin(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.origin_base_url)
    }

    /// Origin URL for a path remainder (starting with '/' or empty) and query.
    pub fn target_url(&self, remainder: &str, query: Option<&str>) -> String {
        let mut target = format!("{}{}", self.origin_base_url, remainder);
        if let Some(q) = query {
            if remainder.is_empty() {
                target.push('/');
            }
            target.push('?');
            target.push_str(q);
        }
        target
    }
}

/// Validate an origin URL and strip its trailing slash.
///
/// Only plain `http` origins are accepted: the forwarder does not originate TLS.
pub fn normalize_origin(base_url: &str) -> Result<String, String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err("Name and baseUrl are required".to_string());
    }
    let url = Url::parse(trimmed).map_err(|e| format!("Invalid baseUrl: {}", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("Unsupported baseUrl scheme '{}'; expected http or https", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("Invalid baseUrl: missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("Invalid baseUrl: query and fragment are not allowed".to_string());
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Six random lowercase base-36 characters.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// An authenticated session owned by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeOutcome {
    /// The full response was relayed to the client.
    Completed,
    /// The response stream ended early (client disconnect or origin error).
    Incomplete,
    /// The origin could not be reached; the client got a proxy error.
    UpstreamFailure,
}

/// One logged request/response cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub id: Uuid,
    pub request_id: String,
    pub route_code: String,
    pub resolved_origin_url: String,
    pub original_request_path: String,
    pub method: String,
    pub sanitized_request_headers: BTreeMap<String, String>,
    pub request_body: Option<String>,
    pub response_status: u16,
    pub sanitized_response_headers: BTreeMap<String, String>,
    pub response_body: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: ExchangeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
