//! Error taxonomy and the structured JSON error body.
//!
//! Every client-visible failure renders as
//! `{error, message, timestamp, requestId, details?}` on the matching status.
//! `details` is only populated for upstream failures; store and internal
//! faults keep their detail in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::http::request::RequestId;
use crate::store::StoreError;

/// Failure reaching the origin.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid target url '{0}'")]
    InvalidTarget(String),
    #[error("origin request failed: {0}")]
    Connect(String),
    #[error("origin did not respond within {0}s")]
    Timeout(u64),
}

impl UpstreamError {
    /// Short label used for metrics and log records.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::InvalidTarget(_) => "invalid_target",
            UpstreamError::Connect(_) => "connect",
            UpstreamError::Timeout(_) => "timeout",
        }
    }
}

/// Errors surfaced by the request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Request too large")]
    PayloadTooLarge,
    #[error("Unsupported content type")]
    UnsupportedMediaType,
    #[error("Interceptor not found")]
    NotFound,
    #[error("{0}")]
    Unauthorized(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Proxy error")]
    Upstream(#[source] UpstreamError),
    #[error("Store error")]
    Store(#[from] StoreError),
    #[error("Internal server error")]
    Internal(String),
}

impl From<UpstreamError> for ProxyError {
    fn from(err: UpstreamError) -> Self {
        ProxyError::Upstream(err)
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::Upstream(_) | ProxyError::Store(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Category string placed in the `error` field.
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::BadRequest(_)
            | ProxyError::PayloadTooLarge
            | ProxyError::UnsupportedMediaType => "ClientError",
            ProxyError::NotFound => "NotFound",
            ProxyError::Unauthorized(_) => "Unauthorized",
            ProxyError::RateLimited => "RateLimited",
            ProxyError::Upstream(_) => "UpstreamFailure",
            ProxyError::Store(_) | ProxyError::Internal(_) => "InternalFault",
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ProxyError::Upstream(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Build the JSON body for this error.
    pub fn body(&self, request_id: &str) -> ErrorBody {
        ErrorBody {
            error: self.category(),
            message: self.to_string(),
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            details: self.details(),
        }
    }

    /// Render this error tagged with the request's id.
    pub fn into_response_for(self, request_id: &RequestId) -> Response {
        ApiError {
            error: self,
            request_id: request_id.to_string(),
        }
        .into_response()
    }

    pub fn with_request_id(self, request_id: &RequestId) -> ApiError {
        ApiError {
            error: self,
            request_id: request_id.to_string(),
        }
    }
}

/// Serialized error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A `ProxyError` bound to the request it failed.
#[derive(Debug)]
pub struct ApiError {
    pub error: ProxyError,
    pub request_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id, error = ?self.error, "Request failed");
        }
        (status, Json(self.error.body(&self.request_id))).into_response()
    }
}

/// Attach the request id to any error convertible into `ProxyError`.
pub trait ResultExt<T> {
    fn for_request(self, request_id: &RequestId) -> Result<T, ApiError>;
}

impl<T, E: Into<ProxyError>> ResultExt<T> for Result<T, E> {
    fn for_request(self, request_id: &RequestId) -> Result<T, ApiError> {
        self.map_err(|e| e.into().with_request_id(request_id))
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.with_request_id(&RequestId::new()).into_response()
    }
}
