//! Access control for proxy routes and the admin API.
//!
//! Two postures are supported. `OpenAccess` lets every caller reach every
//! active route. `SessionAccess` requires a bearer session issued by the auth
//! collaborator and restricts each route to its owner.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName};
use chrono::Utc;

use crate::error::ProxyError;
use crate::store::{Route, SessionStore, StoreError, SYSTEM_OWNER};

/// The caller an admin request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingCredential,
    InvalidCredential,
    Expired,
    NotOwner,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingCredential => "missing_credential",
            DenyReason::InvalidCredential => "invalid_credential",
            DenyReason::Expired => "expired",
            DenyReason::NotOwner => "not_owner",
        }
    }

    /// Map a denial to its client-facing error. Non-owners see the route as absent.
    pub fn into_error(self) -> ProxyError {
        match self {
            DenyReason::MissingCredential => ProxyError::Unauthorized("Authentication required".into()),
            DenyReason::InvalidCredential => ProxyError::Unauthorized("Invalid session".into()),
            DenyReason::Expired => ProxyError::Unauthorized("Session expired".into()),
            DenyReason::NotOwner => ProxyError::NotFound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow { owner: String },
    Deny(DenyReason),
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Resolve a bearer credential to a principal.
    async fn authenticate(&self, bearer: Option<&str>) -> Result<Principal, ProxyError>;

    /// Decide whether a caller may use `route`.
    async fn authorize(&self, bearer: Option<&str>, route: &Route) -> Result<AccessDecision, StoreError>;

    /// Whether admin listings are scoped to the principal's own routes.
    fn scopes_to_owner(&self) -> bool;
}

/// Global posture: everyone acts as the system owner.
#[derive(Debug, Default, Clone)]
pub struct OpenAccess;

#[async_trait]
impl Authorizer for OpenAccess {
    async fn authenticate(&self, _bearer: Option<&str>) -> Result<Principal, ProxyError> {
        Ok(Principal {
            user_id: SYSTEM_OWNER.to_string(),
        })
    }

    async fn authorize(&self, _bearer: Option<&str>, route: &Route) -> Result<AccessDecision, StoreError> {
        Ok(AccessDecision::Allow {
            owner: route.owner.clone(),
        })
    }

    fn scopes_to_owner(&self) -> bool {
        false
    }
}

/// Scoped posture: a valid, unexpired session owning the route is required.
pub struct SessionAccess {
    sessions: Arc<dyn SessionStore>,
}

impl SessionAccess {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    async fn principal(&self, bearer: Option<&str>) -> Result<Result<Principal, DenyReason>, StoreError> {
        let Some(token) = bearer else {
            return Ok(Err(DenyReason::MissingCredential));
        };
        let Some(session) = self.sessions.get_session(token).await? else {
            return Ok(Err(DenyReason::InvalidCredential));
        };
        if session.is_expired_at(Utc::now()) {
            return Ok(Err(DenyReason::Expired));
        }
        Ok(Ok(Principal {
            user_id: session.user_id,
        }))
    }
}

#[async_trait]
impl Authorizer for SessionAccess {
    async fn authenticate(&self, bearer: Option<&str>) -> Result<Principal, ProxyError> {
        self.principal(bearer).await?.map_err(DenyReason::into_error)
    }

    async fn authorize(&self, bearer: Option<&str>, route: &Route) -> Result<AccessDecision, StoreError> {
        Ok(match self.principal(bearer).await? {
            Ok(principal) if principal.user_id == route.owner => AccessDecision::Allow {
                owner: principal.user_id,
            },
            Ok(_) => AccessDecision::Deny(DenyReason::NotOwner),
            Err(reason) => AccessDecision::Deny(reason),
        })
    }

    fn scopes_to_owner(&self) -> bool {
        true
    }
}

/// Extract a bearer token from the named header.
pub fn bearer_token<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    let value = headers.get(name)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Credential presented on proxied requests. `Authorization` belongs to the origin.
pub fn proxy_credential(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers, &header::PROXY_AUTHORIZATION)
}

/// Credential presented on admin requests.
pub fn admin_credential(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers, &header::AUTHORIZATION)
}
