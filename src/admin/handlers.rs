use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ProxyError, ResultExt};
use crate::http::request::RequestId;
use crate::http::server::AppState;
use crate::security::Principal;
use crate::store::{model::generate_code, ExchangeRecord, Route, StoreError};

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;
const CODE_ATTEMPTS: usize = 5;

#[derive(Serialize)]
pub struct SystemStatus {
    pub status: &'static str,
    pub mode: &'static str,
    #[serde(rename = "globalAccess")]
    pub global_access: bool,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        status: "running",
        mode: state.access_mode.as_str(),
        global_access: !state.authorizer.scopes_to_owner(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateInterceptor {
    pub name: Option<String>,
    #[serde(rename = "baseUrl", alias = "base_url")]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInterceptor {
    #[serde(alias = "is_active")]
    pub active: bool,
}

pub async fn list_interceptors(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Route>>, ApiError> {
    let owner = state
        .authorizer
        .scopes_to_owner()
        .then_some(principal.user_id.as_str());
    let routes = state.stores.routes.list(owner).await.for_request(&request_id)?;
    Ok(Json(routes))
}

pub async fn create_interceptor(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> Result<(StatusCode, Json<Route>), ApiError> {
    let input: CreateInterceptor = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::BadRequest(format!("Invalid request body: {}", e)))
        .for_request(&request_id)?;

    let (Some(name), Some(base_url)) = (input.name, input.base_url) else {
        return Err(ProxyError::BadRequest("Name and baseUrl are required".into()).with_request_id(&request_id));
    };

    let mut route = Route::new(&name, &base_url, &principal.user_id)
        .map_err(ProxyError::BadRequest)
        .for_request(&request_id)?;

    for attempt in 1..=CODE_ATTEMPTS {
        match state.stores.routes.insert(route.clone()).await {
            Ok(created) => {
                tracing::info!(
                    request_id = %request_id,
                    route_code = %created.code,
                    origin = %created.origin_base_url,
                    owner = %created.owner,
                    "Interceptor created"
                );
                return Ok((StatusCode::CREATED, Json(created)));
            }
            Err(StoreError::Conflict(_)) if attempt < CODE_ATTEMPTS => {
                route.code = generate_code();
            }
            Err(e) => return Err(ProxyError::from(e).with_request_id(&request_id)),
        }
    }

    Err(ProxyError::Internal("could not allocate a unique code".into()).with_request_id(&request_id))
}

pub async fn update_interceptor(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
    body: Bytes,
) -> Result<Json<Route>, ApiError> {
    let input: UpdateInterceptor = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::BadRequest(format!("Invalid request body: {}", e)))
        .for_request(&request_id)?;

    owned_route(&state, &principal, &code).await.for_request(&request_id)?;

    let updated = state
        .stores
        .routes
        .set_active(&code, input.active)
        .await
        .for_request(&request_id)?
        .ok_or(ProxyError::NotFound)
        .for_request(&request_id)?;

    tracing::info!(request_id = %request_id, route_code = %code, active = updated.active, "Interceptor updated");
    Ok(Json(updated))
}

pub async fn delete_interceptor(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    owned_route(&state, &principal, &code).await.for_request(&request_id)?;

    if !state.stores.routes.delete(&code).await.for_request(&request_id)? {
        return Err(ProxyError::NotFound.with_request_id(&request_id));
    }

    tracing::info!(request_id = %request_id, route_code = %code, "Interceptor deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_logs(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ExchangeRecord>>, ApiError> {
    owned_route(&state, &principal, &code).await.for_request(&request_id)?;

    let (limit, offset) = page(&params);
    let records = state
        .stores
        .exchanges
        .list_for_route(&code, limit, offset)
        .await
        .for_request(&request_id)?;
    Ok(Json(records))
}

/// Fetch a route the principal may manage. Other owners' routes are "not found".
async fn owned_route(state: &AppState, principal: &Principal, code: &str) -> Result<Route, ProxyError> {
    let route = state.stores.routes.get(code).await?.ok_or(ProxyError::NotFound)?;
    if state.authorizer.scopes_to_owner() && route.owner != principal.user_id {
        return Err(ProxyError::NotFound);
    }
    Ok(route)
}

/// Lenient paging: unparsable or zero values fall back to the defaults.
fn page(params: &HashMap<String, String>) -> (usize, usize) {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .min(MAX_LOG_LIMIT);
    let offset = params
        .get("offset")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn paging_defaults_and_caps() {
        assert_eq!(page(&params(&[])), (100, 0));
        assert_eq!(page(&params(&[("limit", "25"), ("offset", "50")])), (25, 50));
        assert_eq!(page(&params(&[("limit", "5000")])), (1000, 0));
        assert_eq!(page(&params(&[("limit", "0"), ("offset", "x")])), (100, 0));
    }

    #[test]
    fn create_body_accepts_both_spellings() {
        let a: CreateInterceptor = serde_json::from_str(r#"{"name":"a","baseUrl":"http://x"}"#).unwrap();
        let b: CreateInterceptor = serde_json::from_str(r#"{"name":"b","base_url":"http://x"}"#).unwrap();
        assert_eq!(a.base_url.as_deref(), Some("http://x"));
        assert_eq!(b.base_url.as_deref(), Some("http://x"));
    }
}
