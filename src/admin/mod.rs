//! Administrative API: interceptor CRUD and exchange-log queries.
//!
//! # Data Flow
//! ```text
//! /api/interceptors[/...]
//!     → auth.rs (Authorization: Bearer → Principal extension)
//!     → handlers.rs (RouteStore / ExchangeStore calls)
//! ```
//!
//! In the open posture every caller acts as the system owner and sees all
//! routes. In the session posture listings are scoped to the caller and
//! other owners' routes are reported as not found.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/interceptors", get(list_interceptors).post(create_interceptor))
        .route(
            "/api/interceptors/{code}",
            patch(update_interceptor).delete(delete_interceptor),
        )
        .route("/api/interceptors/{code}/logs", get(get_logs))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
