use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::security::access_control::admin_credential;

/// Resolve the caller and attach its `Principal` for the handlers.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = state
        .authorizer
        .authenticate(admin_credential(request.headers()))
        .await;

    match principal {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => {
            let request_id = request.request_id();
            tracing::debug!(request_id = %request_id, error = %err, "Admin request rejected");
            err.with_request_id(&request_id).into_response()
        }
    }
}
