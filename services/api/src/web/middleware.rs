//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use doc_chat_core::access::can_view_all_documents;
use doc_chat_core::domain::User;

use crate::web::state::AppState;

/// Pulls the login token out of the `session` cookie, if present.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|c| {
        let c = c.trim();
        c.strip_prefix("session=")
    })
}

/// Middleware that validates the session cookie and loads its user.
///
/// If valid, inserts the `User` into request extensions for handlers to
/// use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user = state.access.resolve_session(token).await.map_err(|e| {
        error!("Failed to resolve session: {e}");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// The admin gate used by every management handler. Funnels all
/// role-based branching through the single capability check.
pub fn require_admin(user: &User) -> Result<(), (StatusCode, String)> {
    if can_view_all_documents(user) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            "Administrator access required".to_string(),
        ))
    }
}
