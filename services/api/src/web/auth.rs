//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user login, logout, and login-state
//! restoration. Credentials are matched exactly against the stored
//! records; the failure message never says which field was wrong.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use doc_chat_core::access::AccessError;
use doc_chat_core::domain::{Role, User};

use crate::web::middleware::session_token_from_headers;
use crate::web::state::AppState;

/// Session cookie lifetime, kept in sync with the store-side expiry.
const COOKIE_MAX_AGE_SECONDS: i64 = 30 * 24 * 60 * 60;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
}

impl From<&User> for AuthResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: match user.role {
                Role::Admin => "admin".to_string(),
                Role::User => "user".to_string(),
            },
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Authenticate and open a login session
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state
        .access
        .authenticate(&req.username, &req.password)
        .await
        .map_err(|e| match e {
            AccessError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            other => {
                error!("Login failed: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Login failed".to_string(),
                )
            }
        })?;

    let session = state.access.open_session(&user).await.map_err(|e| {
        error!("Failed to open session: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to open session".to_string(),
        )
    })?;

    let cookie = format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session.token, COOKIE_MAX_AGE_SECONDS
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(&user)),
    ))
}

/// POST /auth/logout - Close the login session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = session_token_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state.access.close_session(token).await.map_err(|e| {
        error!("Failed to close session: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to logout".to_string(),
        )
    })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

/// GET /auth/me - Who is logged in (restores client login state)
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated user", body = AuthResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me_handler(
    axum::Extension(user): axum::Extension<User>,
) -> Json<AuthResponse> {
    Json(AuthResponse::from(&user))
}
