//! services/api/src/web/users.rs
//!
//! Administrator endpoints for managing user accounts and their
//! per-document access grants.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use doc_chat_core::domain::{Role, User};

use crate::web::access_error_response;
use crate::web::middleware::require_admin;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    /// Ids of the documents this user may converse with.
    pub document_ids: Vec<Uuid>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: match user.role {
                Role::Admin => "admin".to_string(),
                Role::User => "user".to_string(),
            },
            document_ids: user.document_ids.clone(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /users - List every account
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All user accounts", body = [UserView]),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(caller): axum::Extension<User>,
) -> Result<Json<Vec<UserView>>, (StatusCode, String)> {
    require_admin(&caller)?;
    let users = state.access.list_users().await.map_err(|e| {
        error!("Failed to list users: {e}");
        access_error_response(e)
    })?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

/// POST /users - Create a regular account
///
/// The role is always `user`; administrators cannot be created here.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserView),
        (status = 403, description = "Not an administrator"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(caller): axum::Extension<User>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&caller)?;
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username and password must not be empty".to_string(),
        ));
    }
    let user = state
        .access
        .create_user(&req.username, &req.password)
        .await
        .map_err(access_error_response)?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

/// DELETE /users/{id} - Remove an account
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account removed"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(caller): axum::Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&caller)?;
    state
        .access
        .delete_user(user_id)
        .await
        .map_err(access_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/{id}/documents/{document_id}/toggle - Grant or revoke access
///
/// One symmetric operation: grants when the document is not in the
/// user's accessible set, revokes when it is.
#[utoipa::path(
    post,
    path = "/users/{id}/documents/{document_id}/toggle",
    params(
        ("id" = Uuid, Path, description = "User id"),
        ("document_id" = Uuid, Path, description = "Document id")
    ),
    responses(
        (status = 200, description = "Updated account", body = UserView),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Unknown user or document")
    )
)]
pub async fn toggle_access_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(caller): axum::Extension<User>,
    Path((user_id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<UserView>, (StatusCode, String)> {
    require_admin(&caller)?;
    let user = state
        .access
        .toggle_access(user_id, document_id)
        .await
        .map_err(access_error_response)?;
    Ok(Json(UserView::from(&user)))
}
