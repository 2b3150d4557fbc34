pub mod auth;
pub mod chat;
pub mod documents;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod users;

use axum::http::StatusCode;

use doc_chat_core::access::AccessError;

pub use middleware::require_auth;

/// Maps access-control failures onto HTTP responses. Store failures
/// collapse to a generic 500 so internals never leak to the client.
pub(crate) fn access_error_response(error: AccessError) -> (StatusCode, String) {
    match &error {
        AccessError::InvalidCredentials | AccessError::InvalidSession => {
            (StatusCode::UNAUTHORIZED, error.to_string())
        }
        AccessError::DuplicateUsername(_) => (StatusCode::CONFLICT, error.to_string()),
        AccessError::UserNotFound(_) | AccessError::DocumentNotFound(_) => {
            (StatusCode::NOT_FOUND, error.to_string())
        }
        AccessError::Forbidden => (StatusCode::FORBIDDEN, error.to_string()),
        AccessError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal storage error".to_string(),
        ),
    }
}
