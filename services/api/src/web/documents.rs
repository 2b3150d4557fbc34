//! services/api/src/web/documents.rs
//!
//! Document endpoints: the accessible-documents listing for every
//! signed-in user, plus the administrator upload/edit/delete surface.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use doc_chat_core::domain::{Document, DocumentKind, User};

use crate::ingest::ingest_file;
use crate::web::access_error_response;
use crate::web::middleware::require_admin;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DocumentView {
    pub id: Uuid,
    pub name: String,
    pub instruction: String,
    pub uploaded_at: DateTime<Utc>,
    pub kind: String,
    /// Length of the extracted content in characters; the content
    /// itself is only ever sent to the completion service.
    pub content_chars: usize,
}

impl From<&Document> for DocumentView {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            name: document.name.clone(),
            instruction: document.instruction.clone(),
            uploaded_at: document.uploaded_at,
            kind: match document.kind {
                DocumentKind::Pdf => "pdf".to_string(),
                DocumentKind::Text => "text".to_string(),
            },
            content_chars: document.content.chars().count(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateInstructionRequest {
    pub instruction: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /documents - The caller's accessible documents
///
/// Regular users see their accessible set in collection order;
/// administrators see the whole collection.
#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Accessible documents", body = [DocumentView])
    )
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
) -> Result<Json<Vec<DocumentView>>, (StatusCode, String)> {
    let documents = state
        .access
        .list_accessible_documents(&user)
        .await
        .map_err(|e| {
            error!("Failed to list documents: {e}");
            access_error_response(e)
        })?;
    Ok(Json(documents.iter().map(DocumentView::from).collect()))
}

/// POST /documents - Upload and ingest a document
///
/// Accepts a multipart/form-data request with a single file part. The
/// declared media type selects the ingestion branch; extraction
/// failures leave the collection unmodified.
#[utoipa::path(
    post,
    path = "/documents",
    request_body(content_type = "multipart/form-data", description = "The document to upload."),
    responses(
        (status = 201, description = "Document ingested", body = DocumentView),
        (status = 400, description = "Missing file part"),
        (status = 403, description = "Not an administrator"),
        (status = 422, description = "Extraction failed")
    )
)]
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(caller): axum::Extension<User>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&caller)?;

    let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })?
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    };

    let file_name = field.file_name().unwrap_or("untitled.txt").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("text/plain")
        .to_string();
    let bytes = field.bytes().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read file bytes: {}", e),
        )
    })?;

    let document = ingest_file(&bytes, &content_type, &file_name)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let view = DocumentView::from(&document);

    state
        .access
        .add_document(document)
        .await
        .map_err(access_error_response)?;

    info!("Ingested document '{}' ({})", view.name, view.kind);
    Ok((StatusCode::CREATED, Json(view)))
}

/// PUT /documents/{id}/instruction - Edit the assistant guidance
#[utoipa::path(
    put,
    path = "/documents/{id}/instruction",
    request_body = UpdateInstructionRequest,
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Updated document", body = DocumentView),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Unknown document")
    )
)]
pub async fn update_instruction_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(caller): axum::Extension<User>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<UpdateInstructionRequest>,
) -> Result<Json<DocumentView>, (StatusCode, String)> {
    require_admin(&caller)?;
    let document = state
        .access
        .update_instruction(document_id, &req.instruction)
        .await
        .map_err(access_error_response)?;
    Ok(Json(DocumentView::from(&document)))
}

/// DELETE /documents/{id} - Remove a document
///
/// Also prunes the id from every user's accessible set so no dangling
/// references survive.
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document removed"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Unknown document")
    )
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(caller): axum::Extension<User>,
    Path(document_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_admin(&caller)?;
    state
        .access
        .delete_document(document_id)
        .await
        .map_err(access_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
