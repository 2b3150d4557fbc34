//! services/api/src/web/chat.rs
//!
//! The conversation engine: per-chat state machine, prompt assembly,
//! and the HTTP handlers for opening, driving, and exporting chats.
//!
//! Each chat moves `Idle -> Sending -> Idle`. A submission is refused
//! while one is outstanding, so exactly one completion request is in
//! flight per chat; there are no retries, timeouts, or cancellation.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use doc_chat_core::access::{AccessControl, AccessError};
use doc_chat_core::domain::{Document, Message, MessageRole, SourceMode, User};
use doc_chat_core::ports::{ChatCompletionService, ChatTurn, CompletionRequest};

use crate::export::{export_messages, ExportFormat};
use crate::web::access_error_response;
use crate::web::state::{AppState, ChatPhase, ChatRegistry, ChatSession};

/// Fixed persona prepended to every system instruction.
const PERSONA: &str =
    "You are a helpful assistant answering questions about the document provided below.";

/// Fixed directive closing every system instruction.
const LANGUAGE_DIRECTIVE: &str = "Always reply in the same language the user writes in.";

/// Only this many leading characters of the document are sent per turn.
const DOC_CONTEXT_MAX_CHARS: usize = 30_000;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct OpenChatRequest {
    pub document_id: Uuid,
    #[schema(value_type = String, example = "doc")]
    pub mode: SourceMode,
}

#[derive(Serialize, ToSchema)]
pub struct ChatView {
    pub chat_id: Uuid,
    pub document_id: Uuid,
    #[schema(value_type = String)]
    pub mode: SourceMode,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitRequest {
    pub prompt: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SetModeRequest {
    #[schema(value_type = String, example = "web")]
    pub mode: SourceMode,
}

#[derive(Deserialize, ToSchema)]
pub struct DeleteMessagesRequest {
    pub message_ids: Vec<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct ExportRequest {
    pub message_ids: Vec<u64>,
    pub format: ExportFormat,
}

#[derive(Serialize, ToSchema)]
pub struct MessageView {
    pub id: u64,
    #[schema(value_type = String)]
    pub role: MessageRole,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub mode: SourceMode,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            role: message.role,
            text: message.text.clone(),
            sent_at: message.sent_at,
            mode: message.mode,
        }
    }
}

//=========================================================================================
// Engine Core
//=========================================================================================

/// Failure modes of one conversation turn.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,
    #[error("Chat not found")]
    UnknownChat,
    #[error("Chat belongs to another user")]
    NotOwner,
    #[error("A reply is already being generated")]
    Busy,
    #[error(transparent)]
    Document(AccessError),
    #[error("OPENAI_API_KEY is not configured; the assistant is unavailable")]
    MissingCredential,
    #[error("{0}")]
    Service(String),
}

/// Concatenates the fixed persona, the truncated document content, the
/// document's instruction, and the language directive.
fn build_system_instruction(document: &Document) -> String {
    format!(
        "{PERSONA}\n\nDOCUMENT:\n{}\n\nINSTRUCTION:\n{}\n\n{LANGUAGE_DIRECTIVE}",
        truncate_chars(&document.content, DOC_CONTEXT_MAX_CHARS),
        document.instruction,
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Runs one turn of the conversation state machine.
///
/// The in-flight guard and the optimistic user-message append happen
/// under a single lock acquisition; the completion call runs unlocked
/// so other chats keep moving. Whatever the outcome, the chat returns
/// to `Idle` and the optimistic user message stays in the log.
pub(crate) async fn run_submit(
    access: &AccessControl,
    chat_service: Option<Arc<dyn ChatCompletionService>>,
    chats: &ChatRegistry,
    user: &User,
    chat_id: Uuid,
    prompt: &str,
) -> Result<Message, SubmitError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(SubmitError::EmptyPrompt);
    }

    let (document_id, mode, history) = {
        let mut sessions = chats.lock().await;
        let chat = sessions.get_mut(&chat_id).ok_or(SubmitError::UnknownChat)?;
        if chat.user_id != user.id {
            return Err(SubmitError::NotOwner);
        }
        if chat.phase == ChatPhase::Sending {
            return Err(SubmitError::Busy);
        }
        let history: Vec<ChatTurn> = chat.messages.iter().map(ChatTurn::from).collect();
        chat.push_message(MessageRole::User, prompt.to_string(), chat.mode);
        chat.phase = ChatPhase::Sending;
        (chat.document_id, chat.mode, history)
    };

    let outcome =
        complete_turn(access, chat_service, user, document_id, mode, history, prompt).await;

    let mut sessions = chats.lock().await;
    let Some(chat) = sessions.get_mut(&chat_id) else {
        // The chat was closed while the request was in flight.
        return Err(SubmitError::UnknownChat);
    };
    chat.phase = ChatPhase::Idle;
    match outcome {
        Ok(text) => Ok(chat.push_message(MessageRole::Model, text, mode)),
        Err(e) => Err(e),
    }
}

async fn complete_turn(
    access: &AccessControl,
    chat_service: Option<Arc<dyn ChatCompletionService>>,
    user: &User,
    document_id: Uuid,
    mode: SourceMode,
    history: Vec<ChatTurn>,
    prompt: &str,
) -> Result<String, SubmitError> {
    let document = access
        .document_for_user(user, document_id)
        .await
        .map_err(SubmitError::Document)?;
    let service = chat_service.ok_or(SubmitError::MissingCredential)?;
    let request = CompletionRequest {
        system_instruction: build_system_instruction(&document),
        history,
        prompt: prompt.to_string(),
        web_search: mode.wants_web_search(),
    };
    service
        .complete(request)
        .await
        .map_err(|e| SubmitError::Service(e.to_string()))
}

fn submit_error_response(error: SubmitError) -> (StatusCode, String) {
    match error {
        SubmitError::Document(e) => access_error_response(e),
        other => {
            let status = match &other {
                SubmitError::EmptyPrompt => StatusCode::BAD_REQUEST,
                SubmitError::UnknownChat => StatusCode::NOT_FOUND,
                SubmitError::NotOwner => StatusCode::FORBIDDEN,
                SubmitError::Busy => StatusCode::CONFLICT,
                SubmitError::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
                SubmitError::Service(_) => StatusCode::BAD_GATEWAY,
                SubmitError::Document(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, other.to_string())
        }
    }
}

/// Filters the log to the selected ids, preserving log order.
fn select_messages(messages: &[Message], ids: &[u64]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| ids.contains(&m.id))
        .cloned()
        .collect()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /chats - Open a conversation bound to an accessible document.
#[utoipa::path(
    post,
    path = "/chats",
    request_body = OpenChatRequest,
    responses(
        (status = 201, description = "Chat opened", body = ChatView),
        (status = 403, description = "Document is not accessible"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn open_chat_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
    Json(req): Json<OpenChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .access
        .document_for_user(&user, req.document_id)
        .await
        .map_err(access_error_response)?;

    let chat = ChatSession::new(user.id, req.document_id, req.mode);
    let view = ChatView {
        chat_id: chat.id,
        document_id: chat.document_id,
        mode: chat.mode,
    };
    state.chats.lock().await.insert(chat.id, chat);
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /chats/{id}/messages - The chat's message log in display order.
#[utoipa::path(
    get,
    path = "/chats/{id}/messages",
    params(("id" = Uuid, Path, description = "Chat session id")),
    responses(
        (status = 200, description = "Messages in append order", body = [MessageView]),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, (StatusCode, String)> {
    let sessions = state.chats.lock().await;
    let chat = owned_chat(&sessions, chat_id, &user)?;
    Ok(Json(chat.messages.iter().map(MessageView::from).collect()))
}

/// POST /chats/{id}/messages - Submit a prompt and wait for the reply.
#[utoipa::path(
    post,
    path = "/chats/{id}/messages",
    request_body = SubmitRequest,
    params(("id" = Uuid, Path, description = "Chat session id")),
    responses(
        (status = 200, description = "Model reply appended", body = MessageView),
        (status = 400, description = "Empty prompt"),
        (status = 409, description = "A send is already in flight"),
        (status = 502, description = "Completion service failed"),
        (status = 503, description = "No AI credential configured")
    )
)]
pub async fn submit_message_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<MessageView>, (StatusCode, String)> {
    match run_submit(
        &state.access,
        state.chat_service.clone(),
        &state.chats,
        &user,
        chat_id,
        &req.prompt,
    )
    .await
    {
        Ok(message) => Ok(Json(MessageView::from(&message))),
        Err(e) => {
            error!("Chat turn failed: {e}");
            Err(submit_error_response(e))
        }
    }
}

/// PUT /chats/{id}/mode - Switch the retrieval mode for future turns.
#[utoipa::path(
    put,
    path = "/chats/{id}/mode",
    request_body = SetModeRequest,
    params(("id" = Uuid, Path, description = "Chat session id")),
    responses(
        (status = 200, description = "Mode updated", body = ChatView),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn set_mode_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SetModeRequest>,
) -> Result<Json<ChatView>, (StatusCode, String)> {
    let mut sessions = state.chats.lock().await;
    let chat = owned_chat_mut(&mut sessions, chat_id, &user)?;
    chat.mode = req.mode;
    Ok(Json(ChatView {
        chat_id: chat.id,
        document_id: chat.document_id,
        mode: chat.mode,
    }))
}

/// POST /chats/{id}/messages/delete - Remove the selected messages.
#[utoipa::path(
    post,
    path = "/chats/{id}/messages/delete",
    request_body = DeleteMessagesRequest,
    params(("id" = Uuid, Path, description = "Chat session id")),
    responses(
        (status = 200, description = "Remaining messages", body = [MessageView]),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn delete_messages_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<DeleteMessagesRequest>,
) -> Result<Json<Vec<MessageView>>, (StatusCode, String)> {
    let mut sessions = state.chats.lock().await;
    let chat = owned_chat_mut(&mut sessions, chat_id, &user)?;
    chat.messages.retain(|m| !req.message_ids.contains(&m.id));
    Ok(Json(chat.messages.iter().map(MessageView::from).collect()))
}

/// POST /chats/{id}/export - Download the selected messages as a file.
///
/// The selection itself is client-owned state; exporting does not clear
/// it, so the same selection can be exported repeatedly.
#[utoipa::path(
    post,
    path = "/chats/{id}/export",
    request_body = ExportRequest,
    params(("id" = Uuid, Path, description = "Chat session id")),
    responses(
        (status = 200, description = "The exported file"),
        (status = 400, description = "Empty selection"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn export_chat_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<ExportRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let selected = {
        let sessions = state.chats.lock().await;
        let chat = owned_chat(&sessions, chat_id, &user)?;
        select_messages(&chat.messages, &req.message_ids)
    };

    let artifact = export_messages(&selected, req.format)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.media_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        artifact.bytes,
    ))
}

/// DELETE /chats/{id} - Discard the chat and its message log.
#[utoipa::path(
    delete,
    path = "/chats/{id}",
    params(("id" = Uuid, Path, description = "Chat session id")),
    responses(
        (status = 204, description = "Chat discarded"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn close_chat_handler(
    State(state): State<Arc<AppState>>,
    axum::Extension(user): axum::Extension<User>,
    Path(chat_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut sessions = state.chats.lock().await;
    owned_chat(&sessions, chat_id, &user)?;
    sessions.remove(&chat_id);
    Ok(StatusCode::NO_CONTENT)
}

fn owned_chat<'a>(
    sessions: &'a std::collections::HashMap<Uuid, ChatSession>,
    chat_id: Uuid,
    user: &User,
) -> Result<&'a ChatSession, (StatusCode, String)> {
    let chat = sessions
        .get(&chat_id)
        .ok_or((StatusCode::NOT_FOUND, "Chat not found".to_string()))?;
    if chat.user_id != user.id {
        return Err((
            StatusCode::FORBIDDEN,
            "Chat belongs to another user".to_string(),
        ));
    }
    Ok(chat)
}

fn owned_chat_mut<'a>(
    sessions: &'a mut std::collections::HashMap<Uuid, ChatSession>,
    chat_id: Uuid,
    user: &User,
) -> Result<&'a mut ChatSession, (StatusCode, String)> {
    let chat = sessions
        .get_mut(&chat_id)
        .ok_or((StatusCode::NOT_FOUND, "Chat not found".to_string()))?;
    if chat.user_id != user.id {
        return Err((
            StatusCode::FORBIDDEN,
            "Chat belongs to another user".to_string(),
        ));
    }
    Ok(chat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doc_chat_core::domain::DocumentKind;
    use doc_chat_core::memory::MemoryStore;
    use doc_chat_core::ports::{PortError, PortResult};
    use std::sync::Mutex as StdMutex;

    struct FakeChatService {
        requests: StdMutex<Vec<CompletionRequest>>,
        fail: bool,
    }

    impl FakeChatService {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                requests: StdMutex::new(Vec::new()),
                fail,
            })
        }

        fn seen(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompletionService for FakeChatService {
        async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
            self.requests.lock().unwrap().push(request);
            if self.fail {
                Err(PortError::Unexpected("completion backend down".to_string()))
            } else {
                Ok("model reply".to_string())
            }
        }
    }

    struct Fixture {
        access: AccessControl,
        chats: ChatRegistry,
        user: User,
        chat_id: Uuid,
    }

    async fn fixture(content: &str, mode: SourceMode) -> Fixture {
        let access = AccessControl::new(Arc::new(MemoryStore::new()));
        let user = access.create_user("alice", "pw").await.unwrap();
        let document = Document {
            id: Uuid::new_v4(),
            name: "doc.txt".to_string(),
            content: content.to_string(),
            instruction: "Answer briefly.".to_string(),
            uploaded_at: Utc::now(),
            kind: DocumentKind::Text,
        };
        let document_id = document.id;
        access.add_document(document).await.unwrap();
        access.toggle_access(user.id, document_id).await.unwrap();
        let user = access
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.id == user.id)
            .unwrap();

        let chats = ChatRegistry::new();
        let chat = ChatSession::new(user.id, document_id, mode);
        let chat_id = chat.id;
        chats.lock().await.insert(chat_id, chat);

        Fixture {
            access,
            chats,
            user,
            chat_id,
        }
    }

    async fn phase_of(fix: &Fixture) -> ChatPhase {
        fix.chats.lock().await[&fix.chat_id].phase
    }

    async fn log_of(fix: &Fixture) -> Vec<Message> {
        fix.chats.lock().await[&fix.chat_id].messages.clone()
    }

    #[tokio::test]
    async fn successful_turn_appends_user_then_model_message() {
        let fix = fixture("doc body", SourceMode::Doc).await;
        let service = FakeChatService::new(false);

        let reply = run_submit(
            &fix.access,
            Some(service.clone()),
            &fix.chats,
            &fix.user,
            fix.chat_id,
            "what is this?",
        )
        .await
        .unwrap();

        assert_eq!(reply.role, MessageRole::Model);
        assert_eq!(reply.text, "model reply");

        let log = log_of(&fix).await;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, MessageRole::User);
        assert_eq!(log[0].text, "what is this?");
        assert_eq!(log[1].role, MessageRole::Model);
        assert!(log[0].id < log[1].id);
        assert_eq!(phase_of(&fix).await, ChatPhase::Idle);

        let requests = service.seen();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].web_search);
        assert!(requests[0].system_instruction.contains("doc body"));
        assert!(requests[0].system_instruction.contains("Answer briefly."));
        assert!(requests[0].history.is_empty());
    }

    #[tokio::test]
    async fn prior_turns_are_sent_as_history() {
        let fix = fixture("doc body", SourceMode::Doc).await;
        let service = FakeChatService::new(false);

        for prompt in ["first", "second"] {
            run_submit(
                &fix.access,
                Some(service.clone()),
                &fix.chats,
                &fix.user,
                fix.chat_id,
                prompt,
            )
            .await
            .unwrap();
        }

        let requests = service.seen();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].history.is_empty());
        // Second request carries the first turn (user + model).
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[0].text, "first");
        assert_eq!(requests[1].history[1].text, "model reply");
        assert_eq!(requests[1].prompt, "second");
    }

    #[tokio::test]
    async fn web_modes_request_the_search_tool() {
        for (mode, expected) in [
            (SourceMode::Doc, false),
            (SourceMode::Web, true),
            (SourceMode::Both, true),
        ] {
            let fix = fixture("doc body", mode).await;
            let service = FakeChatService::new(false);
            run_submit(
                &fix.access,
                Some(service.clone()),
                &fix.chats,
                &fix.user,
                fix.chat_id,
                "q",
            )
            .await
            .unwrap();
            assert_eq!(service.seen()[0].web_search, expected);
        }
    }

    #[tokio::test]
    async fn submit_while_sending_is_refused_without_side_effects() {
        let fix = fixture("doc body", SourceMode::Doc).await;
        let service = FakeChatService::new(false);
        fix.chats
            .lock()
            .await
            .get_mut(&fix.chat_id)
            .unwrap()
            .phase = ChatPhase::Sending;

        let err = run_submit(
            &fix.access,
            Some(service.clone()),
            &fix.chats,
            &fix.user,
            fix.chat_id,
            "hello",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SubmitError::Busy));
        assert!(log_of(&fix).await.is_empty());
        assert!(service.seen().is_empty());
    }

    #[tokio::test]
    async fn failed_completion_keeps_the_optimistic_user_message() {
        let fix = fixture("doc body", SourceMode::Doc).await;
        let service = FakeChatService::new(true);

        let err = run_submit(
            &fix.access,
            Some(service.clone()),
            &fix.chats,
            &fix.user,
            fix.chat_id,
            "hello",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SubmitError::Service(_)));
        let log = log_of(&fix).await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, MessageRole::User);
        assert_eq!(phase_of(&fix).await, ChatPhase::Idle);
    }

    #[tokio::test]
    async fn missing_credential_is_a_configuration_error() {
        let fix = fixture("doc body", SourceMode::Doc).await;

        let err = run_submit(&fix.access, None, &fix.chats, &fix.user, fix.chat_id, "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::MissingCredential));
        // The optimistic user message stays even on configuration failure.
        let log = log_of(&fix).await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, MessageRole::User);
        assert_eq!(phase_of(&fix).await, ChatPhase::Idle);
    }

    #[tokio::test]
    async fn empty_prompts_are_rejected_before_any_append() {
        let fix = fixture("doc body", SourceMode::Doc).await;
        let service = FakeChatService::new(false);

        let err = run_submit(
            &fix.access,
            Some(service.clone()),
            &fix.chats,
            &fix.user,
            fix.chat_id,
            "   ",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SubmitError::EmptyPrompt));
        assert!(log_of(&fix).await.is_empty());
        assert!(service.seen().is_empty());
    }

    #[tokio::test]
    async fn document_context_is_truncated_to_the_cap() {
        // 'z' appears in no fixed prompt string, so counting it isolates
        // how much document content was sent.
        let long_content = "z".repeat(DOC_CONTEXT_MAX_CHARS + 5_000);
        let fix = fixture(&long_content, SourceMode::Doc).await;
        let service = FakeChatService::new(false);

        run_submit(
            &fix.access,
            Some(service.clone()),
            &fix.chats,
            &fix.user,
            fix.chat_id,
            "q",
        )
        .await
        .unwrap();

        let instruction = &service.seen()[0].system_instruction;
        let sent_chars = instruction.chars().filter(|c| *c == 'z').count();
        assert_eq!(sent_chars, DOC_CONTEXT_MAX_CHARS);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo wörld".repeat(10);
        let truncated = truncate_chars(&text, 15);
        assert_eq!(truncated.chars().count(), 15);
    }

    #[test]
    fn selection_preserves_log_order() {
        let messages: Vec<Message> = (1..=4)
            .map(|id| Message {
                id,
                role: MessageRole::User,
                text: format!("m{id}"),
                sent_at: Utc::now(),
                mode: SourceMode::Doc,
            })
            .collect();

        let selected = select_messages(&messages, &[4, 1, 3]);
        let ids: Vec<u64> = selected.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }
}
