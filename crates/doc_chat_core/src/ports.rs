//! crates/doc_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like file storage or APIs.

use async_trait::async_trait;

use crate::domain::{AuthSession, Document, Message, MessageRole, User};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., storage, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistent Store Port
//=========================================================================================

/// The persistent collection store.
///
/// Three logical collections back the whole system: user records,
/// document records, and auth-session snapshots. Loads return an empty
/// vector when a collection is absent or its stored form fails to
/// parse; saves are full overwrites with no partial update and no
/// transactions. A load-mutate-save cycle is therefore not atomic;
/// callers rely on the documented single-writer assumption.
#[async_trait]
pub trait StoreService: Send + Sync {
    async fn load_users(&self) -> PortResult<Vec<User>>;
    async fn save_users(&self, users: &[User]) -> PortResult<()>;

    async fn load_documents(&self) -> PortResult<Vec<Document>>;
    async fn save_documents(&self, documents: &[Document]) -> PortResult<()>;

    async fn load_sessions(&self) -> PortResult<Vec<AuthSession>>;
    async fn save_sessions(&self, sessions: &[AuthSession]) -> PortResult<()>;
}

//=========================================================================================
// Completion Service Port
//=========================================================================================

/// One prior turn of conversation, already mapped to the provider-neutral
/// role vocabulary.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub text: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            text: message.text.clone(),
        }
    }
}

/// A single completion request: system instruction, prior history, the
/// new prompt, and whether the provider should be given a web-search tool.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub history: Vec<ChatTurn>,
    pub prompt: String,
    pub web_search: bool,
}

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Issues exactly one completion request and returns the model's text.
    async fn complete(&self, request: CompletionRequest) -> PortResult<String>;
}
