//! crates/doc_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// A user account.
///
/// Passwords are stored in plaintext and compared with exact string
/// equality; this mirrors the documented design of the system and is
/// not a real credential scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password: String,
    pub role: Role,
    /// Ids of the documents this user may converse with. Ignored for
    /// admin accounts, which see the whole collection.
    pub document_ids: Vec<Uuid>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// How a stored document was ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Text,
}

/// A document uploaded by an admin, with its extracted text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    /// Editable natural-language guidance for the assistant when this
    /// document is bound to a conversation.
    pub instruction: String,
    pub uploaded_at: DateTime<Utc>,
    pub kind: DocumentKind,
}

/// Retrieval mode for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Document content only.
    Doc,
    /// Web search augmentation.
    Web,
    /// Document content plus web search.
    Both,
}

impl SourceMode {
    /// Whether this mode asks the completion service for web search.
    pub fn wants_web_search(self) -> bool {
        matches!(self, SourceMode::Web | SourceMode::Both)
    }
}

/// The author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

/// A single conversation turn. Messages live only in the active chat
/// session's memory and are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic per-chat counter; append order is display order.
    pub id: u64,
    pub role: MessageRole,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    /// The retrieval mode that was active when this message was produced.
    pub mode: SourceMode,
}

// Represents a browser login session (auth cookie). Holds only the id
// of its own user, never other users' data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
