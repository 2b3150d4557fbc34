//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the in-memory chat
//! sessions it tracks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use doc_chat_core::access::AccessControl;
use doc_chat_core::domain::{Message, MessageRole, SourceMode};
use doc_chat_core::ports::ChatCompletionService;

use crate::config::Config;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub access: AccessControl,
    /// Absent when no API credential is configured; chat submissions
    /// then fail with a configuration error instead of a dead client.
    pub chat_service: Option<Arc<dyn ChatCompletionService>>,
    pub config: Arc<Config>,
    pub chats: ChatRegistry,
}

//=========================================================================================
// Chat Sessions (In-Memory, Per Conversation)
//=========================================================================================

/// The send state of one conversation. A new submission is refused
/// while a request is outstanding, so at most one completion call is in
/// flight per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    Sending,
}

/// One active conversation, bound to a document and a retrieval mode.
/// The message log lives here and nowhere else; it dies with the chat.
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub mode: SourceMode,
    pub phase: ChatPhase,
    pub messages: Vec<Message>,
    next_message_id: u64,
}

impl ChatSession {
    pub fn new(user_id: Uuid, document_id: Uuid, mode: SourceMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            document_id,
            mode,
            phase: ChatPhase::Idle,
            messages: Vec::new(),
            next_message_id: 1,
        }
    }

    /// Appends a message, assigning the next id from the per-chat
    /// counter so append order is display order.
    pub fn push_message(&mut self, role: MessageRole, text: String, mode: SourceMode) -> Message {
        let message = Message {
            id: self.next_message_id,
            role,
            text,
            sent_at: Utc::now(),
            mode,
        };
        self.next_message_id += 1;
        self.messages.push(message.clone());
        message
    }
}

/// The registry of live chat sessions, keyed by chat id.
#[derive(Clone, Default)]
pub struct ChatRegistry {
    inner: Arc<Mutex<HashMap<Uuid, ChatSession>>>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ChatSession>> {
        self.inner.lock().await
    }
}
