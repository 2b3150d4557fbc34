//! crates/doc_chat_core/src/memory.rs
//!
//! An in-memory [`StoreService`] implementation. Used as the injectable
//! store fake in tests; also usable as a real (non-persistent) store.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{AuthSession, Document, User};
use crate::ports::{PortResult, StoreService};

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    documents: Vec<Document>,
    sessions: Vec<AuthSession>,
}

/// Keeps all three collections behind one lock. Lock poisoning is not a
/// concern here: no code path panics while holding the guard.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreService for MemoryStore {
    async fn load_users(&self) -> PortResult<Vec<User>> {
        Ok(self.inner.lock().unwrap().users.clone())
    }

    async fn save_users(&self, users: &[User]) -> PortResult<()> {
        self.inner.lock().unwrap().users = users.to_vec();
        Ok(())
    }

    async fn load_documents(&self) -> PortResult<Vec<Document>> {
        Ok(self.inner.lock().unwrap().documents.clone())
    }

    async fn save_documents(&self, documents: &[Document]) -> PortResult<()> {
        self.inner.lock().unwrap().documents = documents.to_vec();
        Ok(())
    }

    async fn load_sessions(&self) -> PortResult<Vec<AuthSession>> {
        Ok(self.inner.lock().unwrap().sessions.clone())
    }

    async fn save_sessions(&self, sessions: &[AuthSession]) -> PortResult<()> {
        self.inner.lock().unwrap().sessions = sessions.to_vec();
        Ok(())
    }
}
