//! services/api/src/adapters/store_json.rs
//!
//! This module contains the persistent-store adapter, the concrete
//! implementation of the `StoreService` port from the `core` crate. Each
//! collection is one JSON file under the configured data directory.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use doc_chat_core::domain::{AuthSession, Document, User};
use doc_chat_core::ports::{PortError, PortResult, StoreService};

const USERS_FILE: &str = "users.json";
const DOCUMENTS_FILE: &str = "documents.json";
const SESSIONS_FILE: &str = "sessions.json";

/// A store adapter that implements the `StoreService` port on top of
/// one JSON file per collection.
///
/// An absent or unparseable file reads as an empty collection; writes
/// replace the whole file. Individual file operations are serialized
/// behind a lock, but a load-mutate-save cycle spanning two calls is
/// intentionally not transactional (single-writer assumption).
pub struct JsonStoreAdapter {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonStoreAdapter {
    /// Creates the data directory if needed and returns the adapter.
    pub async fn open(root: impl Into<PathBuf>) -> PortResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to create data dir: {e}")))?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    async fn load<T: DeserializeOwned>(&self, file: &str) -> PortResult<Vec<T>> {
        let path = self.root.join(file);
        let _guard = self.lock.lock().await;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PortError::Unexpected(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => Ok(records),
            Err(e) => {
                // Malformed stored data is treated as empty, not as an error.
                warn!("Ignoring unparseable store file {}: {e}", path.display());
                Ok(Vec::new())
            }
        }
    }

    async fn save<T: Serialize>(&self, file: &str, records: &[T]) -> PortResult<()> {
        let path = self.root.join(file);
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| PortError::Unexpected(format!("Failed to serialize {file}: {e}")))?;
        let _guard = self.lock.lock().await;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {e}", path.display())))
    }
}

#[async_trait]
impl StoreService for JsonStoreAdapter {
    async fn load_users(&self) -> PortResult<Vec<User>> {
        self.load(USERS_FILE).await
    }

    async fn save_users(&self, users: &[User]) -> PortResult<()> {
        self.save(USERS_FILE, users).await
    }

    async fn load_documents(&self) -> PortResult<Vec<Document>> {
        self.load(DOCUMENTS_FILE).await
    }

    async fn save_documents(&self, documents: &[Document]) -> PortResult<()> {
        self.save(DOCUMENTS_FILE, documents).await
    }

    async fn load_sessions(&self) -> PortResult<Vec<AuthSession>> {
        self.load(SESSIONS_FILE).await
    }

    async fn save_sessions(&self, sessions: &[AuthSession]) -> PortResult<()> {
        self.save(SESSIONS_FILE, sessions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_chat_core::domain::Role;
    use uuid::Uuid;

    fn sample_user(username: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password: "pw".to_string(),
            role: Role::User,
            document_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn absent_collection_reads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonStoreAdapter::open(dir.path()).await.unwrap();
        assert!(store.load_users().await.unwrap().is_empty());
        assert!(store.load_documents().await.unwrap().is_empty());
        assert!(store.load_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_collection_reads_as_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(USERS_FILE), b"{not json").unwrap();
        let store = JsonStoreAdapter::open(dir.path()).await.unwrap();
        assert!(store.load_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_and_reload_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonStoreAdapter::open(dir.path()).await.unwrap();
        store
            .save_users(&[sample_user("alice"), sample_user("bob")])
            .await
            .unwrap();

        let loaded = store.load_users().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].username, "alice");
        assert_eq!(loaded[1].username, "bob");
    }

    #[tokio::test]
    async fn save_is_a_full_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonStoreAdapter::open(dir.path()).await.unwrap();
        store
            .save_users(&[sample_user("alice"), sample_user("bob")])
            .await
            .unwrap();
        store.save_users(&[sample_user("carol")]).await.unwrap();

        let loaded = store.load_users().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].username, "carol");
    }
}
