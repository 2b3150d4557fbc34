//! crates/doc_chat_core/src/access.rs
//!
//! The access-control model: user and document lifecycle, the
//! accessible-document filter, and login sessions. All state lives in
//! the injected [`StoreService`]; this module holds the rules.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::{AuthSession, Document, Role, User};
use crate::ports::{PortError, StoreService};

/// Credentials of the administrator account seeded into an empty store.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Login sessions expire after this many days.
const SESSION_TTL_DAYS: i64 = 30;

/// Errors produced by access-control operations.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Bad credentials. Deliberately does not distinguish an unknown
    /// username from a wrong password.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username '{0}' is already taken")]
    DuplicateUsername(String),

    #[error("No user with id {0}")]
    UserNotFound(Uuid),

    #[error("No document with id {0}")]
    DocumentNotFound(Uuid),

    /// The session token is unknown, expired, or its user was deleted.
    #[error("Not logged in")]
    InvalidSession,

    /// The acting user is not permitted to see the requested document.
    #[error("Document is not accessible")]
    Forbidden,

    #[error(transparent)]
    Store(#[from] PortError),
}

/// The single capability check deciding whether a user bypasses the
/// accessible-document filter. Every admin branch in the application
/// goes through here.
pub fn can_view_all_documents(user: &User) -> bool {
    user.is_admin()
}

/// Owns the User and Document collections through the injected store.
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn StoreService>,
}

impl AccessControl {
    pub fn new(store: Arc<dyn StoreService>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StoreService> {
        &self.store
    }

    //=====================================================================================
    // Seeding
    //=====================================================================================

    /// Seeds the fixed administrator account if and only if the user
    /// collection is currently empty. Idempotent, safe to call on
    /// every startup.
    pub async fn seed_admin(&self) -> Result<(), AccessError> {
        let users = self.store.load_users().await?;
        if !users.is_empty() {
            return Ok(());
        }
        let admin = User {
            id: Uuid::new_v4(),
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
            role: Role::Admin,
            document_ids: Vec::new(),
        };
        self.store.save_users(&[admin]).await?;
        info!("Seeded default administrator account");
        Ok(())
    }

    //=====================================================================================
    // Authentication and login sessions
    //=====================================================================================

    /// Exact, case-sensitive match on both username and password.
    /// First match wins if the collection somehow holds duplicates.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, AccessError> {
        let users = self.store.load_users().await?;
        users
            .into_iter()
            .find(|u| u.username == username && u.password == password)
            .ok_or(AccessError::InvalidCredentials)
    }

    /// Opens a login session for an authenticated user and persists it
    /// so a client restart can restore the login.
    pub async fn open_session(&self, user: &User) -> Result<AuthSession, AccessError> {
        let session = AuthSession {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
        };
        let mut sessions = self.store.load_sessions().await?;
        sessions.push(session.clone());
        self.store.save_sessions(&sessions).await?;
        Ok(session)
    }

    /// Resolves a session token back to its user. Expired tokens and
    /// tokens whose user has been deleted are both invalid.
    pub async fn resolve_session(&self, token: &str) -> Result<User, AccessError> {
        let sessions = self.store.load_sessions().await?;
        let session = sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > Utc::now())
            .ok_or(AccessError::InvalidSession)?;
        let users = self.store.load_users().await?;
        users
            .into_iter()
            .find(|u| u.id == session.user_id)
            .ok_or(AccessError::InvalidSession)
    }

    pub async fn close_session(&self, token: &str) -> Result<(), AccessError> {
        let mut sessions = self.store.load_sessions().await?;
        sessions.retain(|s| s.token != token);
        self.store.save_sessions(&sessions).await?;
        Ok(())
    }

    //=====================================================================================
    // User management
    //=====================================================================================

    pub async fn list_users(&self) -> Result<Vec<User>, AccessError> {
        Ok(self.store.load_users().await?)
    }

    /// Creates a regular account. The role is always fixed to `user`;
    /// administrators cannot be created through this path. Duplicate
    /// usernames are rejected.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, AccessError> {
        let mut users = self.store.load_users().await?;
        if users.iter().any(|u| u.username == username) {
            return Err(AccessError::DuplicateUsername(username.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password: password.to_string(),
            role: Role::User,
            document_ids: Vec::new(),
        };
        users.push(user.clone());
        self.store.save_users(&users).await?;
        Ok(user)
    }

    /// Deleting a user requires no document cleanup.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AccessError> {
        let mut users = self.store.load_users().await?;
        let before = users.len();
        users.retain(|u| u.id != user_id);
        if users.len() == before {
            return Err(AccessError::UserNotFound(user_id));
        }
        self.store.save_users(&users).await?;
        Ok(())
    }

    /// Toggles a document in a user's accessible set: grants when
    /// absent, revokes when present. Applying it twice with the same
    /// arguments restores the original set.
    pub async fn toggle_access(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<User, AccessError> {
        let documents = self.store.load_documents().await?;
        if !documents.iter().any(|d| d.id == document_id) {
            return Err(AccessError::DocumentNotFound(document_id));
        }
        let mut users = self.store.load_users().await?;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AccessError::UserNotFound(user_id))?;
        if let Some(pos) = user.document_ids.iter().position(|id| *id == document_id) {
            user.document_ids.remove(pos);
        } else {
            user.document_ids.push(document_id);
        }
        let updated = user.clone();
        self.store.save_users(&users).await?;
        Ok(updated)
    }

    //=====================================================================================
    // Document management
    //=====================================================================================

    pub async fn add_document(&self, document: Document) -> Result<(), AccessError> {
        let mut documents = self.store.load_documents().await?;
        documents.push(document);
        self.store.save_documents(&documents).await?;
        Ok(())
    }

    pub async fn get_document(&self, document_id: Uuid) -> Result<Document, AccessError> {
        let documents = self.store.load_documents().await?;
        documents
            .into_iter()
            .find(|d| d.id == document_id)
            .ok_or(AccessError::DocumentNotFound(document_id))
    }

    /// Filters the document collection to the user's accessible set,
    /// preserving collection order. Admin accounts see everything.
    pub async fn list_accessible_documents(
        &self,
        user: &User,
    ) -> Result<Vec<Document>, AccessError> {
        let documents = self.store.load_documents().await?;
        if can_view_all_documents(user) {
            return Ok(documents);
        }
        Ok(documents
            .into_iter()
            .filter(|d| user.document_ids.contains(&d.id))
            .collect())
    }

    /// Access-checked fetch used when binding a conversation to a
    /// document.
    pub async fn document_for_user(
        &self,
        user: &User,
        document_id: Uuid,
    ) -> Result<Document, AccessError> {
        let document = self.get_document(document_id).await?;
        if !can_view_all_documents(user) && !user.document_ids.contains(&document_id) {
            return Err(AccessError::Forbidden);
        }
        Ok(document)
    }

    pub async fn update_instruction(
        &self,
        document_id: Uuid,
        instruction: &str,
    ) -> Result<Document, AccessError> {
        let mut documents = self.store.load_documents().await?;
        let document = documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or(AccessError::DocumentNotFound(document_id))?;
        document.instruction = instruction.to_string();
        let updated = document.clone();
        self.store.save_documents(&documents).await?;
        Ok(updated)
    }

    /// Deletes a document and prunes its id from every user's
    /// accessible set, keeping the reference invariant intact.
    pub async fn delete_document(&self, document_id: Uuid) -> Result<(), AccessError> {
        let mut documents = self.store.load_documents().await?;
        let before = documents.len();
        documents.retain(|d| d.id != document_id);
        if documents.len() == before {
            return Err(AccessError::DocumentNotFound(document_id));
        }
        self.store.save_documents(&documents).await?;

        let mut users = self.store.load_users().await?;
        let mut changed = false;
        for user in users.iter_mut() {
            let len = user.document_ids.len();
            user.document_ids.retain(|id| *id != document_id);
            changed |= user.document_ids.len() != len;
        }
        if changed {
            self.store.save_users(&users).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DocumentKind;
    use crate::memory::MemoryStore;

    fn access() -> AccessControl {
        AccessControl::new(Arc::new(MemoryStore::new()))
    }

    fn sample_document(name: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            name: name.to_string(),
            content: format!("content of {name}"),
            instruction: "Answer from the document.".to_string(),
            uploaded_at: Utc::now(),
            kind: DocumentKind::Text,
        }
    }

    #[tokio::test]
    async fn seeding_empty_store_creates_one_admin_and_is_idempotent() {
        let access = access();
        access.seed_admin().await.unwrap();
        access.seed_admin().await.unwrap();

        let users = access.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, DEFAULT_ADMIN_USERNAME);
        assert_eq!(users[0].password, DEFAULT_ADMIN_PASSWORD);
        assert_eq!(users[0].role, Role::Admin);
    }

    #[tokio::test]
    async fn seeding_skips_non_empty_store() {
        let access = access();
        access.create_user("alice", "pw").await.unwrap();
        access.seed_admin().await.unwrap();

        let users = access.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
    }

    #[tokio::test]
    async fn authenticate_requires_exact_match_on_both_fields() {
        let access = access();
        access.create_user("alice", "Secret").await.unwrap();

        assert!(access.authenticate("alice", "Secret").await.is_ok());
        for (name, pw) in [
            ("alice", "secret"),
            ("Alice", "Secret"),
            ("alice", ""),
            ("bob", "Secret"),
        ] {
            let err = access.authenticate(name, pw).await.unwrap_err();
            assert!(matches!(err, AccessError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn created_users_are_never_admins() {
        let access = access();
        let user = access.create_user("alice", "pw").await.unwrap();
        assert_eq!(user.role, Role::User);
        assert!(!can_view_all_documents(&user));
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let access = access();
        access.create_user("alice", "pw").await.unwrap();
        let err = access.create_user("alice", "other").await.unwrap_err();
        assert!(matches!(err, AccessError::DuplicateUsername(_)));
    }

    #[tokio::test]
    async fn toggle_access_twice_restores_original_set() {
        let access = access();
        let user = access.create_user("alice", "pw").await.unwrap();
        let doc = sample_document("a.txt");
        access.add_document(doc.clone()).await.unwrap();

        let granted = access.toggle_access(user.id, doc.id).await.unwrap();
        assert_eq!(granted.document_ids, vec![doc.id]);

        let revoked = access.toggle_access(user.id, doc.id).await.unwrap();
        assert!(revoked.document_ids.is_empty());
    }

    #[tokio::test]
    async fn toggle_access_requires_existing_document() {
        let access = access();
        let user = access.create_user("alice", "pw").await.unwrap();
        let err = access
            .toggle_access(user.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn admins_see_all_documents_regardless_of_their_set() {
        let access = access();
        access.seed_admin().await.unwrap();
        let admin = access
            .authenticate(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD)
            .await
            .unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            access.add_document(sample_document(name)).await.unwrap();
        }

        let visible = access.list_accessible_documents(&admin).await.unwrap();
        assert_eq!(visible.len(), 3);
        // Collection order is preserved.
        let names: Vec<_> = visible.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn regular_users_see_only_their_accessible_set() {
        let access = access();
        let user = access.create_user("alice", "pw").await.unwrap();
        let doc_a = sample_document("a.txt");
        let doc_b = sample_document("b.txt");
        access.add_document(doc_a.clone()).await.unwrap();
        access.add_document(doc_b.clone()).await.unwrap();
        access.toggle_access(user.id, doc_b.id).await.unwrap();

        let user = access.resolve_user(user.id).await;
        let visible = access.list_accessible_documents(&user).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, doc_b.id);

        assert!(access.document_for_user(&user, doc_b.id).await.is_ok());
        let err = access.document_for_user(&user, doc_a.id).await.unwrap_err();
        assert!(matches!(err, AccessError::Forbidden));
    }

    #[tokio::test]
    async fn deleting_a_document_prunes_every_accessible_set() {
        let access = access();
        let alice = access.create_user("alice", "pw").await.unwrap();
        let bob = access.create_user("bob", "pw").await.unwrap();
        let doc = sample_document("a.txt");
        access.add_document(doc.clone()).await.unwrap();
        access.toggle_access(alice.id, doc.id).await.unwrap();
        access.toggle_access(bob.id, doc.id).await.unwrap();

        access.delete_document(doc.id).await.unwrap();

        for user in access.list_users().await.unwrap() {
            assert!(user.document_ids.is_empty());
        }
        let err = access.get_document(doc.id).await.unwrap_err();
        assert!(matches!(err, AccessError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn sessions_round_trip_and_close() {
        let access = access();
        let user = access.create_user("alice", "pw").await.unwrap();

        let session = access.open_session(&user).await.unwrap();
        let resolved = access.resolve_session(&session.token).await.unwrap();
        assert_eq!(resolved.id, user.id);

        access.close_session(&session.token).await.unwrap();
        let err = access.resolve_session(&session.token).await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidSession));
    }

    #[tokio::test]
    async fn session_of_deleted_user_is_invalid() {
        let access = access();
        let user = access.create_user("alice", "pw").await.unwrap();
        let session = access.open_session(&user).await.unwrap();
        access.delete_user(user.id).await.unwrap();

        let err = access.resolve_session(&session.token).await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidSession));
    }

    #[tokio::test]
    async fn instruction_is_editable() {
        let access = access();
        let doc = sample_document("a.txt");
        access.add_document(doc.clone()).await.unwrap();

        let updated = access
            .update_instruction(doc.id, "Only quote verbatim.")
            .await
            .unwrap();
        assert_eq!(updated.instruction, "Only quote verbatim.");
        let fetched = access.get_document(doc.id).await.unwrap();
        assert_eq!(fetched.instruction, "Only quote verbatim.");
    }

    impl AccessControl {
        /// Test helper: reload a user after mutation.
        async fn resolve_user(&self, id: Uuid) -> User {
            self.list_users()
                .await
                .unwrap()
                .into_iter()
                .find(|u| u.id == id)
                .unwrap()
        }
    }
}
