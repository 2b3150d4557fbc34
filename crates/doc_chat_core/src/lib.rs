pub mod access;
pub mod domain;
pub mod memory;
pub mod ports;

pub use access::{can_view_all_documents, AccessControl, AccessError};
pub use domain::{
    AuthSession, Document, DocumentKind, Message, MessageRole, Role, SourceMode, User,
};
pub use memory::MemoryStore;
pub use ports::{
    ChatCompletionService, ChatTurn, CompletionRequest, PortError, PortResult, StoreService,
};
