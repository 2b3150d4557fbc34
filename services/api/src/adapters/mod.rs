pub mod chat_llm;
pub mod store_json;

pub use chat_llm::OpenAiChatAdapter;
pub use store_json::JsonStoreAdapter;
