//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::export::ExportFormat;
use crate::web::{auth, chat, documents, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        users::list_users_handler,
        users::create_user_handler,
        users::delete_user_handler,
        users::toggle_access_handler,
        documents::list_documents_handler,
        documents::upload_document_handler,
        documents::update_instruction_handler,
        documents::delete_document_handler,
        chat::open_chat_handler,
        chat::list_messages_handler,
        chat::submit_message_handler,
        chat::set_mode_handler,
        chat::delete_messages_handler,
        chat::export_chat_handler,
        chat::close_chat_handler,
    ),
    components(
        schemas(
            auth::LoginRequest,
            auth::AuthResponse,
            users::CreateUserRequest,
            users::UserView,
            documents::DocumentView,
            documents::UpdateInstructionRequest,
            chat::OpenChatRequest,
            chat::ChatView,
            chat::SubmitRequest,
            chat::SetModeRequest,
            chat::DeleteMessagesRequest,
            chat::ExportRequest,
            chat::MessageView,
            ExportFormat,
        )
    ),
    tags(
        (name = "DocChat API", description = "API endpoints for the document chat assistant.")
    )
)]
pub struct ApiDoc;
