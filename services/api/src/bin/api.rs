//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{JsonStoreAdapter, OpenAiChatAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth, chat, documents, middleware::require_auth, rest::ApiDoc,
        state::{AppState, ChatRegistry},
        users,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use doc_chat_core::access::AccessControl;
use doc_chat_core::ports::ChatCompletionService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Store & Seed the Administrator ---
    info!("Opening data directory at {}", config.data_dir.display());
    let store = Arc::new(JsonStoreAdapter::open(config.data_dir.clone()).await?);
    let access = AccessControl::new(store);
    access.seed_admin().await?;

    // --- 3. Initialize the Completion Adapter ---
    let chat_service: Option<Arc<dyn ChatCompletionService>> = match &config.openai_api_key {
        Some(key) => {
            let openai_config = OpenAIConfig::new().with_api_key(key);
            let client = Client::with_config(openai_config);
            Some(Arc::new(OpenAiChatAdapter::new(
                client,
                config.chat_model.clone(),
            )))
        }
        None => {
            warn!(
                "OPENAI_API_KEY is not set; chat submissions will fail with a configuration error"
            );
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        access,
        chat_service,
        config: config.clone(),
        chats: ChatRegistry::new(),
    });

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {e}", config.cors_origin))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/documents",
            get(documents::list_documents_handler).post(documents::upload_document_handler),
        )
        .route(
            "/documents/{id}/instruction",
            put(documents::update_instruction_handler),
        )
        .route("/documents/{id}", delete(documents::delete_document_handler))
        .route(
            "/users",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route("/users/{id}", delete(users::delete_user_handler))
        .route(
            "/users/{id}/documents/{document_id}/toggle",
            post(users::toggle_access_handler),
        )
        .route("/chats", post(chat::open_chat_handler))
        .route("/chats/{id}", delete(chat::close_chat_handler))
        .route(
            "/chats/{id}/messages",
            get(chat::list_messages_handler).post(chat::submit_message_handler),
        )
        .route(
            "/chats/{id}/messages/delete",
            post(chat::delete_messages_handler),
        )
        .route("/chats/{id}/mode", put(chat::set_mode_handler))
        .route("/chats/{id}/export", post(chat::export_chat_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
