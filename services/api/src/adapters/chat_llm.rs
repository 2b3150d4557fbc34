//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the conversation completion
//! service. It implements the `ChatCompletionService` port from the
//! `core` crate on top of an OpenAI-compatible Responses API.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::responses::{
        CreateResponseArgs, EasyInputMessageArgs, InputItem, InputParam, Role, Tool, WebSearchTool,
    },
    Client,
};
use async_trait::async_trait;

use doc_chat_core::domain::MessageRole;
use doc_chat_core::ports::{ChatCompletionService, CompletionRequest, PortError, PortResult};

/// Upper bound on a single model reply.
const MAX_OUTPUT_TOKENS: u32 = 1000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` using an
/// OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn provider_role(role: MessageRole) -> Role {
    match role {
        MessageRole::User => Role::User,
        MessageRole::Model => Role::Assistant,
    }
}

//=========================================================================================
// `ChatCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionService for OpenAiChatAdapter {
    /// Issues exactly one request carrying the system instruction, the
    /// prior history mapped to the provider's role vocabulary, and the
    /// new prompt. Web search is attached only when the request asks
    /// for it.
    async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
        let mut items: Vec<InputItem> = Vec::with_capacity(request.history.len() + 1);
        for turn in &request.history {
            items.push(InputItem::EasyMessage(
                EasyInputMessageArgs::default()
                    .role(provider_role(turn.role))
                    .content(turn.text.clone())
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ));
        }
        items.push(InputItem::EasyMessage(
            EasyInputMessageArgs::default()
                .role(Role::User)
                .content(request.prompt.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
        ));

        let mut builder = CreateResponseArgs::default();
        builder
            .model(&self.model)
            .instructions(request.system_instruction.clone())
            .input(InputParam::Items(items))
            .max_output_tokens(MAX_OUTPUT_TOKENS);
        if request.web_search {
            builder.tools(vec![Tool::WebSearch(WebSearchTool::default())]);
        }
        let api_request = builder
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .responses()
            .create(api_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        Ok(response.output_text().unwrap_or_default())
    }
}
