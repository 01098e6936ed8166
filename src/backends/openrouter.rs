use super::send_chat;
use crate::config::BackendSettings;
use crate::llm_adapter::{
    Attachment, ChatRole, ContentBlock, DispatchError, ModelBackend, ModelId, ModelRequest, PromptInput,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

const BACKEND: &str = "openrouter";

/// OpenRouter chat completions, addressed by model slug.
///
/// A flat prompt becomes a single user message and any attachments ride on it.
pub struct MarketplaceBackend {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: Vec<OpenRouterMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenRouterMessage {
    role: ChatRole,
    content: OpenRouterContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenRouterContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MarketplaceBackend {
    pub fn new(client: Client, settings: &BackendSettings) -> Self {
        Self {
            client,
            api_url: settings.openrouter_api_url.clone(),
            api_key: settings.openrouter_api_key.clone(),
        }
    }
}

/// Build the wire messages. Attachments are only wired when the message list is built here.
pub(crate) fn build_messages(request: &ModelRequest) -> Vec<OpenRouterMessage> {
    match &request.input {
        PromptInput::Text(prompt) => vec![OpenRouterMessage {
            role: ChatRole::User,
            content: OpenRouterContent::Text(prompt.clone()),
            attachments: request.attachments.clone(),
        }],
        PromptInput::Messages(messages) => {
            if !request.attachments.is_empty() {
                warn!(
                    "Unable to attach {} file(s) to caller-built messages; proceeding without attachments",
                    request.attachments.len()
                );
            }
            messages
                .iter()
                .map(|message| OpenRouterMessage {
                    role: message.role,
                    content: OpenRouterContent::Blocks(message.content.clone()),
                    attachments: Vec::new(),
                })
                .collect()
        }
    }
}

#[async_trait]
impl ModelBackend for MarketplaceBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, DispatchError> {
        let model = match &request.model {
            ModelId::Marketplace { model } => model,
            other => {
                return Err(DispatchError::UnsupportedModel {
                    backend: BACKEND,
                    model: other.to_string(),
                })
            }
        };

        let api_key = self.api_key.as_deref().ok_or(DispatchError::MissingCredentials {
            backend: BACKEND,
            variable: "OPENROUTER_API_KEY",
        })?;

        let body = OpenRouterRequest {
            model,
            messages: build_messages(request),
            max_tokens: request.max_output_tokens,
        };
        debug!("POST {} (model {})", self.api_url, model);

        let http_request = self.client.post(&self.api_url).bearer_auth(api_key).json(&body);

        send_chat(http_request, request.timeout).await
    }
}
