use super::send_chat;
use crate::config::BackendSettings;
use crate::llm_adapter::{ChatMessage, DispatchError, ModelBackend, ModelId, ModelRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

const BACKEND: &str = "azure-openai";

/// Azure OpenAI chat completions, addressed by deployment name.
///
/// Messages are always sent as role-tagged content blocks. File attachments are
/// not supported; callers describe files inside the message text instead.
pub struct ManagedBackend {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    api_version: String,
}

#[derive(Serialize)]
struct AzureChatRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

impl ManagedBackend {
    pub fn new(client: Client, settings: &BackendSettings) -> Self {
        Self {
            client,
            endpoint: settings
                .azure_endpoint
                .as_ref()
                .map(|endpoint| endpoint.trim_end_matches('/').to_string()),
            api_key: settings.azure_api_key.clone(),
            api_version: settings.azure_api_version.clone(),
        }
    }

    pub fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint, deployment, api_version
        )
    }
}

#[async_trait]
impl ModelBackend for ManagedBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, DispatchError> {
        let deployment = match &request.model {
            ModelId::Managed { deployment } => deployment,
            other => {
                return Err(DispatchError::UnsupportedModel {
                    backend: BACKEND,
                    model: other.to_string(),
                })
            }
        };

        let endpoint = self.endpoint.as_deref().ok_or(DispatchError::MissingCredentials {
            backend: BACKEND,
            variable: "AZURE_OPENAI_ENDPOINT",
        })?;
        let api_key = self.api_key.as_deref().ok_or(DispatchError::MissingCredentials {
            backend: BACKEND,
            variable: "AZURE_OPENAI_API_KEY",
        })?;

        if !request.attachments.is_empty() {
            warn!(
                "{} does not accept attachments; dropping {} attachment(s) for deployment {}",
                BACKEND,
                request.attachments.len(),
                deployment
            );
        }

        let messages = request.to_messages();
        let body = AzureChatRequest {
            messages: &messages,
            max_tokens: request.max_output_tokens,
        };

        let url = Self::completions_url(endpoint, deployment, &self.api_version);
        debug!("POST {} ({} messages)", url, messages.len());

        let http_request = self
            .client
            .post(&url)
            .header("api-key", api_key)
            .json(&body);

        send_chat(http_request, request.timeout).await
    }
}
