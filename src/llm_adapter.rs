use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Model ids carrying this prefix are routed to the managed (Azure OpenAI) backend.
pub const MANAGED_PREFIX: &str = "azure-";

/// Which backend serves a model, and the backend-specific name to ask it for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelId {
    /// Azure OpenAI deployment, written `azure-<deployment>`.
    Managed { deployment: String },
    /// OpenRouter model slug, e.g. `google/gemini-2.0-flash-001`.
    Marketplace { model: String },
}

impl ModelId {
    pub fn parse(raw: &str) -> Result<Self, InvalidModelId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InvalidModelId(raw.to_string()));
        }
        match raw.strip_prefix(MANAGED_PREFIX) {
            Some("") => Err(InvalidModelId(raw.to_string())),
            Some(deployment) => Ok(Self::Managed { deployment: deployment.to_string() }),
            None => Ok(Self::Marketplace { model: raw.to_string() }),
        }
    }

    /// Whether files can ride along with the request instead of being described in text.
    pub fn supports_attachments(&self) -> bool {
        matches!(self, Self::Marketplace { .. })
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Managed { .. } => "azure-openai",
            Self::Marketplace { .. } => "openrouter",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Managed { deployment } => write!(f, "{}{}", MANAGED_PREFIX, deployment),
            Self::Marketplace { model } => f.write_str(model),
        }
    }
}

impl std::str::FromStr for ModelId {
    type Err = InvalidModelId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid model id '{0}'")]
pub struct InvalidModelId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// A role-tagged message made of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(ChatRole::System, vec![ContentBlock::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatRole::User, vec![ContentBlock::text(text)])
    }

    /// All text blocks joined with blank lines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    File,
}

/// File passed out-of-band to backends that accept it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(rename = "url")]
    pub locator: String,
    #[serde(rename = "mime")]
    pub mime_type: String,
}

impl Attachment {
    pub fn pdf(url: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::File,
            locator: url.into(),
            mime_type: "application/pdf".to_string(),
        }
    }
}

/// Either a flat prompt or caller-built messages; never both, never neither.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    Text(String),
    Messages(Vec<ChatMessage>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub input: PromptInput,
    pub model: ModelId,
    pub max_output_tokens: u32,
    pub attachments: Vec<Attachment>,
    pub timeout: Duration,
}

impl ModelRequest {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn prompt(model: ModelId, prompt: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            input: PromptInput::Text(prompt.into()),
            model,
            max_output_tokens,
            attachments: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn messages(model: ModelId, messages: Vec<ChatMessage>, max_output_tokens: u32) -> Self {
        Self {
            input: PromptInput::Messages(messages),
            model,
            max_output_tokens,
            attachments: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The request as structured messages, wrapping a flat prompt into one user message.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        match &self.input {
            PromptInput::Text(prompt) => vec![ChatMessage::user(prompt.clone())],
            PromptInput::Messages(messages) => messages.clone(),
        }
    }
}

/// Typed failure of a single generation call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("{backend} credentials are not configured ({variable})")]
    MissingCredentials { backend: &'static str, variable: &'static str },

    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("model {model} is not served by {backend}")]
    UnsupportedModel { backend: &'static str, model: String },
}

/// One LLM provider behind the common generation contract.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn generate(&self, request: &ModelRequest) -> Result<String, DispatchError>;
}

/// Anything that turns a `ModelRequest` into text or a typed failure.
///
/// Pipeline stages depend on this rather than on concrete backends.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: &ModelRequest) -> Result<String, DispatchError>;
}

/// Routes each request to the backend its `ModelId` names.
pub struct ModelDispatcher {
    managed: Box<dyn ModelBackend>,
    marketplace: Box<dyn ModelBackend>,
}

impl ModelDispatcher {
    pub fn new(managed: Box<dyn ModelBackend>, marketplace: Box<dyn ModelBackend>) -> Self {
        Self { managed, marketplace }
    }

    fn backend_for(&self, model: &ModelId) -> &dyn ModelBackend {
        match model {
            ModelId::Managed { .. } => self.managed.as_ref(),
            ModelId::Marketplace { .. } => self.marketplace.as_ref(),
        }
    }
}

#[async_trait]
impl Dispatch for ModelDispatcher {
    async fn dispatch(&self, request: &ModelRequest) -> Result<String, DispatchError> {
        let backend = self.backend_for(&request.model);
        debug!(
            "Dispatching to {} (model {}, max_tokens {})",
            backend.backend_name(),
            request.model,
            request.max_output_tokens
        );
        backend.generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn prefix_selects_managed_backend() {
        assert_eq!(
            ModelId::parse("azure-gpt-4o").unwrap(),
            ModelId::Managed { deployment: "gpt-4o".to_string() }
        );
        assert_eq!(
            ModelId::parse("google/gemini-2.0-flash-001").unwrap(),
            ModelId::Marketplace { model: "google/gemini-2.0-flash-001".to_string() }
        );
        assert!(ModelId::parse("azure-").is_err());
        assert!(ModelId::parse("  ").is_err());
    }

    #[test]
    fn display_round_trips_the_raw_id() {
        for raw in ["azure-gpt-4o-mini", "anthropic/claude-3.5-sonnet"] {
            assert_eq!(ModelId::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[test]
    fn flat_prompt_becomes_single_user_message() {
        let request = ModelRequest::prompt(ModelId::parse("azure-x").unwrap(), "hello", 5);
        let messages = request.to_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].joined_text(), "hello");
    }

    struct RecordingBackend {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ModelBackend for RecordingBackend {
        fn backend_name(&self) -> &'static str {
            self.name
        }

        async fn generate(&self, request: &ModelRequest) -> Result<String, DispatchError> {
            self.seen.lock().unwrap().push(format!("{}:{}", self.name, request.model));
            Ok(self.name.to_string())
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_by_model_prefix() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ModelDispatcher::new(
            Box::new(RecordingBackend { name: "managed", seen: seen.clone() }),
            Box::new(RecordingBackend { name: "market", seen: seen.clone() }),
        );

        let managed = ModelRequest::prompt(ModelId::parse("azure-gpt-4o").unwrap(), "hi", 5);
        let market = ModelRequest::prompt(ModelId::parse("google/gemini-2.0-flash-001").unwrap(), "hi", 5);
        assert_eq!(dispatcher.dispatch(&managed).await.unwrap(), "managed");
        assert_eq!(dispatcher.dispatch(&market).await.unwrap(), "market");

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["managed:azure-gpt-4o", "market:google/gemini-2.0-flash-001"]
        );
    }
}
