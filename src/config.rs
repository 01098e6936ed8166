use crate::llm_adapter::ModelId;
use crate::types::{DigestError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const DEFAULT_FEED: &str = "cs.CV";
pub const DEFAULT_TOPIC: &str = "general image/video/multimodal generation or image/video editing";
pub const DEFAULT_SUMMARIZATION_PROMPT: &str =
    "Summarize the article in 5-7 bullet points. Highlight key contributions and methods.";
pub const SAMPLE_SUMMARIZATION_PROMPT: &str =
    "Summarize the paper succinctly (1-2 sentences) and highlight key contributions.";
pub const DEFAULT_SMALL_MODEL: &str = "google/gemini-2.0-flash-001";
pub const DEFAULT_LARGE_MODEL: &str = "google/gemini-2.5-flash";

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

const FILTER_PROMPT_FILE: &str = "filter_prompt.txt";
const SUMMARIZATION_PROMPT_FILE: &str = "summarization_prompt.txt";
const PROVIDER_FILE: &str = "config.yaml";

/// Named, file-backed prompt and feed settings under `<root>/config/<name>/`.
///
/// Each value is independently optional: a missing or blank file reads as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigBundle {
    pub name: String,
    pub folder: PathBuf,
    pub filter_prompt: Option<String>,
    pub summarization_prompt: Option<String>,
    pub feed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderFile {
    #[serde(default)]
    providers: Vec<ProviderEntry>,
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    provider_feed: Option<String>,
}

impl ConfigBundle {
    /// Load the bundle, writing sample files for anything missing first.
    pub fn load(project_root: &Path, name: &str, default_feed: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(DigestError::Config("config name must be a non-empty string".to_string()));
        }

        let folder = project_root.join("config").join(name);
        ensure_defaults(&folder, default_feed)?;

        Ok(Self {
            name: name.to_string(),
            filter_prompt: read_text(&folder.join(FILTER_PROMPT_FILE)),
            summarization_prompt: read_text(&folder.join(SUMMARIZATION_PROMPT_FILE)),
            feed: read_provider_feed(&folder.join(PROVIDER_FILE)),
            folder,
        })
    }
}

fn ensure_defaults(folder: &Path, default_feed: &str) -> Result<()> {
    fs::create_dir_all(folder)?;

    let filter_path = folder.join(FILTER_PROMPT_FILE);
    if !filter_path.exists() {
        fs::write(&filter_path, DEFAULT_TOPIC)?;
        warn!(
            "No filter prompt. Created a sample filter prompt at {}; edit it to describe the papers you want",
            filter_path.display()
        );
    }

    let summarization_path = folder.join(SUMMARIZATION_PROMPT_FILE);
    if !summarization_path.exists() {
        fs::write(&summarization_path, SAMPLE_SUMMARIZATION_PROMPT)?;
        info!("Created default summarization prompt at {}", summarization_path.display());
    }

    let provider_path = folder.join(PROVIDER_FILE);
    if !provider_path.exists() {
        let yaml = format!("providers:\n  - provider: arxiv\n    provider_feed: {}\n", default_feed);
        fs::write(&provider_path, yaml)?;
        warn!(
            "Created default provider feed file at {}; edit it to select your feed (e.g. provider_feed: cs.RO)",
            provider_path.display()
        );
    }

    Ok(())
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) => {
            error!("Failed reading text file {}: {}", path.display(), e);
            None
        }
    }
}

fn read_provider_feed(path: &Path) -> Option<String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed reading provider file {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_yaml::from_str::<ProviderFile>(&text) {
        Ok(parsed) => parsed
            .providers
            .into_iter()
            .next()
            .and_then(|entry| entry.provider_feed)
            .map(|feed| feed.trim().to_string())
            .filter(|feed| !feed.is_empty()),
        Err(e) => {
            warn!("Provider file {} is not valid YAML ({}); scanning for provider_feed", path.display(), e);
            scan_provider_feed(&text)
        }
    }
}

/// Line-based fallback for hand-edited provider files that no longer parse.
fn scan_provider_feed(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .map(|line| line.trim_start_matches("- "))
        .find_map(|line| line.strip_prefix("provider_feed:"))
        .map(|value| value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
        .filter(|value| !value.is_empty())
}

/// Command-line values that take precedence over the bundle.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub feed: Option<String>,
    pub filter_prompt: Option<String>,
    pub small_model: Option<String>,
    pub large_model: Option<String>,
}

/// Fully resolved values threaded into each pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub feed: String,
    pub topic: String,
    pub summarization_prompt: String,
    pub small_model: ModelId,
    pub large_model: ModelId,
}

impl Settings {
    /// Overrides win over the bundle, the bundle wins over built-in defaults.
    pub fn resolve(bundle: Option<&ConfigBundle>, overrides: &Overrides) -> Result<Self> {
        let feed = non_blank(overrides.feed.clone())
            .or_else(|| bundle.and_then(|b| b.feed.clone()))
            .unwrap_or_else(|| DEFAULT_FEED.to_string());
        let topic = non_blank(overrides.filter_prompt.clone())
            .or_else(|| bundle.and_then(|b| b.filter_prompt.clone()))
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let summarization_prompt = bundle
            .and_then(|b| b.summarization_prompt.clone())
            .unwrap_or_else(|| DEFAULT_SUMMARIZATION_PROMPT.to_string());

        let small_model = parse_model(overrides.small_model.as_deref().unwrap_or(DEFAULT_SMALL_MODEL))?;
        let large_model = parse_model(overrides.large_model.as_deref().unwrap_or(DEFAULT_LARGE_MODEL))?;

        Ok(Self {
            feed,
            topic,
            summarization_prompt,
            small_model,
            large_model,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_model(raw: &str) -> Result<ModelId> {
    ModelId::parse(raw).map_err(|e| DigestError::Config(e.to_string()))
}

/// Credentials and endpoints for the model backends, read from the environment.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub openrouter_api_key: Option<String>,
    pub openrouter_api_url: String,
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<String>,
    pub azure_api_version: String,
    pub user_agent: String,
}

impl BackendSettings {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            openrouter_api_url: var("OPENROUTER_API_URL").unwrap_or_else(|| OPENROUTER_API_URL.to_string()),
            azure_endpoint: var("AZURE_OPENAI_ENDPOINT"),
            azure_api_key: var("AZURE_OPENAI_API_KEY"),
            azure_api_version: var("AZURE_OPENAI_API_VERSION")
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            user_agent: "paper-digest/0.1".to_string(),
        }
    }
}

/// Where the pipeline reads and writes, relative to the project root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub json_dir: PathBuf,
    pub html_dir: PathBuf,
    pub template_dir: PathBuf,
    pub template_name: String,
    pub reports_index: PathBuf,
    pub pdf_cache_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            json_dir: root.join("daily_json"),
            html_dir: root.join("daily_html"),
            template_dir: root.join("templates"),
            template_name: "paper_template.html".to_string(),
            reports_index: root.join("reports.json"),
            pdf_cache_dir: root.join("tmp_pdfs"),
            root,
        }
    }
}
