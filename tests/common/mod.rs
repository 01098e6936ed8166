#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use paper_digest::llm_adapter::{Dispatch, DispatchError, ModelId, ModelRequest};
use paper_digest::traits::{PageSource, PaperFeed, ReportRenderer};
use paper_digest::{DigestError, Paper, Result, Settings};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init();
    });
}

pub fn published() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 17, 0, 0).unwrap()
}

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

pub fn paper(id: &str, title: &str) -> Paper {
    Paper::new(id, title, published())
        .with_abstract(format!("Abstract of {}.", title))
        .with_source_url(format!("https://arxiv.org/abs/{}", id))
}

pub fn marketplace_model() -> ModelId {
    ModelId::parse("google/gemini-2.0-flash-001").unwrap()
}

pub fn managed_model() -> ModelId {
    ModelId::parse("azure-gpt-4o").unwrap()
}

pub fn settings(feed: &str) -> Settings {
    Settings {
        feed: feed.to_string(),
        topic: "image generation".to_string(),
        summarization_prompt: "Summarize briefly.".to_string(),
        small_model: marketplace_model(),
        large_model: ModelId::parse("google/gemini-2.5-flash").unwrap(),
    }
}

pub fn rating_json(overall: f64) -> String {
    format!(
        r#"{{"tldr":"short","tldr_zh":"简短","relevance_score":7,"novelty_claim_score":6,"clarity_score":8,"potential_impact_score":7,"overall_priority_score":{}}}"#,
        overall
    )
}

/// HTML page whose article body extracts to roughly `chars` characters.
pub fn article_page(chars: usize) -> String {
    let sentence = "Diffusion models generate images. ";
    let body: String = sentence.repeat(chars / sentence.len() + 1).chars().take(chars).collect();
    format!(
        "<html><head><title>x</title></head><body><nav>menu</nav><article><p>{}</p></article></body></html>",
        body
    )
}

type Responder = dyn Fn(&ModelRequest) -> std::result::Result<String, DispatchError> + Send + Sync;

/// Dispatcher that answers from a script, or from a closure once the script runs out.
#[derive(Clone)]
pub struct ScriptedDispatcher {
    script: Arc<Mutex<VecDeque<std::result::Result<String, DispatchError>>>>,
    fallback: Arc<Responder>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedDispatcher {
    pub fn replies(replies: Vec<std::result::Result<String, DispatchError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into())),
            fallback: Arc::new(|_: &ModelRequest| Err(DispatchError::Transport("script exhausted".to_string()))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::replies(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&ModelRequest) -> std::result::Result<String, DispatchError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Dispatch for ScriptedDispatcher {
    async fn dispatch(&self, request: &ModelRequest) -> std::result::Result<String, DispatchError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => reply,
            None => (self.fallback)(request),
        }
    }
}

/// Replies by budget class: filter "yes", rating JSON, anything larger a summary.
pub fn happy_dispatcher() -> ScriptedDispatcher {
    ScriptedDispatcher::responding(|request| match request.max_output_tokens {
        5 => Ok("Yes.".to_string()),
        1000 => Ok(rating_json(8.0)),
        _ => Ok("A concise summary.".to_string()),
    })
}

/// Feed client that hands out a fixed list and counts calls.
#[derive(Clone)]
pub struct CountingFeed {
    papers: Vec<Paper>,
    calls: Arc<AtomicUsize>,
}

impl CountingFeed {
    pub fn new(papers: Vec<Paper>) -> Self {
        Self {
            papers,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaperFeed for CountingFeed {
    fn source_name(&self) -> String {
        "stub feed".to_string()
    }

    async fn fetch(&self, _feed: &str, _date: NaiveDate) -> Result<Vec<Paper>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.papers.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    Page(String),
    Download(String),
}

/// Page source with canned bodies per URL that records every call in order.
#[derive(Clone, Default)]
pub struct StubPages {
    pages: HashMap<String, String>,
    downloads_fail: bool,
    calls: Arc<Mutex<Vec<PageCall>>>,
}

impl StubPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn failing_downloads(mut self) -> Self {
        self.downloads_fail = true;
        self
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for StubPages {
    async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        self.calls.lock().unwrap().push(PageCall::Page(url.to_string()));
        Ok(self.pages.get(url).cloned())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(PageCall::Download(url.to_string()));
        if self.downloads_fail {
            return Err(DigestError::General("HTTP 404 Not Found".to_string()));
        }
        Ok(b"%PDF-1.4 stub".to_vec())
    }
}

/// Renderer that writes a placeholder report, or fails as if the template were missing.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    missing_template: bool,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing_template() -> Self {
        Self {
            missing_template: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReportRenderer for RecordingRenderer {
    fn render(
        &self,
        artifact_path: &Path,
        template_dir: &Path,
        template_name: &str,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        self.calls.lock().unwrap().push(artifact_path.to_path_buf());
        if self.missing_template {
            return Err(DigestError::TemplateNotFound {
                dir: template_dir.display().to_string(),
                name: template_name.to_string(),
            });
        }

        fs::create_dir_all(output_dir)?;
        let stem = artifact_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output = output_dir.join(format!("{}.html", stem));
        fs::write(&output, "<html></html>")?;
        Ok(output)
    }
}
