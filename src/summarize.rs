use crate::html_text::extract_article_text;
use crate::llm_adapter::{Attachment, ChatMessage, ChatRole, ContentBlock, Dispatch, ModelId, ModelRequest};
use crate::traits::PageSource;
use crate::types::{DigestError, Paper, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Longest article excerpt sent to the model, in characters.
pub const MAX_INPUT_CHARS: usize = 100_000;
/// Completion budget when the article text is inlined.
pub const TEXT_MAX_TOKENS: u32 = 10_000;
/// Completion budget when the model has to read an attached PDF.
pub const ATTACHMENT_MAX_TOKENS: u32 = 20_000;
/// Extracted text at or below this many characters is not worth summarizing.
pub const MIN_ARTICLE_CHARS: usize = 200;
pub const MAX_ABSTRACT_CHARS: usize = 2_000;
pub const SUMMARY_TIMEOUT: Duration = Duration::from_secs(180);

pub const SYSTEM_PROMPT: &str =
    "You are a helpful research assistant that accurately summarizes scientific papers.";

/// Where content resolution currently stands for one paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    FullText,
    PdfAttachment,
    NoSource,
    Finished,
}

/// What running one state produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StateOutcome {
    Summary(String),
    /// The state had nothing to send: no URL, no page, or too little text.
    NoContent,
    /// Content was sent but the model call failed.
    DispatchFailed,
}

/// Next state after `state` produced `outcome`. Transitions only move forward.
///
/// A summary always finishes. A failed model call also finishes, since the
/// content was usable and a later state would only send less of it.
pub fn transition(state: ContentState, outcome: &StateOutcome) -> ContentState {
    match (state, outcome) {
        (_, StateOutcome::Summary(_)) => ContentState::Finished,
        (ContentState::FullText, StateOutcome::NoContent) => ContentState::PdfAttachment,
        (ContentState::PdfAttachment, StateOutcome::NoContent) => ContentState::NoSource,
        _ => ContentState::Finished,
    }
}

/// `.../abs/<id>` -> `.../html/<id>`.
pub fn derive_html_url(source_url: &str) -> Option<String> {
    source_url
        .contains("/abs/")
        .then(|| source_url.replacen("/abs/", "/html/", 1))
}

/// `.../abs/<id>` or `.../pdf/<id>` -> `.../pdf/<id>.pdf`.
pub fn derive_pdf_url(source_url: &str) -> Option<String> {
    let pdf_url = if source_url.contains("/pdf/") {
        source_url.to_string()
    } else if source_url.contains("/abs/") {
        source_url.replacen("/abs/", "/pdf/", 1)
    } else {
        return None;
    };

    if pdf_url.ends_with(".pdf") {
        Some(pdf_url)
    } else {
        Some(format!("{}.pdf", pdf_url))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Local copies of downloaded PDFs, keyed by the URL's file name.
pub struct PdfCache {
    dir: PathBuf,
}

impl PdfCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        let parsed = Url::parse(url).ok()?;
        let name = parsed.path_segments()?.last()?.to_string();
        (!name.is_empty()).then(|| self.dir.join(name))
    }

    /// Download `url` unless a non-empty copy exists. Failures are logged and yield `None`.
    pub async fn fetch(&self, pages: &dyn PageSource, url: &str) -> Option<PathBuf> {
        match self.try_fetch(pages, url).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to cache PDF '{}': {}", url, e);
                None
            }
        }
    }

    async fn try_fetch(&self, pages: &dyn PageSource, url: &str) -> Result<PathBuf> {
        let path = self
            .local_path(url)
            .ok_or_else(|| DigestError::General(format!("no file name in {}", url)))?;

        if let Ok(metadata) = tokio::fs::metadata(&path).await {
            if metadata.len() > 0 {
                debug!("PDF already cached at {}", path.display());
                return Ok(path);
            }
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = pages.download(url).await?;
        tokio::fs::write(&path, &bytes).await?;
        debug!("Cached {} bytes of {} at {}", bytes.len(), url, path.display());
        Ok(path)
    }
}

/// Resolves the best available content for a paper and asks the model to summarize it.
pub struct Summarizer<'a> {
    dispatcher: &'a dyn Dispatch,
    pages: &'a dyn PageSource,
    pdf_cache: &'a PdfCache,
}

impl<'a> Summarizer<'a> {
    pub fn new(dispatcher: &'a dyn Dispatch, pages: &'a dyn PageSource, pdf_cache: &'a PdfCache) -> Self {
        Self {
            dispatcher,
            pages,
            pdf_cache,
        }
    }

    /// Set `llm_summary` from the first state that yields one. Leaves the paper untouched otherwise.
    pub async fn summarize(&self, paper: &mut Paper, prompt: &str, model: &ModelId) {
        let mut state = ContentState::FullText;

        while state != ContentState::Finished {
            let outcome = match state {
                ContentState::FullText => self.summarize_full_text(paper, prompt, model).await,
                ContentState::PdfAttachment => self.summarize_pdf(paper, prompt, model).await,
                ContentState::NoSource => {
                    warn!("No usable source for '{}'; skipping summarization", paper.short_title());
                    StateOutcome::NoContent
                }
                ContentState::Finished => break,
            };

            state = transition(state, &outcome);
            match outcome {
                StateOutcome::Summary(summary) => paper.llm_summary = Some(summary),
                StateOutcome::DispatchFailed => {
                    warn!("Failed to obtain LLM summary for '{}'", paper.short_title())
                }
                StateOutcome::NoContent => {}
            }
        }
    }

    pub async fn summarize_all(&self, papers: &mut [Paper], prompt: &str, model: &ModelId) {
        let total = papers.len();
        for (index, paper) in papers.iter_mut().enumerate() {
            info!("Summarizing paper {}/{}: '{}'", index + 1, total, paper.short_title());
            self.summarize(paper, prompt, model).await;
        }
        let summarized = papers.iter().filter(|p| p.llm_summary.is_some()).count();
        info!("Summarized {} of {} papers", summarized, total);
    }

    async fn summarize_full_text(&self, paper: &Paper, prompt: &str, model: &ModelId) -> StateOutcome {
        let Some(html_url) = derive_html_url(&paper.source_url) else {
            debug!("No full-text URL for '{}'", paper.source_url);
            return StateOutcome::NoContent;
        };

        let html = match self.pages.fetch_page(&html_url).await {
            Ok(Some(html)) => html,
            Ok(None) => return StateOutcome::NoContent,
            Err(e) => {
                warn!("Failed fetching full text at {}: {}", html_url, e);
                return StateOutcome::NoContent;
            }
        };

        let text = extract_article_text(&html);
        if text.chars().count() <= MIN_ARTICLE_CHARS {
            info!("Full text at {} is empty or too short; falling back to PDF", html_url);
            return StateOutcome::NoContent;
        }

        let request = full_text_request(paper, prompt, model, truncate_chars(&text, MAX_INPUT_CHARS));
        self.dispatch(&request).await
    }

    async fn summarize_pdf(&self, paper: &Paper, prompt: &str, model: &ModelId) -> StateOutcome {
        let Some(pdf_url) = derive_pdf_url(&paper.source_url) else {
            return StateOutcome::NoContent;
        };

        self.pdf_cache.fetch(self.pages, &pdf_url).await;

        let request = pdf_request(paper, prompt, model, &pdf_url);
        self.dispatch(&request).await
    }

    async fn dispatch(&self, request: &ModelRequest) -> StateOutcome {
        match self.dispatcher.dispatch(request).await {
            Ok(reply) if !reply.trim().is_empty() => StateOutcome::Summary(reply.trim().to_string()),
            Ok(_) => {
                warn!("Model {} returned an empty summary", request.model);
                StateOutcome::DispatchFailed
            }
            Err(e) => {
                warn!("Summarization call to {} failed: {}", request.model, e);
                StateOutcome::DispatchFailed
            }
        }
    }
}

fn structured_request(model: &ModelId, blocks: Vec<ContentBlock>, max_tokens: u32) -> ModelRequest {
    let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::new(ChatRole::User, blocks)];
    ModelRequest::messages(model.clone(), messages, max_tokens).with_timeout(SUMMARY_TIMEOUT)
}

pub fn full_text_request(paper: &Paper, prompt: &str, model: &ModelId, excerpt: &str) -> ModelRequest {
    if model.supports_attachments() {
        let text = format!("{}\n\nPaper title: {}\n\nArticle text:\n{}", prompt, paper.title, excerpt);
        ModelRequest::prompt(model.clone(), text, TEXT_MAX_TOKENS).with_timeout(SUMMARY_TIMEOUT)
    } else {
        structured_request(
            model,
            vec![
                ContentBlock::text(prompt),
                ContentBlock::text(format!("Paper title: {}", paper.title)),
                ContentBlock::text(format!("Article text:\n{}", excerpt)),
            ],
            TEXT_MAX_TOKENS,
        )
    }
}

pub fn pdf_request(paper: &Paper, prompt: &str, model: &ModelId, pdf_url: &str) -> ModelRequest {
    let context = format!(
        "Paper title: {}\nAbstract (from arXiv): {}\nPDF URL: {}\nIf you cannot read the PDF attachment or link, base the summary on the abstract.",
        paper.title,
        truncate_chars(&paper.abstract_text, MAX_ABSTRACT_CHARS),
        pdf_url
    );

    if model.supports_attachments() {
        ModelRequest::prompt(model.clone(), format!("{}\n\n{}", prompt, context), ATTACHMENT_MAX_TOKENS)
            .with_attachments(vec![Attachment::pdf(pdf_url)])
            .with_timeout(SUMMARY_TIMEOUT)
    } else {
        structured_request(
            model,
            vec![ContentBlock::text(prompt), ContentBlock::text(context)],
            ATTACHMENT_MAX_TOKENS,
        )
    }
}
