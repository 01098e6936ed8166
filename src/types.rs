use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One paper as it moves through a pipeline run.
///
/// Created from the feed client's output, mutated in place by the rating and
/// summarization stages, and frozen once written into the run artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: String,
    pub title: String,
    /// Abstract text as published by the feed.
    #[serde(rename = "summary", alias = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(rename = "url", default)]
    pub source_url: String,
    pub published_date: DateTime<Utc>,
    #[serde(default)]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub rating: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_summary: Option<String>,
}

impl Paper {
    pub fn new(id: impl Into<String>, title: impl Into<String>, published_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            categories: Vec::new(),
            source_url: String::new(),
            published_date,
            updated_date: None,
            rating: None,
            llm_summary: None,
        }
    }

    pub fn with_abstract(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = abstract_text.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Sort key for the report; unrated papers rank as 0.
    pub fn priority(&self) -> f64 {
        self.rating
            .as_ref()
            .map(|rating| rating.overall_priority_score)
            .unwrap_or(0.0)
    }

    /// Short title for log lines.
    pub fn short_title(&self) -> String {
        let mut short: String = self.title.chars().take(50).collect();
        if self.title.chars().count() > 50 {
            short.push_str("...");
        }
        short
    }
}

/// Structured rating object returned by the model for a single paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub tldr: String,
    #[serde(default)]
    pub tldr_zh: String,
    pub relevance_score: f64,
    pub novelty_claim_score: f64,
    pub clarity_score: f64,
    pub potential_impact_score: f64,
    pub overall_priority_score: f64,
}

impl Rating {
    pub const MIN_SCORE: f64 = 1.0;
    pub const MAX_SCORE: f64 = 10.0;

    pub fn scores(&self) -> [(&'static str, f64); 5] {
        [
            ("relevance_score", self.relevance_score),
            ("novelty_claim_score", self.novelty_claim_score),
            ("clarity_score", self.clarity_score),
            ("potential_impact_score", self.potential_impact_score),
            ("overall_priority_score", self.overall_priority_score),
        ]
    }

    /// Name of the first score outside `1..=10`, if any.
    pub fn out_of_range_score(&self) -> Option<(&'static str, f64)> {
        self.scores()
            .into_iter()
            .find(|(_, score)| !(Self::MIN_SCORE..=Self::MAX_SCORE).contains(score))
    }
}

/// Identifies one unit of idempotent pipeline work: a UTC date on one feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub date: NaiveDate,
    pub feed: String,
}

impl RunKey {
    pub fn new(date: NaiveDate, feed: impl Into<String>) -> Self {
        Self { date, feed: feed.into() }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.feed, self.date.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_document_size_mb: usize,
    pub max_redirects: usize,
    /// Minimum spacing between two requests to the same host.
    pub min_host_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "paper-digest/0.1".to_string(),
            timeout_seconds: 60,
            max_retries: 3,
            retry_delay_seconds: 3,
            max_document_size_mb: 50,
            max_redirects: 5,
            min_host_interval_ms: 3000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Template '{name}' not found in {dir}")]
    TemplateNotFound { dir: String, name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
