use crate::types::{DigestError, Paper, Result};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Turns arXiv Atom responses into `Paper` records.
///
/// Keeps the ids it has already produced so that overlapping pages of the
/// same query never yield a paper twice.
pub struct PaperParser {
    seen_ids: HashSet<String>,
}

impl Default for PaperParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperParser {
    pub fn new() -> Self {
        Self {
            seen_ids: HashSet::new(),
        }
    }

    /// Parse one page of results. Returns the new papers and the raw entry count of the page.
    pub fn parse_page(&mut self, content: &str) -> Result<(Vec<Paper>, usize)> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| DigestError::Parse(format!("Failed to parse feed: {}", e)))?;

        let entry_count = feed.entries.len();
        let papers: Vec<Paper> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry))
            .collect();

        info!("Parsed {} papers from {} entries", papers.len(), entry_count);
        Ok((papers, entry_count))
    }

    fn parse_entry(&mut self, entry: feed_rs::model::Entry) -> Option<Paper> {
        let id = paper_id(&entry.id);
        if id.is_empty() {
            debug!("Skipping entry without an id");
            return None;
        }
        if !self.seen_ids.insert(id.clone()) {
            debug!("Skipping duplicate entry: {}", id);
            return None;
        }

        let published = match entry.published.or(entry.updated) {
            Some(published) => published,
            None => {
                debug!("Skipping entry {} without a publication date", id);
                return None;
            }
        };

        let title = entry
            .title
            .map(|t| normalize_whitespace(&t.content))
            .unwrap_or_else(|| "Untitled".to_string());

        let source_url = entry
            .links
            .iter()
            .find(|link| link.rel.as_deref() == Some("alternate"))
            .or_else(|| entry.links.first())
            .map(|link| link.href.clone())
            .unwrap_or_else(|| entry.id.clone());

        let mut paper = Paper::new(id, title, published)
            .with_abstract(entry.summary.map(|s| normalize_whitespace(&s.content)).unwrap_or_default())
            .with_source_url(source_url);
        paper.authors = entry.authors.into_iter().map(|a| normalize_whitespace(&a.name)).collect();
        paper.categories = entry.categories.into_iter().map(|c| c.term).collect();
        paper.updated_date = entry.updated;

        Some(paper)
    }
}

/// `http://arxiv.org/abs/2401.12345v1` -> `2401.12345v1`; anything else is kept as-is.
pub fn paper_id(entry_id: &str) -> String {
    entry_id
        .split_once("/abs/")
        .map(|(_, id)| id)
        .unwrap_or(entry_id)
        .trim()
        .to_string()
}

/// Collapse runs of whitespace, including the hard line breaks arXiv puts in titles.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
