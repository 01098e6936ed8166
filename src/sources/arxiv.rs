use crate::parser::PaperParser;
use crate::traits::PaperFeed;
use crate::types::{FetchConfig, Paper, Result};
use crate::Fetcher;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

pub const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

/// arXiv Atom API client for one category and one UTC submission date.
pub struct ArxivFeedSource {
    api_url: String,
    page_size: usize,
    max_results: usize,
    fetcher: Arc<Fetcher>,
}

impl ArxivFeedSource {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self::with_fetcher(Arc::new(Fetcher::new(fetch_config)?)))
    }

    pub fn with_fetcher(fetcher: Arc<Fetcher>) -> Self {
        Self {
            api_url: ARXIV_API_URL.to_string(),
            page_size: 200,
            max_results: 2000,
            fetcher,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_limits(mut self, page_size: usize, max_results: usize) -> Self {
        self.page_size = page_size.max(1);
        self.max_results = max_results.max(1);
        self
    }

    pub fn query_url(&self, feed: &str, date: NaiveDate, start: usize) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)?;
        url.query_pairs_mut()
            .append_pair("search_query", &search_query(feed, date))
            .append_pair("sortBy", "submittedDate")
            .append_pair("sortOrder", "descending")
            .append_pair("start", &start.to_string())
            .append_pair("max_results", &self.page_size.to_string());
        Ok(url)
    }
}

/// `cat:<feed> AND submittedDate:[YYYYMMDD0000 TO YYYYMMDD2359]`
pub fn search_query(feed: &str, date: NaiveDate) -> String {
    let day = date.format("%Y%m%d");
    format!("cat:{} AND submittedDate:[{}0000 TO {}2359]", feed, day, day)
}

#[async_trait]
impl PaperFeed for ArxivFeedSource {
    fn source_name(&self) -> String {
        "arXiv".to_string()
    }

    async fn fetch(&self, feed: &str, date: NaiveDate) -> Result<Vec<Paper>> {
        info!("Fetching arXiv {} papers submitted on {}", feed, date);

        let mut parser = PaperParser::new();
        let mut papers = Vec::new();
        let mut start = 0;

        while start < self.max_results {
            let url = self.query_url(feed, date, start)?;
            let content = self.fetcher.fetch_with_retry(url.as_str()).await?;
            let (page, entry_count) = parser.parse_page(&content)?;
            papers.extend(page);

            if entry_count < self.page_size {
                break;
            }
            start += self.page_size;
        }

        if start >= self.max_results {
            warn!("Stopped paging {} at {} results; later papers are skipped", feed, self.max_results);
        }

        info!("Fetched {} arXiv {} papers for {}", papers.len(), feed, date);
        Ok(papers)
    }
}
