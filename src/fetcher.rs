use crate::retry::{retry_bounded, RetryPolicy};
use crate::traits::PageSource;
use crate::types::{DigestError, FetchConfig, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub success: bool,
    pub error: Option<String>,
    pub http_status: Option<u16>,
    pub content: Option<String>,
}

impl FetchResult {
    fn failed(status: Option<u16>, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            http_status: status,
            content: None,
        }
    }

    /// Worth another attempt: no response at all, throttling, or a server-side error.
    fn is_retryable(&self) -> bool {
        match self.http_status {
            None => true,
            Some(status) => status == StatusCode::TOO_MANY_REQUESTS.as_u16() || status >= 500,
        }
    }
}

/// HTTP client for feed queries, article pages and PDF downloads.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    rate_limiter: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Single GET of a text document. Transport problems are reported in the result, not raised.
    pub async fn fetch_document(&self, url: &str) -> Result<FetchResult> {
        let started = Instant::now();
        debug!("Fetching document: {}", url);
        self.apply_rate_limit(url).await?;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(FetchResult::failed(None, e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(FetchResult::failed(
                Some(status.as_u16()),
                format!("HTTP {}: {}", status, status.canonical_reason().unwrap_or("Unknown")),
            ));
        }

        if let Some(content_length) = response.content_length() {
            let size_mb = content_length as usize / (1024 * 1024);
            if size_mb > self.config.max_document_size_mb {
                return Ok(FetchResult::failed(
                    Some(status.as_u16()),
                    format!("Document too large: {}MB", size_mb),
                ));
            }
        }

        match response.text().await {
            Ok(content) => {
                debug!("Fetched {} ({} bytes) in {:?}", url, content.len(), started.elapsed());
                Ok(FetchResult {
                    success: true,
                    error: None,
                    http_status: Some(status.as_u16()),
                    content: Some(content),
                })
            }
            Err(e) => Ok(FetchResult::failed(Some(status.as_u16()), e.to_string())),
        }
    }

    /// GET with exponential backoff on transport errors, throttling and 5xx responses.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let policy = RetryPolicy::with_backoff(
            self.config.max_retries + 1,
            Duration::from_secs(self.config.retry_delay_seconds),
        );

        // The accepted value is itself a Result so client errors end the loop without retrying.
        let outcome = retry_bounded(
            &policy,
            |_| self.fetch_document(url),
            |attempt, result| match result {
                Ok(fetched) if fetched.success => Ok(Ok(fetched.content.unwrap_or_default())),
                Ok(fetched) if !fetched.is_retryable() => {
                    Ok(Err(fetched.error.unwrap_or_else(|| "fetch failed".to_string())))
                }
                Ok(fetched) => {
                    let message = fetched.error.unwrap_or_else(|| "fetch failed".to_string());
                    warn!("Attempt {} failed for {}: {}", attempt, url, message);
                    Err(message)
                }
                Err(e) => Ok(Err(e.to_string())),
            },
        )
        .await;

        match outcome {
            Ok(Ok(content)) => {
                info!("Fetched {} ({} bytes)", url, content.len());
                Ok(content)
            }
            Ok(Err(message)) => Err(DigestError::General(format!("Failed to fetch {}: {}", url, message))),
            Err(exhausted) => Err(DigestError::General(format!(
                "Failed to fetch {} after {} attempt(s): {}",
                url, exhausted.attempts, exhausted.last_error
            ))),
        }
    }

    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        let parsed_url = Url::parse(url)?;
        let host = parsed_url.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.min_host_interval_ms);

        let mut rate_limiter = self.rate_limiter.write().await;
        if let Some(last_request) = rate_limiter.get(&host) {
            let elapsed = last_request.elapsed();
            if elapsed < min_interval {
                let wait_time = min_interval - elapsed;
                debug!("Rate limiting {}: waiting {:?}", host, wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        rate_limiter.insert(host, Instant::now());

        Ok(())
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        let fetched = self.fetch_document(url).await?;
        if fetched.success {
            return Ok(fetched.content);
        }

        match fetched.http_status {
            Some(status) => {
                info!("Page not available ({}) at {}", status, url);
                Ok(None)
            }
            None => Err(DigestError::General(
                fetched.error.unwrap_or_else(|| format!("Failed to fetch {}", url)),
            )),
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.apply_rate_limit(url).await?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::General(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_throttling_and_server_errors_retry() {
        let failed = |status| FetchResult::failed(status, "failed".to_string());
        assert!(failed(None).is_retryable());
        assert!(failed(Some(429)).is_retryable());
        assert!(failed(Some(503)).is_retryable());
        assert!(!failed(Some(404)).is_retryable());
        assert!(!failed(Some(403)).is_retryable());
    }

    #[test]
    fn feed_and_pages_share_one_fetcher() {
        let fetcher = Arc::new(Fetcher::new(FetchConfig::default()).unwrap());
        let feed = crate::ArxivFeedSource::with_fetcher(Arc::clone(&fetcher));
        let pages: Box<dyn PageSource> = Box::new(Arc::clone(&fetcher));
        assert_eq!(Arc::strong_count(&fetcher), 3);
        drop((feed, pages));
        assert_eq!(Arc::strong_count(&fetcher), 1);
    }
}
