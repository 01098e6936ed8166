use crate::types::{Paper, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of paper metadata for one feed partition and one UTC date.
#[async_trait]
pub trait PaperFeed: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Papers announced on `date`. An empty list means nothing was published or found.
    async fn fetch(&self, feed: &str, date: NaiveDate) -> Result<Vec<Paper>>;
}

/// Retrieval of remote documents used while resolving a paper's content.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Body of `url` on a success status, `None` on any other status.
    async fn fetch_page(&self, url: &str) -> Result<Option<String>>;

    /// Raw bytes of `url`; a non-success status is an error.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Lets one rate-limited client back both the feed and the page lookups.
#[async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        (**self).fetch_page(url).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        (**self).download(url).await
    }
}

/// Turns a persisted run artifact into a display artifact.
pub trait ReportRenderer: Send + Sync {
    /// Returns the path of the rendered output. A missing template is reported as
    /// `DigestError::TemplateNotFound`.
    fn render(
        &self,
        artifact_path: &Path,
        template_dir: &Path,
        template_name: &str,
        output_dir: &Path,
    ) -> Result<PathBuf>;
}
