use crate::config::{ProjectLayout, Settings};
use crate::filter::filter_by_topic;
use crate::llm_adapter::Dispatch;
use crate::rating::{rate_papers, sort_by_priority};
use crate::store::{ArtifactStore, ReportIndex};
use crate::summarize::{PdfCache, Summarizer};
use crate::traits::{PageSource, PaperFeed, ReportRenderer};
use crate::types::{DigestError, Result, RunKey};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// An artifact already existed; nothing was fetched or sent to a model.
    Cached,
    /// A fresh artifact was written with this many papers.
    Computed { papers: usize },
    /// The feed returned nothing, so no artifact was written and the key stays open.
    NoPapers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub key: RunKey,
    pub status: RunStatus,
    pub artifact: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// Fetch, filter, rate, summarize, persist and render one (date, feed) at a time.
pub struct DigestPipeline {
    feed: Box<dyn PaperFeed>,
    dispatcher: Box<dyn Dispatch>,
    pages: Box<dyn PageSource>,
    renderer: Box<dyn ReportRenderer>,
    layout: ProjectLayout,
    store: ArtifactStore,
    pdf_cache: PdfCache,
    index: ReportIndex,
}

impl DigestPipeline {
    pub fn new(
        feed: Box<dyn PaperFeed>,
        dispatcher: Box<dyn Dispatch>,
        pages: Box<dyn PageSource>,
        renderer: Box<dyn ReportRenderer>,
        layout: ProjectLayout,
    ) -> Self {
        Self {
            store: ArtifactStore::new(&layout.json_dir),
            pdf_cache: PdfCache::new(&layout.pdf_cache_dir),
            index: ReportIndex::new(&layout.reports_index, &layout.html_dir),
            feed,
            dispatcher,
            pages,
            renderer,
            layout,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn run(&self, date: NaiveDate, settings: &Settings) -> Result<RunOutcome> {
        let key = RunKey::new(date, settings.feed.clone());
        let artifact_path = self.store.artifact_path(&key);
        info!("Starting run for {} (artifact {})", key, artifact_path.display());

        let status = if self.store.is_complete(&key) {
            info!("Found existing artifact for {}; skipping fetch, filter, rating and summarization", key);
            RunStatus::Cached
        } else {
            match self.compute(&key, settings).await? {
                Some(papers) => RunStatus::Computed { papers },
                None => {
                    return Ok(RunOutcome {
                        key,
                        status: RunStatus::NoPapers,
                        artifact: None,
                        report: None,
                    })
                }
            }
        };

        let report = self.publish(&key, &artifact_path);
        info!("Run for {} complete", key);

        Ok(RunOutcome {
            key,
            status,
            artifact: Some(artifact_path),
            report,
        })
    }

    /// Run every date in order. A failed date is logged and does not stop the others.
    pub async fn run_window(&self, dates: &[NaiveDate], settings: &Settings) -> Vec<(NaiveDate, Result<RunOutcome>)> {
        let mut results = Vec::with_capacity(dates.len());
        for &date in dates {
            let result = self.run(date, settings).await;
            if let Err(e) = &result {
                error!("Run for {}@{} failed: {}", settings.feed, date, e);
            }
            results.push((date, result));
        }
        results
    }

    /// Returns the number of papers persisted, or `None` when the feed had nothing.
    async fn compute(&self, key: &RunKey, settings: &Settings) -> Result<Option<usize>> {
        info!("Fetching {} papers from {}", key, self.feed.source_name());
        let papers = self.feed.fetch(&key.feed, key.date).await?;
        if papers.is_empty() {
            warn!("No papers found for {}; nothing will be saved", key);
            return Ok(None);
        }
        info!("Fetched {} papers for {}", papers.len(), key);

        let dispatcher = self.dispatcher.as_ref();
        let papers = filter_by_topic(dispatcher, papers, &settings.topic, &settings.small_model).await;
        if papers.is_empty() {
            warn!("No papers passed the filter for {}; saving an empty list", key);
        }

        let mut papers = rate_papers(dispatcher, papers, &settings.topic, &settings.small_model).await;
        sort_by_priority(&mut papers);

        Summarizer::new(dispatcher, self.pages.as_ref(), &self.pdf_cache)
            .summarize_all(&mut papers, &settings.summarization_prompt, &settings.large_model)
            .await;

        self.store.save(key, &papers)?;
        Ok(Some(papers.len()))
    }

    /// Render the artifact and refresh the report index. Failures here never fail the run.
    fn publish(&self, key: &RunKey, artifact_path: &std::path::Path) -> Option<PathBuf> {
        let report = match self.renderer.render(
            artifact_path,
            &self.layout.template_dir,
            &self.layout.template_name,
            &self.layout.html_dir,
        ) {
            Ok(path) => Some(path),
            Err(DigestError::TemplateNotFound { dir, name }) => {
                warn!("Template '{}' not found in '{}'; no report for {}", name, dir, key);
                None
            }
            Err(e) => {
                error!("Failed to render report for {}: {}", key, e);
                None
            }
        };

        if let Err(e) = self.index.update() {
            error!("Failed to update {}: {}", self.index.path().display(), e);
        }
        report
    }
}
