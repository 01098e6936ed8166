use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use paper_digest::backends::{build_client, ManagedBackend, MarketplaceBackend};
use paper_digest::config::DEFAULT_FEED;
use paper_digest::{
    ArxivFeedSource, BackendSettings, ConfigBundle, DigestPipeline, FetchConfig, Fetcher, ModelDispatcher,
    Overrides, ProjectLayout, RunStatus, Settings, TemplateRenderer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "paper-digest",
    version,
    about = "Fetch, filter, rate and summarize the day's arXiv papers into a report"
)]
struct Cli {
    /// Date to process (YYYY-MM-DD, UTC). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// arXiv category, e.g. cs.CV. Overrides the config bundle.
    #[arg(long)]
    category: Option<String>,

    /// Name of the config bundle under <project-root>/config/
    #[arg(long, default_value = "default")]
    config: String,

    /// Topic description used by the relevance filter. Overrides the config bundle.
    #[arg(long)]
    filter_prompt: Option<String>,

    /// Model for filtering and rating (prefix with azure- for an Azure deployment)
    #[arg(long)]
    model: Option<String>,

    /// Model for summarization
    #[arg(long)]
    large_model: Option<String>,

    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Also process this many days before --date, oldest first
    #[arg(long, default_value_t = 2)]
    backfill_days: u32,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let run_date = cli.date.unwrap_or_else(|| Utc::now().date_naive());
    info!("Starting paper digest for {} (backfill {} days)", run_date, cli.backfill_days);

    let default_feed = cli.category.clone().unwrap_or_else(|| DEFAULT_FEED.to_string());
    let bundle = match ConfigBundle::load(&cli.project_root, &cli.config, &default_feed) {
        Ok(bundle) => Some(bundle),
        Err(e) => {
            warn!("Could not load config bundle '{}': {}; using built-in defaults", cli.config, e);
            None
        }
    };

    let overrides = Overrides {
        feed: cli.category.clone(),
        filter_prompt: cli.filter_prompt.clone(),
        small_model: cli.model.clone(),
        large_model: cli.large_model.clone(),
    };
    let settings = Settings::resolve(bundle.as_ref(), &overrides).context("invalid settings")?;
    info!(
        "Feed {}, filter/rating model {}, summarization model {}",
        settings.feed, settings.small_model, settings.large_model
    );

    let layout = ProjectLayout::new(&cli.project_root);
    if !layout.template_dir.join(&layout.template_name).exists() {
        warn!(
            "Template {} not found in {}; reports will not be rendered",
            layout.template_name,
            layout.template_dir.display()
        );
    }

    let backend_settings = BackendSettings::from_env();
    let client = build_client(&backend_settings.user_agent).context("failed to build HTTP client")?;
    let dispatcher = ModelDispatcher::new(
        Box::new(ManagedBackend::new(client.clone(), &backend_settings)),
        Box::new(MarketplaceBackend::new(client, &backend_settings)),
    );

    let fetcher = Arc::new(Fetcher::new(FetchConfig::default()).context("failed to build HTTP fetcher")?);
    let feed = ArxivFeedSource::with_fetcher(Arc::clone(&fetcher));
    let pages = fetcher;

    let pipeline = DigestPipeline::new(
        Box::new(feed),
        Box::new(dispatcher),
        Box::new(pages),
        Box::new(TemplateRenderer::new()),
        layout,
    );

    let dates: Vec<NaiveDate> = (0..=cli.backfill_days)
        .rev()
        .map(|days_back| run_date - Duration::days(i64::from(days_back)))
        .collect();

    let mut failed = 0;
    for (_, result) in pipeline.run_window(&dates, &settings).await {
        match result {
            Ok(outcome) => match outcome.status {
                RunStatus::Cached => info!("{}: reused existing artifact", outcome.key),
                RunStatus::Computed { papers } => info!("{}: saved {} papers", outcome.key, papers),
                RunStatus::NoPapers => warn!("{}: no papers yet, will retry on a later run", outcome.key),
            },
            Err(_) => failed += 1,
        }
    }

    info!("Paper digest finished ({} of {} dates failed)", failed, dates.len());
    Ok(())
}
