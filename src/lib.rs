pub mod backends;
pub mod config;
pub mod fetcher;
pub mod filter;
pub mod html_text;
pub mod llm_adapter;
pub mod parser;
pub mod pipeline;
pub mod rating;
pub mod render;
pub mod retry;
pub mod sources;
pub mod store;
pub mod summarize;
pub mod traits;
pub mod types;

pub use config::{BackendSettings, ConfigBundle, Overrides, ProjectLayout, Settings};
pub use fetcher::Fetcher;
pub use llm_adapter::{Dispatch, DispatchError, ModelDispatcher, ModelId, ModelRequest};
pub use parser::PaperParser;
pub use pipeline::{DigestPipeline, RunOutcome, RunStatus};
pub use render::TemplateRenderer;
pub use sources::ArxivFeedSource;
pub use types::*;
