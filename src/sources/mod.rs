pub mod arxiv;

pub use arxiv::ArxivFeedSource;
