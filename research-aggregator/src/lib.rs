pub mod types;
pub mod utils;
pub mod fetcher;
pub mod parser;
pub mod recency;
pub mod dedup;
pub mod traits;
pub mod sources;
pub mod aggregator;
pub mod analyzer;
pub mod store;
pub mod orchestrator;
pub mod digest;
pub mod config;

pub use types::*;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use recency::RecencyWindow;
pub use traits::SourceAdapter;
pub use aggregator::{AggregatedBatch, AggregatorSettings, ResearchAggregator};
pub use analyzer::OpenAiAnalyzer;
pub use store::{SqliteContentStore, StoreStats};
pub use orchestrator::ResearchOrchestrator;
pub use digest::{Digest, DigestBuilder};
pub use config::ResearchConfig;
