use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use interfaces::defs::{Analyzer, RunOutcome, TopicId};
use interfaces::OfflineAnalyzer;
use research_aggregator::sources::default_adapters;
use research_aggregator::{
    DigestBuilder, Fetcher, OpenAiAnalyzer, ResearchAggregator, ResearchConfig, ResearchOrchestrator,
    SqliteContentStore,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Collects content on tracked topics, scores it and writes a daily digest.
#[derive(Parser)]
#[command(name = "research-aggregator", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run collection and analysis over every active topic.
    Run,

    /// Run collection and analysis for one topic, active or not.
    Topic {
        id: TopicId,
    },

    /// Print today's digest.
    Digest,

    /// Manage tracked topics.
    Topics {
        #[command(subcommand)]
        action: TopicAction,
    },

    /// Show recent runs.
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show store statistics.
    Stats,
}

#[derive(Subcommand)]
enum TopicAction {
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Enable {
        id: TopicId,
    },
    Disable {
        id: TopicId,
    },
}

fn build_analyzer(config: &ResearchConfig) -> anyhow::Result<Arc<dyn Analyzer>> {
    match &config.openai_api_key {
        Some(api_key) => {
            let analyzer = OpenAiAnalyzer::new(
                api_key.clone(),
                config.openai_base_url.clone(),
                config.openai_model.clone(),
                config.analyzer_timeout,
            )?;
            info!("Analyzer: {} at {}", analyzer.model(), config.openai_base_url);
            Ok(Arc::new(analyzer))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; records will be stored but not analyzed");
            Ok(Arc::new(OfflineAnalyzer))
        }
    }
}

fn build_orchestrator(config: &ResearchConfig, store: Arc<SqliteContentStore>) -> anyhow::Result<ResearchOrchestrator> {
    let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
    let adapters = default_adapters(fetcher, config.youtube_api_key.clone());
    let aggregator = ResearchAggregator::new(adapters, config.aggregator_settings());
    Ok(ResearchOrchestrator::new(
        aggregator,
        store,
        build_analyzer(config)?,
        config.analysis_delay,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ResearchConfig::from_env().context("invalid configuration")?;
    let store = Arc::new(
        SqliteContentStore::connect(&config.database_url)
            .await
            .with_context(|| format!("cannot open store at {}", config.database_url))?,
    );

    match cli.command {
        Commands::Run => {
            let orchestrator = build_orchestrator(&config, store)?;
            let summary = orchestrator.run_daily_research().await?;
            match summary.status {
                RunOutcome::NoTopics => println!("No active topics."),
                RunOutcome::Completed => println!(
                    "Run completed: {} topics, {} new records, {} analyzed",
                    summary.topics_processed, summary.total_found, summary.total_analyzed
                ),
            }
        }
        Commands::Topic { id } => {
            let orchestrator = build_orchestrator(&config, store)?;
            let summary = orchestrator.run_for_topic(id).await?;
            println!(
                "Topic {} done: {} new records, {} analyzed",
                id, summary.total_found, summary.total_analyzed
            );
        }
        Commands::Digest => {
            let analyzer = build_analyzer(&config)?;
            let builder = DigestBuilder::new(store, analyzer, config.digest_language);
            let digest = builder.build(Utc::now().date_naive()).await?;
            println!("{}", digest.text);
            if !digest.records.is_empty() {
                println!();
                for stored in &digest.records {
                    println!(
                        "[{}] {:.0}  {}  {}",
                        stored.record.source_kind,
                        stored.share_score().unwrap_or_default(),
                        stored.record.title,
                        stored.record.url
                    );
                }
            }
        }
        Commands::Topics { action } => match action {
            TopicAction::Add { name, description } => {
                let topic = store.add_topic(&name, description.as_deref()).await?;
                println!("Added topic {} ({})", topic.id, topic.name);
            }
            TopicAction::List => {
                for topic in store.list_topics().await? {
                    println!(
                        "{:>4}  {:<8}  {}{}",
                        topic.id,
                        if topic.is_active { "active" } else { "inactive" },
                        topic.name,
                        topic.description.map(|d| format!(" - {}", d)).unwrap_or_default()
                    );
                }
            }
            TopicAction::Enable { id } => {
                store.set_topic_active(id, true).await?;
                println!("Topic {} enabled", id);
            }
            TopicAction::Disable { id } => {
                store.set_topic_active(id, false).await?;
                println!("Topic {} disabled", id);
            }
        },
        Commands::Runs { limit } => {
            for run in store.recent_runs(limit).await? {
                println!(
                    "{:>4}  {:<9}  {}  found={} analyzed={}{}",
                    run.id,
                    run.status.as_str(),
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.total_found,
                    run.total_analyzed,
                    run.error_message.map(|m| format!("  ({})", m)).unwrap_or_default()
                );
            }
        }
        Commands::Stats => {
            let stats = store.stats().await?;
            println!("Contents:       {}", stats.total_contents);
            println!("Analyzed:       {}", stats.analyzed_contents);
            println!("High score:     {}", stats.high_score_contents);
            println!("Active topics:  {}", stats.active_topics);
            for (kind, count) in &stats.contents_by_kind {
                println!("  {:<8} {}", kind, count);
            }
        }
    }

    Ok(())
}
