use clap::Parser;
use nw_core::{ArticleStore, Result};
use nw_enrich::feeds::FeedsConfig;
use nw_enrich::{dedupe, normalize, Pipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "RSS news collection and enrichment jobs", long_about = None)]
struct Cli {
    /// Storage backend: postgres, notion or memory
    #[arg(long, default_value = "postgres")]
    storage: String,

    /// Language model backend: openai or dummy
    #[arg(long, default_value = "openai")]
    model: String,

    /// Feed configuration file, used by the collect job
    #[arg(long, default_value = "rss_feeds.yaml")]
    feeds: PathBuf,

    /// Cap on articles handled per enrich run
    #[arg(long, default_value_t = 100)]
    limit: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Scan configured feeds and store new articles
    Collect,
    /// Summarize and tag stored articles that lack metadata
    Enrich,
    /// Delete duplicate articles sharing a URL, keeping the earliest
    Dedupe,
    /// Collapse near-duplicate source labels onto canonical ones
    NormalizeSources,
    /// Show per-source article counts
    Sources,
}

async fn print_sources(store: &dyn ArticleStore) -> Result<()> {
    let counts = store.source_counts().await?;
    let total: i64 = counts.iter().map(|(_, count)| count).sum();
    for (source, count) in &counts {
        println!("  {}: {}", source, count);
    }
    println!("  total: {} articles", total);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let store = nw_storage::create_store(&cli.storage).await?;
    info!("💾 Storage initialized (using {})", cli.storage);

    let model = nw_inference::create_model(&cli.model, &nw_inference::Config::from_env())?;
    info!("🧠 Language model initialized (using {})", model.name());

    match cli.command {
        Commands::Collect => {
            let config = FeedsConfig::load(&cli.feeds)?;
            let report = Pipeline::new(store, model).collect(&config).await?;
            info!(
                scanned = report.scanned,
                inserted = report.inserted,
                existing = report.existing,
                skipped = report.skipped,
                "collect run finished"
            );
        }
        Commands::Enrich => {
            let report = Pipeline::new(store, model).enrich(cli.limit).await?;
            info!(
                claimed = report.claimed,
                enriched = report.enriched,
                skipped = report.skipped,
                "enrich run finished"
            );
        }
        Commands::Dedupe => {
            let report = dedupe::run(store.as_ref()).await?;
            info!(
                scanned = report.scanned,
                deleted = report.deleted,
                "dedupe run finished"
            );
        }
        Commands::NormalizeSources => {
            println!("Sources before normalization:");
            print_sources(store.as_ref()).await?;

            let report = normalize::run(store.as_ref(), normalize::DEFAULT_RULES).await?;
            info!(updated = report.updated, "normalize run finished");

            if report.updated > 0 {
                println!("Sources after normalization:");
                print_sources(store.as_ref()).await?;
            }
        }
        Commands::Sources => {
            print_sources(store.as_ref()).await?;
        }
    }

    Ok(())
}
