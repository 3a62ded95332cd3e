use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use apexseo::cluster::ClusterEngine;
use apexseo::config::{self, Config, EmbedderBackend};
use apexseo::db::models::SiteSnapshot;
use apexseo::db::Database;
use apexseo::embeddings::EmbeddingProvider;
use apexseo::output::terminal;
use apexseo::pipeline::{self, SiteLocks};
use apexseo::scoring::{composite_score, CompositeInputs, ContentScorer};
use apexseo::status;

/// ApexSEO: find keyword cannibalization and score content against the
/// pages that already rank.
#[derive(Parser)]
#[command(name = "apexseo", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Download the ONNX embedding model (~90 MB)
    DownloadModel,

    /// Import a site snapshot (pages and SERP competitors) from JSON
    Import {
        /// Path to a JSON file: {"site_id": ..., "pages": [...], "serp": [...]}
        file: PathBuf,
    },

    /// Embed pages that have content but no embedding yet
    Embed {
        #[arg(long)]
        site: String,
    },

    /// Rebuild the site's cannibalization (conflict) graph
    Cannibalization {
        #[arg(long)]
        site: String,

        /// Similarity at or above which two pages conflict (default: 0.85)
        #[arg(long)]
        threshold: Option<f64>,

        /// Worker threads for the pair scan (default: available cores)
        #[arg(long)]
        shards: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score page content against ranking competitors
    Score {
        #[arg(long)]
        site: String,

        /// Number of pages to score in parallel (default: 8)
        #[arg(long, default_value = "8")]
        concurrency: usize,
    },

    /// Group the site's pages into topical clusters
    Cluster {
        #[arg(long)]
        site: String,
    },

    /// Compute a composite authority score from its signals
    Composite {
        /// Topic-sensitive PageRank (0-10)
        #[arg(long)]
        tspr: f64,

        /// Content depth (0-100)
        #[arg(long)]
        depth: f64,

        /// Risk penalty subtracted from the weighted score
        #[arg(long, default_value = "0")]
        risk: f64,

        /// UX signal (0-100)
        #[arg(long, default_value = "100")]
        ux: f64,
    },

    /// Show the stored per-page report for a site
    Report {
        #[arg(long)]
        site: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show system status (DB stats, sites, last runs)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("apexseo=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing ApexSEO database...");
            let config = Config::load()?;
            let db = apexseo::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext: run `apexseo download-model`, then `apexseo import <file>`");
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading ONNX embedding model...");
            println!("  Destination: {}", model_dir.display());

            apexseo::embeddings::download::download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `apexseo embed --site <id>`.");
        }

        Commands::Import { file } => {
            let config = Config::load()?;
            let db = apexseo::db::open_sqlite(&config.db_path)?;

            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let snapshot: SiteSnapshot = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid site snapshot in {}", file.display()))?;

            let (pages, serp) = import_snapshot(db.as_ref(), &snapshot, config.embedding_dimension).await?;
            println!(
                "Imported {} pages and {} SERP results for site '{}'",
                pages, serp, snapshot.site_id
            );
        }

        Commands::Embed { site } => {
            let config = Config::load()?;
            config.require_embedder()?;
            let db = apexseo::db::open_sqlite(&config.db_path)?;
            let embedder = create_embedder(&config)?;

            println!("Embedding pages for '{site}'...");
            let stored = pipeline::embed::run(
                db.as_ref(),
                embedder.as_ref(),
                &site,
                config.embedding_dimension,
                true,
            )
            .await?;
            status::record_run(db.as_ref(), "embed", &site).await?;
            println!("Embedded {stored} pages.");
        }

        Commands::Cannibalization {
            site,
            threshold,
            shards,
            json,
        } => {
            let config = Config::load()?;
            let threshold = threshold.unwrap_or(config.similarity_threshold);
            config::validate_threshold(threshold)?;
            let db = apexseo::db::open_sqlite(&config.db_path)?;

            let shards = shards.unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            });
            let locks = SiteLocks::new();
            let analyzed = pipeline::cannibalization::run(
                db.as_ref(),
                db.as_ref(),
                &locks,
                &site,
                threshold,
                shards,
            )
            .await?;

            if analyzed.is_persisted() {
                status::record_run(db.as_ref(), "cannibalization", &site).await?;
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&analyzed.result)?);
            } else {
                terminal::display_cannibalization(&analyzed.result, &analyzed.persistence);
            }
        }

        Commands::Score { site, concurrency } => {
            let config = Config::load()?;
            config.require_embedder()?;
            let db = apexseo::db::open_sqlite(&config.db_path)?;
            let embedder = create_embedder(&config)?;

            let competitors: Arc<dyn apexseo::db::CompetitorSource> = db.clone();
            let scorer = ContentScorer::new(embedder, competitors, config.competitor_limit);

            println!("Scoring content for '{site}' ({concurrency} concurrent)...");
            let run =
                pipeline::content::run(db.as_ref(), db.as_ref(), &scorer, &site, concurrency, true)
                    .await?;

            if run.unpersisted() == 0 && run.failures.is_empty() {
                status::record_run(db.as_ref(), "score", &site).await?;
            }
            terminal::display_scoring_run(&run);
        }

        Commands::Cluster { site } => {
            let config = Config::load()?;
            let db = apexseo::db::open_sqlite(&config.db_path)?;
            let engine = Arc::new(ClusterEngine::kmeans(config.cluster_seed));
            let locks = SiteLocks::new();

            let analyzed =
                pipeline::clustering::run(db.as_ref(), db.as_ref(), &locks, engine, &site).await?;

            if analyzed.is_persisted() {
                status::record_run(db.as_ref(), "cluster", &site).await?;
            }
            terminal::display_clusters(&analyzed.result, &analyzed.persistence);
        }

        Commands::Composite {
            tspr,
            depth,
            risk,
            ux,
        } => {
            let config = Config::load()?;
            let inputs = CompositeInputs::new(tspr, depth).with_risk(risk).with_ux(ux);
            let score = composite_score(&inputs, &config.score_weights);
            terminal::display_composite(&inputs, &config.score_weights, score);
        }

        Commands::Report { site, json } => {
            let config = Config::load()?;
            let db = apexseo::db::open_sqlite(&config.db_path)?;
            let pages = db.get_page_summaries(&site).await?;
            let conflicts = db.get_conflicts(&site).await?;

            if json {
                let report = serde_json::json!({
                    "site_id": site,
                    "pages": pages,
                    "conflicts": conflicts,
                    "clusters": db.get_clusters(&site).await?,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                terminal::display_site_report(&site, &pages, &conflicts);
            }
        }

        Commands::Status => {
            let config = Config::load()?;
            match apexseo::db::open_sqlite(&config.db_path) {
                Ok(db) => status::show(db.as_ref(), &config.db_path).await?,
                Err(_) => {
                    println!("Database: not initialized");
                    println!("\nRun `apexseo init` to set up the database.");
                }
            }
        }
    }

    Ok(())
}

/// Create an embedding provider based on the configured backend.
fn create_embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedder_backend {
        EmbedderBackend::Onnx => {
            info!("Using local ONNX embedder");
            let dir = apexseo::embeddings::download::embedding_model_dir(&config.model_dir);
            let embedder = apexseo::embeddings::onnx::OnnxEmbedder::load(&dir)?;
            Ok(Arc::new(embedder))
        }
        EmbedderBackend::OpenAi => {
            info!("Using OpenAI embeddings API");
            let embedder = apexseo::embeddings::openai::OpenAiEmbedder::new(
                config.openai_api_key.clone(),
                config.embedding_dimension,
            );
            Ok(Arc::new(embedder))
        }
    }
}

/// Write a snapshot's pages and SERP rows. Every embedding must have the
/// configured dimension.
async fn import_snapshot(
    db: &dyn Database,
    snapshot: &SiteSnapshot,
    dimension: usize,
) -> Result<(usize, usize)> {
    for page in &snapshot.pages {
        if let Some(embedding) = &page.embedding {
            if embedding.len() != dimension {
                anyhow::bail!(
                    "Page {} has a {}-dimensional embedding, expected {}",
                    page.url,
                    embedding.len(),
                    dimension
                );
            }
        }
        db.upsert_page(&snapshot.site_id, page)
            .await
            .with_context(|| format!("Failed to import page {}", page.url))?;
    }

    for result in &snapshot.serp {
        if result.embedding.len() != dimension {
            anyhow::bail!(
                "SERP result {} (\"{}\" #{}) has a {}-dimensional embedding, expected {}",
                result.page_url,
                result.keyword,
                result.position,
                result.embedding.len(),
                dimension
            );
        }
        db.upsert_serp_result(result).await?;
    }

    Ok((snapshot.pages.len(), snapshot.serp.len()))
}
