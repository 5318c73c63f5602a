use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use iw_core::config::PipelineConfig;
use iw_core::{ArticleStorage, CompletionModel, TimeWindow};
use iw_fetcher::{shutdown_channel, NewsDataSource, RunLoop, Shutdown};
use iw_inference::Categorizer;
use iw_storage::RunJournal;
use std::sync::Arc;
use tracing::{info, warn};

mod duration;
mod logging;
mod settings;

use duration::HumanDuration;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "iw", author, version, about = "Collect and classify news about AI-related incidents", long_about = None)]
pub struct Cli {
    /// Storage backend: sqlite (default) or memory
    #[arg(long, env = "IW_STORAGE", default_value = "sqlite")]
    storage: String,

    /// Inference backend: openai (default) or dummy
    #[arg(long, env = "IW_MODEL", default_value = "openai")]
    model: String,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, classify and store one time window, then write a run marker
    Fetch {
        /// Window start (RFC 3339). Defaults to two hours ago.
        #[arg(long, requires = "end")]
        start: Option<DateTime<Utc>>,
        /// Window end (RFC 3339). Defaults to one hour ago.
        #[arg(long, requires = "start")]
        end: Option<DateTime<Utc>>,
    },
    /// Fetch the trailing window on a fixed interval until interrupted
    Watch {
        /// Time between cycles (e.g. 1h, 30m, 1h15m30s)
        #[arg(long, default_value = "1h")]
        interval: HumanDuration,
    },
    /// Classify stored articles that have no category yet, until interrupted
    Classify,
    /// Show the stored article count and the last completed run
    Status,
}

/// A shutdown signal fired by Ctrl-C.
fn shutdown_on_ctrl_c() -> Shutdown {
    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, finishing current work");
                trigger.trigger();
            }
            Err(e) => warn!(error = %e, "unable to listen for Ctrl-C"),
        }
    });
    shutdown
}

async fn build_run_loop(cli: &Cli, config: &PipelineConfig, with_source: bool) -> anyhow::Result<RunLoop> {
    let storage = iw_storage::create_storage(&cli.storage, &config.storage)
        .await
        .with_context(|| format!("opening {} storage", cli.storage))?;
    info!(backend = %cli.storage, path = %config.storage.database_path.display(), "storage ready");

    let model = iw_inference::create_model(&config.inference).context("creating inference model")?;
    info!(model = model.name(), name = %config.classifier.model_name, "inference model ready");

    let categorizer = Arc::new(Categorizer::new(model, config.classifier.clone()));
    let journal = RunJournal::new(&config.storage.run_log_path);
    let run_loop = RunLoop::new(categorizer, storage, journal, config.run.clone());
    if !with_source {
        return Ok(run_loop);
    }

    let source = NewsDataSource::new(&config.source).context("creating news source")?;
    Ok(run_loop.with_source(Arc::new(source), config.source.max_pages))
}

async fn status(cli: &Cli, config: &PipelineConfig) -> anyhow::Result<()> {
    let storage = iw_storage::create_storage(&cli.storage, &config.storage).await?;
    let journal = RunJournal::new(&config.storage.run_log_path);

    println!("articles stored: {}", storage.count().await?);
    match journal.last_completed().await? {
        Some(marker) => println!(
            "last run: {} articles at {}",
            marker.processed,
            marker.completed_at.to_rfc3339()
        ),
        None => println!("last run: never"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(if cli.verbose { "debug" } else { "info" });

    let config = cli.settings.to_config(&cli.model)?;

    match &cli.command {
        Commands::Fetch { start, end } => {
            let run_loop = build_run_loop(&cli, &config, true).await?;
            let window = match (start, end) {
                (Some(start), Some(end)) => TimeWindow::new(*start, *end)?,
                _ => run_loop.default_window(),
            };
            let mut shutdown = shutdown_on_ctrl_c();
            let summary = run_loop.run_cycle(&window, &mut shutdown).await?;
            println!(
                "processed {} articles from {} pages ({} new){}",
                summary.processed,
                summary.pages,
                summary.inserted,
                if summary.interrupted { ", interrupted" } else { "" }
            );
        }
        Commands::Watch { interval } => {
            let run_loop = build_run_loop(&cli, &config, true).await?;
            info!(%interval, "scheduled fetching started");
            let completed = run_loop.run_scheduled(interval.0, shutdown_on_ctrl_c()).await;
            info!(completed, "scheduled fetching stopped");
        }
        Commands::Classify => {
            let run_loop = build_run_loop(&cli, &config, false).await?;
            run_loop.run(shutdown_on_ctrl_c()).await;
        }
        Commands::Status => status(&cli, &config).await?,
    }

    Ok(())
}
