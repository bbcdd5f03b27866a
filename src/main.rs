use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sori::config::Config;
use sori::cron;
use sori::dispatch::Dispatcher;
use sori::notify::RunNotifier;
use sori::pipeline::EpisodePipeline;
use sori::registry::SchedulerRegistry;
use sori::services::{LlmClient, PhotoClient, SearchClient, StorageClient, TtsClient};
use sori::storage::{SqliteDatabase, Store};

#[derive(Parser)]
#[command(
    name = "sori",
    version,
    about = "Unattended podcast episode generation on a cron cadence",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (environment variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatch service until interrupted
    Serve {
        /// Use per-scheduler timers instead of the polling loop
        #[arg(long, default_value = "false")]
        timers: bool,
    },

    /// Run every due scheduler once and exit
    Dispatch,

    /// Run one scheduler immediately, regardless of its cadence
    Run {
        /// Scheduler id
        id: String,
    },

    /// Print the next fire time of a cron expression
    NextRun {
        /// Five-field cron expression
        expression: String,

        /// Reference instant (RFC 3339); defaults to now
        #[arg(long)]
        from: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    setup_tracing(&cli.log_format, cli.verbose, &config)?;

    match cli.command {
        Commands::Serve { timers } => {
            tracing::info!(timers = %timers, "Starting serve command");
            serve(&config, timers).await?;
        }

        Commands::Dispatch => {
            tracing::info!("Starting dispatch command");
            dispatch_once(&config).await?;
        }

        Commands::Run { id } => {
            tracing::info!(scheduler_id = %id, "Starting run command");
            run_scheduler(&config, &id).await?;
        }

        Commands::NextRun { expression, from } => {
            next_run(&expression, from.as_deref())?;
        }
    }

    Ok(())
}

struct App {
    dispatcher: Arc<Dispatcher>,
    registry: SchedulerRegistry,
    llm: Arc<LlmClient>,
}

fn build_app(config: &Config) -> Result<App> {
    let store: Arc<dyn Store> = Arc::new(SqliteDatabase::new(&config.database.sqlite_path)?);

    let llm = Arc::new(LlmClient::new(config.llm.clone())?);
    let pipeline = Arc::new(EpisodePipeline::new(
        llm.clone(),
        Arc::new(SearchClient::new(config.search.clone())?),
        Arc::new(TtsClient::new(config.tts.clone())?),
        Arc::new(PhotoClient::new(config.images.clone())?),
        Arc::new(StorageClient::new(config.storage.clone())?),
        store.clone(),
    ));

    let notifier = Arc::new(RunNotifier::new(&config.notify));
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), pipeline, notifier));
    let registry = SchedulerRegistry::new(store, dispatcher.clone());

    Ok(App {
        dispatcher,
        registry,
        llm,
    })
}

async fn serve(config: &Config, timers: bool) -> Result<()> {
    let app = build_app(config)?;

    // Non-fatal: the service may come up later; runs fail until it does
    if !app.llm.is_available().await {
        tracing::warn!(
            endpoint = %config.llm.endpoint,
            "text generation service unreachable at startup"
        );
    }

    if timers {
        // Catch up on runs missed while the process was down, then let
        // per-scheduler timers take over
        app.dispatcher.dispatch_due(Utc::now()).await?;
        app.registry.initialize()?;

        tokio::signal::ctrl_c().await?;
        tracing::info!("shutting down");
        app.registry.shutdown();
        return Ok(());
    }

    let poll_interval = config.poll_interval();
    tracing::info!(interval_secs = poll_interval.as_secs(), "polling for due schedulers");

    loop {
        if let Err(e) = app.dispatcher.dispatch_due(Utc::now()).await {
            tracing::error!(error = %e, "dispatch tick failed");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

async fn dispatch_once(config: &Config) -> Result<()> {
    let app = build_app(config)?;
    let results = app.dispatcher.dispatch_due(Utc::now()).await?;

    println!("Dispatched {} scheduler(s)", results.len());
    for result in &results {
        let status = if result.outcome.success { "ok" } else { "failed" };
        let next = result
            .next_run_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| String::from("stalled"));
        println!("  {} {} next={}", result.scheduler_id, status, next);
    }
    Ok(())
}

async fn run_scheduler(config: &Config, id: &str) -> Result<()> {
    let app = build_app(config)?;
    let result = app.dispatcher.run_one(id).await?;

    if result.outcome.success {
        println!(
            "Generated episode {}",
            result.outcome.audio_id.as_deref().unwrap_or("?")
        );
    } else {
        println!(
            "Run failed: {}",
            result.outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn next_run(expression: &str, from: Option<&str>) -> Result<()> {
    let reference = match from {
        Some(raw) => DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc),
        None => Utc::now(),
    };

    let next = cron::next_run(expression, reference)?;
    println!("{}", next.to_rfc3339());
    Ok(())
}

fn setup_tracing(format: &str, verbose: bool, config: &Config) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("sori=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new(format!("sori={},warn", config.logging.level))
    };

    let format = if format == "text" && config.logging.format != "text" {
        config.logging.format.as_str()
    } else {
        format
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
