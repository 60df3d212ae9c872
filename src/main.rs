//! Review Importer main entry point
//!
//! This is the command-line interface for importing Google reviews as
//! testimonials.

use anyhow::Context;
use clap::Parser;
use review_importer::config::{load_config, load_config_with_hash, Config, Credentials};
use review_importer::fetcher::{check_api, ReqwestFetcher};
use review_importer::importer::Importer;
use review_importer::output::{load_history, print_health, print_history, HealthReporter};
use review_importer::scheduler::Scheduler;
use review_importer::storage::{open_storage, RunHistoryStore, SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Review Importer: keeps testimonials in sync with Google reviews
///
/// Fetches every review of a place from the Google Place Details API,
/// skips the ones already imported, and stores the rest as testimonials.
/// Each run is recorded so operators can check when the last import happened
/// and whether it succeeded.
#[derive(Parser, Debug)]
#[command(name = "review-importer")]
#[command(version = "1.0.0")]
#[command(about = "Imports Google reviews as testimonials", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "review-importer.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Test the API key and place id, then exit
    #[arg(long, conflicts_with_all = ["health", "history", "watch", "prune_history"])]
    check_api: bool,

    /// Show importer health and exit
    #[arg(long, conflicts_with_all = ["check_api", "history", "watch", "prune_history"])]
    health: bool,

    /// Show the most recent import runs and exit
    #[arg(long, conflicts_with_all = ["check_api", "health", "watch", "prune_history"])]
    history: bool,

    /// Keep running and import on the configured schedule
    #[arg(long, conflicts_with_all = ["check_api", "health", "history", "prune_history"])]
    watch: bool,

    /// Delete all but the newest N history entries and exit
    #[arg(long, value_name = "N", conflicts_with_all = ["check_api", "health", "history", "watch"])]
    prune_history: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // The API check also works from environment variables alone
    if cli.check_api {
        return handle_check_api(&cli.config).await;
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.health {
        handle_health(&config).await
    } else if cli.history {
        handle_history(&config)
    } else if let Some(keep) = cli.prune_history {
        handle_prune_history(&config, keep)
    } else if cli.watch {
        handle_watch(config, cli.config).await
    } else {
        handle_import(&config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("review_importer=info,warn"),
            1 => EnvFilter::new("review_importer=debug,info"),
            2 => EnvFilter::new("review_importer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens the configured database for writing
fn open_store(config: &Config) -> anyhow::Result<Arc<Mutex<SqliteStorage>>> {
    let path = Path::new(&config.storage.database_path);
    let storage = open_storage(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    storage.set_busy_timeout(config.import.persist_timeout())?;
    Ok(Arc::new(Mutex::new(storage)))
}

/// Handles the default mode: a single import run
async fn handle_import(config: &Config) -> anyhow::Result<ExitCode> {
    let storage = open_store(config)?;
    let importer = Importer::from_config(config, storage)?;

    match importer.run(&config.credentials()).await {
        Ok(imported) => {
            println!("Import complete! {} new reviews imported.", imported);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Import failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Handles the --watch mode: imports on a schedule until interrupted
async fn handle_watch(config: Config, config_path: PathBuf) -> anyhow::Result<ExitCode> {
    let storage = open_store(&config)?;
    let importer = Importer::from_config(&config, storage)?;
    let scheduler = Scheduler::new(config_path, importer);

    tokio::select! {
        _ = scheduler.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested, stopping scheduler");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Handles the --health mode
async fn handle_health(config: &Config) -> anyhow::Result<ExitCode> {
    let fetcher = ReqwestFetcher::from_config(&config.client, &config.import)?;
    let reporter = HealthReporter::new(
        Arc::new(fetcher),
        config.google.endpoint.clone(),
        config.import.clone(),
    );

    // A missing database is reported, not created
    let path = Path::new(&config.storage.database_path);
    let storage = if path.exists() {
        Some(open_storage(path)?)
    } else {
        None
    };

    let snapshot = reporter
        .snapshot(
            &config.credentials(),
            storage.as_ref().map(|s| s as &dyn Storage),
        )
        .await?;
    print_health(&snapshot, config.import.overdue_after_days);

    Ok(ExitCode::SUCCESS)
}

/// Handles the --history mode
fn handle_history(config: &Config) -> anyhow::Result<ExitCode> {
    let path = Path::new(&config.storage.database_path);
    let runs = if path.exists() {
        let storage = SqliteStorage::open_read_only(path)?;
        load_history(&storage)?
    } else {
        Vec::new()
    };

    print_history(&runs);
    Ok(ExitCode::SUCCESS)
}

/// Handles the --prune-history mode
fn handle_prune_history(config: &Config, keep: usize) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let mut storage = store
        .lock()
        .map_err(|_| anyhow::anyhow!("Storage lock poisoned"))?;
    let removed = storage.prune_runs(keep)?;

    println!("Removed {} history entries, kept the newest {}", removed, keep);
    Ok(ExitCode::SUCCESS)
}

/// Handles the --check-api mode
async fn handle_check_api(config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = if config_path.exists() {
        Some(load_config(config_path).with_context(|| {
            format!("Failed to load configuration from {}", config_path.display())
        })?)
    } else {
        tracing::info!(
            "No configuration at {}, using environment variables",
            config_path.display()
        );
        None
    };

    let (credentials, client, import, endpoint) = match &config {
        Some(config) => (
            config.credentials(),
            config.client.clone(),
            config.import.clone(),
            config.google.endpoint.clone(),
        ),
        None => (
            Credentials::from_env(),
            Default::default(),
            Default::default(),
            review_importer::config::DEFAULT_ENDPOINT.to_string(),
        ),
    };

    println!("Testing Google Places API connection...");
    println!("Place ID: {}", credentials.place_id);
    println!("API Key: {}", mask_key(&credentials.api_key));
    println!();

    let fetcher = ReqwestFetcher::from_config(&client, &import)?;
    match check_api(&fetcher, &endpoint, &credentials, import.request_timeout()).await {
        Ok(check) => {
            println!("✓ Success! Connected to: {}", check.place_name);
            if let Some(rating) = check.rating {
                println!("Rating: {}", rating);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            println!("✗ {}", failure);
            if let Some(hint) = failure.hint() {
                println!();
                for line in hint {
                    println!("{}", line);
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let visible: String = key.chars().take(5).collect();
    format!("{}...", visible)
}
