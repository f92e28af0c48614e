//! Game Sync - storefront catalog & price database
//!
//! Reconciles the Steam catalog into SQLite, refreshes prices page by page
//! and rebuilds the featured snapshot. Runs once or on a fixed interval.

use clap::Parser;
use game_sync::{run_pass, PassOptions, ProviderIdentity, Store, SyncConfig, DEFAULT_PAGE_SIZE};
use std::path::PathBuf;
use std::time::Duration;
use steam_common::SteamClient;

/// Steam catalog & price sync into SQLite
#[derive(Parser, Debug)]
#[command(name = "game_sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, default_value_t = default_db_path())]
    database: String,

    /// Drop and recreate all tables before syncing (destroys stored data)
    #[arg(long, default_value_t = false)]
    reset_schema: bool,

    /// Country code used for prices and the featured list
    #[arg(short, long, default_value = "ua")]
    country: String,

    /// Local id of the provider row
    #[arg(long, default_value_t = 1)]
    provider_id: i64,

    /// Name of the provider row
    #[arg(long, default_value = "steam")]
    provider_name: String,

    /// Links refreshed per provider price call
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Price pages refreshed per pass
    #[arg(long, default_value_t = 1)]
    pages_per_run: usize,

    /// Skip reconciling the full catalog
    #[arg(long, default_value_t = false)]
    skip_catalog: bool,

    /// Skip rebuilding the featured snapshot
    #[arg(long, default_value_t = false)]
    skip_featured: bool,

    /// Seconds to wait for the database to become ready
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Run once and exit (default: run continuously)
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Hours between passes when running continuously
    #[arg(long, default_value_t = 1)]
    interval_hours: u64,
}

/// Returns the default database path: ~/.local/share/game_sync/games.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("game_sync")
        .join("games.db")
        .to_string_lossy()
        .to_string()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let db_path = PathBuf::from(&args.database);

    log::info!("Starting game_sync...");
    log::info!("Database path: {}", db_path.display());

    let config = match SyncConfig::new(
        ProviderIdentity::new(args.provider_id, args.provider_name.clone()),
        &args.country,
        args.page_size,
        args.pages_per_run,
    ) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    let store = match Store::open(&db_path, Duration::from_secs(args.connect_timeout_secs)) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let schema = if args.reset_schema {
        store.ensure_schema()
    } else {
        store.init_schema()
    };
    if let Err(e) = schema {
        log::error!("Failed to initialize database schema: {}", e);
        std::process::exit(1);
    }

    let client = SteamClient::new();
    let options = PassOptions {
        reconcile_catalog: !args.skip_catalog,
        refresh_featured: !args.skip_featured,
    };

    if args.once {
        run_sync(&store, &client, &config, options);
    } else {
        log::info!(
            "Running in daemon mode, syncing every {} hour(s)",
            args.interval_hours
        );
        run_daemon(&store, &client, &config, options, args.interval_hours);
    }
}

/// Run a pass now, then again after every interval
fn run_daemon(
    store: &Store,
    client: &SteamClient,
    config: &SyncConfig,
    options: PassOptions,
    interval_hours: u64,
) {
    let interval = Duration::from_secs(interval_hours.max(1) * 3600);
    loop {
        run_sync(store, client, config, options);
        std::thread::sleep(interval);
        log::info!("Scheduled sync triggered");
    }
}

/// Run a single pass, logging the outcome
fn run_sync(store: &Store, client: &SteamClient, config: &SyncConfig, options: PassOptions) {
    match run_pass(store, client, config, options) {
        Ok(report) => {
            match serde_json::to_string(&report) {
                Ok(json) => log::info!("Sync completed successfully: {}", json),
                Err(_) => log::info!("Sync completed successfully."),
            }
        }
        Err(e) => log::error!("Sync pass failed: {}", e),
    }
}
