//! steamsync - keep a game catalog in sync with installed Steam libraries
//!
//! Main entry point for the command-line daemon.
//!
//! # Execution Flow
//!
//! 1. Load `steamsync.yaml` from the configuration directory (positional
//!    argument, default `config/`), with `STEAMSYNC_*` environment overrides
//! 2. Initialize logging → `<log_dir>/steamsync.<date>`
//! 3. With `--list-steam-games` or `--list-steam-folders`, print the
//!    libraries' contents and exit
//! 4. Load the catalog snapshot and build the [`SyncEngine`]
//! 5. If `watch` is set, start the library watcher so changes made during
//!    the first pass are queued
//! 6. Run one full pass and save the catalog
//! 7. When watching, follow manifest changes until Ctrl-C, saving the
//!    catalog after every pass that changed it
//!
//! The engine is synchronous; passes run on tokio's blocking pool so the
//! event loop keeps draining the watcher queue.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use std::sync::Arc;
use steamsync::models::{STEAM_RUNNER, WINESTEAM_RUNNER};
use steamsync::services::format_library_folders;
use steamsync::{
    APP_NAME, ConfigManager, LibraryResolver, LibraryWatcher, MemoryCatalog, MemoryConfigStore,
    Metrics, SteamInstall, SyncConfig, SyncEngine, SyncReport, SyncStateManager, VERSION,
    list_apps,
};

const DEFAULT_CONFIG_DIR: &str = "config";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding steamsync.yaml and the catalog snapshot
    #[arg(default_value = DEFAULT_CONFIG_DIR)]
    config_dir: Utf8PathBuf,

    /// List the apps found in every Steam library and exit
    #[arg(long, short = 's', conflicts_with = "list_steam_folders")]
    list_steam_games: bool,

    /// List the known Steam library folders and exit
    #[arg(long)]
    list_steam_folders: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let config = config_manager.load_sync_config()?;
    let listing = cli.list_steam_games || cli.list_steam_folders;

    // Listings own stdout
    let _log_guard = steamsync::logging::setup_logging_with_console(
        &Utf8PathBuf::from(&config.log_dir),
        APP_NAME,
        config.debug_mode,
        !listing,
    )?;

    if listing {
        let libraries = resolver(&config).resolve();
        if cli.list_steam_games {
            for app in list_apps(&libraries) {
                println!("{app}");
            }
        } else {
            for line in format_library_folders(&libraries) {
                println!("{line}");
            }
        }
        return Ok(());
    }

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("steamsync-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run(config_manager, config));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result.inspect_err(|e| tracing::error!("{:#}", e))
}

async fn run(config_manager: ConfigManager, config: SyncConfig) -> Result<()> {
    let catalog = Arc::new(MemoryCatalog::from_entries(
        config_manager.load_catalog(&config.catalog_file)?,
    ));
    let metrics = Arc::new(Metrics::new());
    let engine = Arc::new(SyncEngine::with_metrics(
        resolver(&config),
        catalog.clone(),
        Arc::new(MemoryConfigStore::new()),
        metrics.clone(),
    ));
    let state = SyncStateManager::new();

    // Events raised during the first pass wait in the queue
    let watch = config.watch.then(|| {
        let roots: Vec<Utf8PathBuf> = engine
            .resolver()
            .resolve_flat()
            .into_iter()
            .map(|root| root.path)
            .collect();
        LibraryWatcher::with_channel(&roots, config.event_queue_capacity, metrics.clone())
    });

    full_sync(&engine, &state).await?;
    save_catalog(&config_manager, &config, &catalog)?;

    let Some((mut watcher, mut events)) = watch else {
        metrics.log_summary();
        return Ok(());
    };
    state.set_watching(watcher.is_watching());

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::warn!("Library watcher unavailable, stopping after the initial pass");
                    break;
                };
                state.record_change(&event);

                if !state.try_begin_sync() {
                    continue;
                }
                let pass_engine = Arc::clone(&engine);
                let result = tokio::task::spawn_blocking(move || pass_engine.handle_change(&event))
                    .await
                    .context("Sync task panicked")?;

                let report = result.unwrap_or_else(|e| {
                    tracing::error!("Failed to apply library change: {}", e);
                    SyncReport::default()
                });
                let changed = !report.is_noop();
                if state.finish_sync(&report) {
                    full_sync_continue(&engine, &state).await?;
                }
                if changed {
                    save_catalog(&config_manager, &config, &catalog)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping library watcher");
                break;
            }
        }
    }

    watcher.stop();
    state.set_watching(false);
    save_catalog(&config_manager, &config, &catalog)?;
    metrics.log_summary();
    Ok(())
}

fn resolver(config: &SyncConfig) -> LibraryResolver {
    LibraryResolver::new(
        SteamInstall::new(STEAM_RUNNER, config.native_steam_dir()),
        SteamInstall::new(WINESTEAM_RUNNER, config.compat_steam_dir()),
    )
}

/// Run a full pass unless one is already running.
async fn full_sync(engine: &Arc<SyncEngine>, state: &SyncStateManager) -> Result<()> {
    if !state.try_begin_sync() {
        tracing::debug!("Sync already running, request queued");
        return Ok(());
    }
    full_sync_continue(engine, state).await
}

/// Run full passes until no further pass is pending. The caller must own the sync slot.
async fn full_sync_continue(engine: &Arc<SyncEngine>, state: &SyncStateManager) -> Result<()> {
    loop {
        let pass_engine = Arc::clone(engine);
        let result = tokio::task::spawn_blocking(move || pass_engine.sync_with_catalog())
            .await
            .context("Sync task panicked")?;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                state.finish_sync(&SyncReport::default());
                return Err(e).context("Steam sync failed");
            }
        };

        if !state.finish_sync(&report) {
            return Ok(());
        }
    }
}

fn save_catalog(
    config_manager: &ConfigManager,
    config: &SyncConfig,
    catalog: &MemoryCatalog,
) -> Result<()> {
    let entries = catalog.entries()?;
    config_manager.save_catalog(&config.catalog_file, &entries)
}
