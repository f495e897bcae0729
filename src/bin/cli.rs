//! Shelfwatch CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use shelfwatch::{
    config,
    error::{AppError, Result},
    models::{Config, SiteConfig},
    pipeline::{
        CycleOrchestrator, CycleOutcome, GuardConfig, Scheduler, SnapshotGuard,
        wait_for_shutdown,
    },
    services::{Notifier, ProductScraper, TelegramNotifier},
    storage::LocalSnapshotStore,
};
use tokio_util::sync::CancellationToken;

/// Shelfwatch - Product Listing Watcher
#[derive(Parser, Debug)]
#[command(
    name = "shelfwatch",
    version,
    about = "Watches a product listing page for new, removed, and repriced products"
)]
struct Cli {
    /// Path to storage directory containing config files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Check the site on a fixed interval until interrupted (default)
    Watch,

    /// Run a single check and exit
    Once,

    /// Validate configuration files
    Validate,

    /// Show current snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => {
            let (config, site) = config::load_all(&cli.storage_dir)?;
            let notifier = Arc::new(TelegramNotifier::new(&config.telegram)?);

            log::info!("Testing Telegram connection...");
            if !notifier.test_connectivity().await {
                return Err(AppError::config(
                    "Failed to send test message. Check TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID",
                ));
            }

            let orchestrator = build_orchestrator(&config, site, notifier)?;
            let scheduler = Scheduler::from_config(&config.monitor);

            log::info!(
                "Watching {} every {}s",
                orchestrator.site().url,
                config.monitor.check_interval_secs
            );

            let token = CancellationToken::new();
            tokio::spawn(wait_for_shutdown(token.clone()));

            let stats = scheduler.run(&orchestrator, token).await;
            log::info!("Stopped after {} checks", stats.cycles);
            Ok(ExitCode::SUCCESS)
        }

        Command::Once => {
            let (config, site) = config::load_all(&cli.storage_dir)?;
            let notifier = Arc::new(TelegramNotifier::new(&config.telegram)?);
            let orchestrator = build_orchestrator(&config, site, notifier)?;

            let outcome = orchestrator.run_cycle().await;
            Ok(exit_code(&outcome))
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            let (config, site) = config::load_all(&cli.storage_dir)?;
            log::info!("✓ Config OK (check every {}s)", config.monitor.check_interval_secs);
            log::info!(
                "✓ Site config OK: {} ({})",
                site.name,
                config.monitor.site_config.display()
            );

            log::info!("All validations passed!");
            Ok(ExitCode::SUCCESS)
        }

        Command::Info => {
            let config = config::load_config(&cli.storage_dir)?;
            let store = LocalSnapshotStore::new(&config.monitor.state_file);

            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("Snapshot: {}", store.path().display());

            match store.read_snapshot().await? {
                Some(snapshot) => {
                    match snapshot.updated_at {
                        Some(updated) => log::info!("Last updated: {}", updated.to_rfc3339()),
                        None => log::info!("Last updated: unknown"),
                    }
                    log::info!("Products: {}", snapshot.products.len());
                }
                None => log::info!("No snapshot found yet."),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_orchestrator(
    config: &Config,
    site: SiteConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<CycleOrchestrator> {
    let source = Arc::new(ProductScraper::from_config(&config.scraper)?);
    let store = Arc::new(LocalSnapshotStore::new(&config.monitor.state_file));
    let guard = SnapshotGuard::with_config(GuardConfig {
        max_drop_percent: config.monitor.max_drop_percent,
    });

    Ok(CycleOrchestrator::new(Arc::new(site), source, store, notifier).with_guard(guard))
}

/// Non-zero unless the snapshot advanced and any changes were delivered.
fn exit_code(outcome: &CycleOutcome) -> ExitCode {
    if outcome.is_success() && !outcome.delivery_failed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
