//! `listmap-backfill`: resolve missing listing coordinates for one source.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use listmap_db::{Database, PoolConfig};
use listmap_jobs::{BackfillConfig, BackfillDriver};

#[derive(Parser, Debug)]
#[command(name = "listmap-backfill")]
#[command(about = "Backfill missing listing coordinates from the bundled Czech gazetteer")]
struct Args {
    /// Source whose listings are backfilled [env: BACKFILL_SOURCE, default: gfr]
    #[arg(long)]
    source: Option<String>,

    /// Resolve and report without writing [env: BACKFILL_DRY_RUN]
    #[arg(long)]
    dry_run: bool,

    /// Apply pending schema migrations before the run
    #[arg(long)]
    migrate: bool,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("listmap-backfill.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _file_guard = init_tracing();

    let args = Args::parse();
    let mut config = BackfillConfig::from_env().context("invalid backfill configuration")?;
    if let Some(source) = args.source {
        config = config.with_source(source);
    }
    if args.dry_run {
        config = config.with_dry_run(true);
    }

    let pool_config = PoolConfig::from_env().context("invalid pool configuration")?;
    let db = Database::connect_with_config(&args.database_url, pool_config)
        .await
        .context("failed to connect to database")?;

    if args.migrate {
        db.migrate().await.context("failed to apply migrations")?;
        info!("Migrations applied");
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current location");
            let _ = cancel_tx.send(true);
        }
    });

    let driver = BackfillDriver::czech(Arc::new(db.listings.clone())).with_dry_run(config.dry_run);
    let summary = driver
        .run_until_cancelled(&config.source, &cancel_rx)
        .await
        .inspect_err(|e| error!(source = %config.source, error = %e, "Backfill failed"))
        .context("backfill failed")?;

    println!("{summary}");
    listmap_db::log_pool_metrics(db.pool());
    Ok(())
}
