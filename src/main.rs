//! SoDEX crawler — entry point.
//!
//! Loads configuration, initialises structured logging, runs one
//! discover → enrich → merge pass and writes the snapshot. Partial
//! enrichment failures still exit 0; only configuration or snapshot
//! write failures are fatal.

use anyhow::Result;
use tracing::info;

use sodex_crawler::config::AppConfig;
use sodex_crawler::engine::pipeline::{Crawler, RunReport};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("SODEX_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = AppConfig::load_or_default(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        start_id = cfg.scan.start_id,
        stride = cfg.scan.probe_stride,
        concurrency = cfg.pool.concurrency,
        snapshot = %cfg.storage.snapshot_path,
        "sodex-crawler starting"
    );

    let crawler = Crawler::from_config(cfg)?;
    let report = crawler.run().await?;
    log_run_report(&report);

    Ok(())
}

/// Log the end-of-run summary.
fn log_run_report(report: &RunReport) {
    info!(
        from = report.range.start(),
        to = report.range.end(),
        probes = report.probes,
        frontier_stop = ?report.frontier_stopped_on,
        enriched = report.produced,
        refreshed = report.refreshed,
        new = report.added,
        skipped = report.skipped,
        failed = report.failed,
        stats_defaulted = report.stats_defaulted,
        cache_hits = report.address_cache_hits,
        carried_over = report.carried_over,
        previous_total = report.previous_total,
        total_volume = %report.total_volume,
        "Run complete"
    );
    info!(
        users = report.total_users,
        path = %report.snapshot_path.display(),
        "Snapshot saved"
    );
    info!("{report}");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sodex_crawler=info"));

    let json_logging = std::env::var("SODEX_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
