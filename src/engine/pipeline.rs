//! Single-run orchestration: load → scan → enrich → merge → persist.

use anyhow::Result;
use rust_decimal::Decimal;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::enricher::Enricher;
use super::merger;
use super::scanner::{FrontierScanner, ProbeOutcome};
use crate::client::http::HttpTransport;
use crate::client::sodex::SodexApi;
use crate::client::{FetchClient, Transport};
use crate::config::AppConfig;
use crate::storage;
use crate::types::{AccountId, Snapshot};

/// Summary of one completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub range: RangeInclusive<AccountId>,
    pub previous_total: usize,
    pub probes: u32,
    pub frontier_stopped_on: ProbeOutcome,
    pub produced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stats_defaulted: usize,
    pub address_cache_hits: usize,
    pub address_lookups: usize,
    pub refreshed: usize,
    pub added: usize,
    pub carried_over: usize,
    pub total_users: usize,
    /// Sum of every well-formed volume in the written snapshot.
    pub total_volume: Decimal,
    pub snapshot_path: PathBuf,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IDs {}..={}: enriched={} new={} skipped={} failed={} total={} volume={}",
            self.range.start(),
            self.range.end(),
            self.produced,
            self.added,
            self.skipped,
            self.failed,
            self.total_users,
            self.total_volume,
        )
    }
}

pub struct Crawler {
    cfg: AppConfig,
    api: Arc<SodexApi>,
}

impl Crawler {
    /// Build a crawler over an arbitrary transport.
    pub fn new(cfg: AppConfig, transport: Arc<dyn Transport>) -> Self {
        let client = FetchClient::new(transport, &cfg.http);
        let api = Arc::new(SodexApi::new(client, &cfg.api));
        Self { cfg, api }
    }

    /// Build a crawler that talks HTTP.
    pub fn from_config(cfg: AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(&cfg.http, &cfg.api.user_agent)?;
        Ok(Self::new(cfg, Arc::new(transport)))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.cfg.storage.snapshot_path)
    }

    /// Run once. Only a failure to write the snapshot is an error.
    pub async fn run(&self) -> Result<RunReport> {
        let path = self.snapshot_path();

        let previous = match storage::load_snapshot(&path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => Snapshot::empty(),
            Err(e) => {
                warn!(
                    error = format!("{e:#}"),
                    "Could not read existing snapshot, starting fresh"
                );
                Snapshot::empty()
            }
        };

        let frontier = FrontierScanner::new(self.api.clone(), &self.cfg.scan)
            .scan(previous.max_id())
            .await;
        let range = frontier.range();

        info!(
            from = range.start(),
            to = range.end(),
            count = frontier.id_count(),
            "Processing account range"
        );

        let pool = Enricher::new(self.api.clone(), previous.address_map(), &self.cfg.pool)
            .enrich_range(range.clone())
            .await;

        let produced = pool.records.len();
        let merged = merger::merge(&previous.users, pool.records);

        storage::save_snapshot(&merged.snapshot, &path)?;

        let total_volume: Decimal = merged
            .snapshot
            .users
            .iter()
            .filter_map(|u| u.volume_decimal())
            .sum();

        Ok(RunReport {
            range,
            previous_total: previous.users.len(),
            probes: frontier.probes,
            frontier_stopped_on: frontier.stopped_on,
            produced,
            skipped: pool.skipped,
            failed: pool.failed_ids.len(),
            stats_defaulted: pool.stats_defaulted,
            address_cache_hits: pool.cache_hits,
            address_lookups: pool.address_lookups,
            refreshed: merged.refreshed,
            added: merged.added,
            carried_over: merged.carried_over,
            total_users: merged.snapshot.total_users,
            total_volume,
            snapshot_path: path,
        })
    }
}
