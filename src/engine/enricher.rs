//! Enrichment worker pool.
//!
//! A fixed number of workers drain a shared queue of account IDs. For each
//! ID a worker resolves the address (from the carried-over cache, else the
//! address endpoint), then fetches trading statistics. An unresolved
//! address skips the ID; failed statistics fall back to zeros.
//!
//! The queue is the only shared mutable state besides the append-only
//! result list. The address cache is read-only for the whole run.

use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::ops::RangeInclusive;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::sodex::{AddressLookup, SodexApi};
use crate::config::PoolConfig;
use crate::types::{AccountId, AccountRecord, TradingStats};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Counters {
    produced: AtomicUsize,
    skipped: AtomicUsize,
    stats_defaulted: AtomicUsize,
    cache_hits: AtomicUsize,
    address_lookups: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// What a pool run produced.
#[derive(Debug, Default)]
pub struct PoolReport {
    /// Records in completion order (unsorted).
    pub records: Vec<AccountRecord>,
    /// IDs whose failed procedure produced no record.
    pub failed_ids: Vec<AccountId>,
    /// IDs with no resolvable address.
    pub skipped: usize,
    /// Records emitted with zeroed statistics.
    pub stats_defaulted: usize,
    pub cache_hits: usize,
    pub address_lookups: usize,
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

pub struct Enricher {
    api: Arc<SodexApi>,
    addresses: Arc<HashMap<AccountId, String>>,
    concurrency: usize,
    progress_every: usize,
}

impl Enricher {
    pub fn new(
        api: Arc<SodexApi>,
        addresses: HashMap<AccountId, String>,
        cfg: &PoolConfig,
    ) -> Self {
        Self {
            api,
            addresses: Arc::new(addresses),
            concurrency: cfg.concurrency.max(1),
            progress_every: cfg.progress_every.max(1),
        }
    }

    /// Enrich every ID in `ids` and return the records produced.
    pub async fn enrich_range(&self, ids: RangeInclusive<AccountId>) -> PoolReport {
        let queue: VecDeque<AccountId> = ids.collect();
        let total = queue.len();

        let shared = Arc::new(Shared {
            queue: Mutex::new(queue),
            results: Mutex::new(Vec::with_capacity(total)),
            failed_ids: Mutex::new(Vec::new()),
            counters: Counters::default(),
            total,
        });

        info!(total, workers = self.concurrency, "Starting enrichment");

        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let worker = Worker {
                id: worker_id,
                api: self.api.clone(),
                addresses: self.addresses.clone(),
                shared: shared.clone(),
                progress_every: self.progress_every,
            };
            workers.spawn(worker.run());
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Enrichment worker aborted");
            }
        }

        let records = std::mem::take(&mut *shared.results.lock().await);
        let mut failed_ids = std::mem::take(&mut *shared.failed_ids.lock().await);
        failed_ids.sort_unstable();
        let c = &shared.counters;

        let report = PoolReport {
            records,
            failed_ids,
            skipped: c.skipped.load(Ordering::Relaxed),
            stats_defaulted: c.stats_defaulted.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            address_lookups: c.address_lookups.load(Ordering::Relaxed),
        };

        info!(
            produced = report.records.len(),
            skipped = report.skipped,
            failed = report.failed_ids.len(),
            stats_defaulted = report.stats_defaulted,
            cache_hits = report.cache_hits,
            address_lookups = report.address_lookups,
            "Enrichment complete"
        );

        report
    }
}

struct Shared {
    queue: Mutex<VecDeque<AccountId>>,
    results: Mutex<Vec<AccountRecord>>,
    failed_ids: Mutex<Vec<AccountId>>,
    counters: Counters,
    total: usize,
}

struct Worker {
    id: usize,
    api: Arc<SodexApi>,
    addresses: Arc<HashMap<AccountId, String>>,
    shared: Arc<Shared>,
    progress_every: usize,
}

impl Worker {
    async fn run(self) {
        let mut handled = 0usize;

        loop {
            let next = self.shared.queue.lock().await.pop_front();
            let Some(account_id) = next else { break };
            handled += 1;

            match AssertUnwindSafe(self.enrich_one(account_id)).catch_unwind().await {
                Ok(Some(record)) => self.emit(record).await,
                Ok(None) => {
                    Counters::bump(&self.shared.counters.skipped);
                }
                Err(_) => {
                    self.shared.failed_ids.lock().await.push(account_id);
                    error!(
                        account_id,
                        worker = self.id,
                        "Enrichment failed, no record for this ID"
                    );
                }
            }
        }

        debug!(worker = self.id, handled, "Worker finished");
    }

    async fn emit(&self, record: AccountRecord) {
        self.shared.results.lock().await.push(record);

        let produced = Counters::bump(&self.shared.counters.produced);
        if produced % self.progress_every == 0 {
            info!(produced, total = self.shared.total, "Progress");
        }
    }

    /// Resolve address then statistics for one ID.
    async fn enrich_one(&self, account_id: AccountId) -> Option<AccountRecord> {
        let counters = &self.shared.counters;

        let address = match self.addresses.get(&account_id) {
            Some(cached) => {
                Counters::bump(&counters.cache_hits);
                debug!(account_id, "Address cache hit");
                cached.clone()
            }
            None => {
                Counters::bump(&counters.address_lookups);
                match self.api.lookup_address(account_id).await {
                    AddressLookup::Resolved(address) => address,
                    other => {
                        debug!(account_id, lookup = ?other, "No address, skipping account");
                        return None;
                    }
                }
            }
        };

        let stats = match self.api.fetch_stats(account_id).await {
            Some(stats) => stats,
            None => {
                Counters::bump(&counters.stats_defaulted);
                warn!(account_id, "Statistics unavailable, recording zeros");
                TradingStats::default()
            }
        };

        Some(AccountRecord::new(account_id, address, stats))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
