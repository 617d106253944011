//! Frontier scanner.
//!
//! Finds the highest account ID reachable from the last known frontier by
//! probing forward: first `latest + 1`, then in strides of `probe_stride`
//! from each confirmed ID. The first probe that doesn't confirm an
//! account ends the scan. IDs that fall between strides past the true
//! frontier may be skipped; that is accepted in exchange for fewer round
//! trips.
//!
//! Probes run strictly one at a time.

use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::sodex::{AddressLookup, SodexApi};
use crate::config::ScanConfig;
use crate::types::AccountId;

/// How a single probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Valid,
    /// The endpoint said the account does not exist.
    Invalid,
    /// No answer after retries. Treated like `Invalid`, but reported.
    Unreachable,
}

impl From<&AddressLookup> for ProbeOutcome {
    fn from(lookup: &AddressLookup) -> Self {
        match lookup {
            AddressLookup::Unreachable => Self::Unreachable,
            l if l.exists() => Self::Valid,
            _ => Self::Invalid,
        }
    }
}

/// Result of a frontier scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontier {
    pub floor: AccountId,
    /// Where probing started: `max(known IDs ∪ {floor})`.
    pub start: AccountId,
    /// Highest confirmed ID (or `start` if nothing new was found).
    pub latest: AccountId,
    pub probes: u32,
    /// Outcome of the probe that ended the scan.
    pub stopped_on: ProbeOutcome,
}

impl Frontier {
    /// Every ID to enrich this run.
    pub fn range(&self) -> RangeInclusive<AccountId> {
        self.floor..=self.latest
    }

    /// Number of IDs in [`Frontier::range`].
    pub fn id_count(&self) -> u64 {
        self.latest - self.floor + 1
    }

    /// Newly confirmed IDs beyond the previous frontier.
    pub fn advanced_by(&self) -> u64 {
        self.latest - self.start
    }
}

pub struct FrontierScanner {
    api: Arc<SodexApi>,
    floor: AccountId,
    stride: u64,
}

impl FrontierScanner {
    pub fn new(api: Arc<SodexApi>, cfg: &ScanConfig) -> Self {
        Self {
            api,
            floor: cfg.start_id,
            stride: cfg.probe_stride.max(1),
        }
    }

    /// Scan forward from the highest known ID.
    pub async fn scan(&self, known_max: Option<AccountId>) -> Frontier {
        let start = known_max.map_or(self.floor, |m| m.max(self.floor));
        let mut latest = start;
        let mut candidate = start.saturating_add(1);
        let mut probes = 0u32;

        info!(from = start, stride = self.stride, "Scanning for the latest account ID");

        let stopped_on = loop {
            if candidate <= latest {
                // ID space exhausted.
                break ProbeOutcome::Invalid;
            }

            probes += 1;
            let outcome = self.probe(candidate).await;
            debug!(account_id = candidate, outcome = ?outcome, "Probe");

            match outcome {
                ProbeOutcome::Valid => {
                    latest = candidate;
                    candidate = candidate.saturating_add(self.stride);
                }
                ProbeOutcome::Invalid => break outcome,
                ProbeOutcome::Unreachable => {
                    warn!(
                        account_id = candidate,
                        "Probe got no answer, treating it as the end of the range"
                    );
                    break outcome;
                }
            }
        };

        let frontier = Frontier {
            floor: self.floor,
            start,
            latest,
            probes,
            stopped_on,
        };

        info!(
            latest = frontier.latest,
            new = frontier.advanced_by(),
            probes,
            stopped_on = ?stopped_on,
            "Frontier found"
        );

        frontier
    }

    async fn probe(&self, id: AccountId) -> ProbeOutcome {
        ProbeOutcome::from(&self.api.lookup_address(id).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
