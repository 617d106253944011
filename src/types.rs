//! Shared types for the crawler.
//!
//! The persisted data model (`AccountRecord`, `Snapshot`) plus the
//! domain error returned by a single upstream request.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Account IDs are assigned sequentially by the platform.
pub type AccountId = u64;

/// Decimal text used when statistics are unavailable.
pub const ZERO: &str = "0";

/// Render a JSON scalar as decimal text. Numbers keep their source text.
pub fn decimal_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => ZERO.to_string(),
    }
}

/// Older snapshots may hold bare JSON numbers for volume and PnL.
fn decimal_text_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(decimal_text(value.as_ref()))
}

fn zero_text() -> String {
    ZERO.to_string()
}

// ---------------------------------------------------------------------------
// Account record
// ---------------------------------------------------------------------------

/// Everything we persist about one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    /// Chain address; immutable once resolved for an ID.
    pub address: String,
    /// Cumulative quote volume as decimal text.
    #[serde(deserialize_with = "decimal_text_field", default = "zero_text")]
    pub volume: String,
    /// Cumulative PnL as decimal text.
    #[serde(deserialize_with = "decimal_text_field", default = "zero_text")]
    pub pnl: String,
}

impl AccountRecord {
    pub fn new(id: AccountId, address: String, stats: TradingStats) -> Self {
        Self {
            id,
            address,
            volume: stats.volume,
            pnl: stats.pnl,
        }
    }

    /// Volume parsed as a decimal, if the upstream text is well-formed.
    pub fn volume_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.volume).ok()
    }
}

/// Cumulative trading statistics for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingStats {
    pub volume: String,
    pub pnl: String,
}

impl Default for TradingStats {
    fn default() -> Self {
        Self {
            volume: ZERO.to_string(),
            pnl: ZERO.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The persisted aggregate written at the end of every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub total_users: usize,
    #[serde(default)]
    pub users: Vec<AccountRecord>,
}

impl Snapshot {
    /// An empty snapshot, used when nothing usable exists on disk.
    pub fn empty() -> Self {
        Self {
            updated_at: Utc::now(),
            total_users: 0,
            users: Vec::new(),
        }
    }

    /// Build a snapshot from records that are already unique and sorted.
    pub fn from_sorted(users: Vec<AccountRecord>) -> Self {
        Self {
            updated_at: Utc::now(),
            total_users: users.len(),
            users,
        }
    }

    /// Known addresses keyed by ID. Blank addresses are not cache-worthy.
    pub fn address_map(&self) -> HashMap<AccountId, String> {
        self.users
            .iter()
            .filter(|u| !u.address.is_empty())
            .map(|u| (u.id, u.address.clone()))
            .collect()
    }

    /// Highest ID present, if any.
    pub fn max_id(&self) -> Option<AccountId> {
        self.users.iter().map(|u| u.id).max()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure of a single upstream request attempt.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
