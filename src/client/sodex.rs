//! SoDEX upstream endpoints.
//!
//! Address lookup: `GET {address_url}` → `{ "code": 0, "data": { "address": "0x…" } }`.
//! A non-zero `code` means the account does not exist (yet).
//!
//! PnL overview: `GET {stats_url}` → `{ "data": { "cumulative_quote_volume": "…",
//! "cumulative_pnl": "…" } }`. The envelope code is not checked here; missing
//! fields read as `"0"`.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::FetchClient;
use crate::config::{ApiConfig, ID_PLACEHOLDER};
use crate::types::{decimal_text, AccountId, TradingStats};

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: Option<i64>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AddressData {
    #[serde(default)]
    address: Option<String>,
}

/// Volume and PnL arrive as decimal strings, occasionally as bare numbers.
#[derive(Debug, Deserialize)]
struct PnlOverview {
    #[serde(default)]
    cumulative_quote_volume: Option<Value>,
    #[serde(default)]
    cumulative_pnl: Option<Value>,
}

/// Result of asking the address endpoint about one account ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressLookup {
    /// The account exists and has an address.
    Resolved(String),
    /// `code == 0`, but the payload carried no usable address.
    NoAddress,
    /// The endpoint answered with a non-zero code.
    NotFound,
    /// No usable answer after retries.
    Unreachable,
}

impl AddressLookup {
    /// Whether the endpoint confirmed the account exists.
    pub fn exists(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::NoAddress)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SodexApi {
    client: FetchClient,
    address_url: String,
    stats_url: String,
}

impl SodexApi {
    pub fn new(client: FetchClient, cfg: &ApiConfig) -> Self {
        Self {
            client,
            address_url: cfg.address_url.clone(),
            stats_url: cfg.stats_url.clone(),
        }
    }

    pub fn address_url(&self, id: AccountId) -> String {
        render(&self.address_url, id)
    }

    pub fn stats_url(&self, id: AccountId) -> String {
        render(&self.stats_url, id)
    }

    /// Look up the chain address for `id`.
    pub async fn lookup_address(&self, id: AccountId) -> AddressLookup {
        match self.client.fetch(&self.address_url(id)).await {
            Some(body) => parse_address(id, body),
            None => AddressLookup::Unreachable,
        }
    }

    /// Fetch cumulative statistics for `id`. `None` if the request failed.
    pub async fn fetch_stats(&self, id: AccountId) -> Option<TradingStats> {
        let body = self.client.fetch(&self.stats_url(id)).await?;
        Some(parse_stats(id, body))
    }
}

fn render(template: &str, id: AccountId) -> String {
    template.replace(ID_PLACEHOLDER, &id.to_string())
}

fn parse_address(id: AccountId, body: Value) -> AddressLookup {
    let envelope: Envelope<AddressData> = match serde_json::from_value(body) {
        Ok(e) => e,
        Err(e) => {
            warn!(account_id = id, error = %e, "Malformed address response");
            return AddressLookup::NotFound;
        }
    };

    if envelope.code != Some(0) {
        debug!(account_id = id, code = ?envelope.code, "Address lookup returned non-zero code");
        return AddressLookup::NotFound;
    }

    match envelope.data.and_then(|d| d.address) {
        Some(address) if !address.is_empty() => AddressLookup::Resolved(address),
        _ => AddressLookup::NoAddress,
    }
}

fn parse_stats(id: AccountId, body: Value) -> TradingStats {
    let overview = match serde_json::from_value::<Envelope<PnlOverview>>(body) {
        Ok(envelope) => envelope.data,
        Err(e) => {
            debug!(account_id = id, error = %e, "Unexpected PnL payload, using zeros");
            None
        }
    };

    match overview {
        Some(o) => TradingStats {
            volume: decimal_text(o.cumulative_quote_volume.as_ref()),
            pnl: decimal_text(o.cumulative_pnl.as_ref()),
        },
        None => TradingStats::default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
