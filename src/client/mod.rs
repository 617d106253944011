//! Remote fetch client.
//!
//! Defines the `Transport` trait (one GET attempt returning JSON) and the
//! `FetchClient` that layers a bounded, fixed-delay retry policy on top.
//! A request that still fails after the retry budget degrades to `None`;
//! callers treat that as "unknown/absent", never as fatal.

pub mod http;
pub mod sodex;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::types::FetchError;

/// A single GET attempt against an upstream JSON endpoint.
///
/// Implementations apply their own per-request timeout. Non-success HTTP
/// statuses must be reported as `FetchError::Status`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// Retrying wrapper around a [`Transport`].
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    max_retries: u32,
    retry_delay: Duration,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>, cfg: &HttpConfig) -> Self {
        Self {
            transport,
            max_retries: cfg.max_retries,
            retry_delay: cfg.retry_delay(),
        }
    }

    /// Total attempts a failing request gets before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// GET `url`, retrying every failure identically up to the budget.
    pub async fn fetch(&self, url: &str) -> Option<Value> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    url,
                    attempt,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "Retrying request"
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.transport.get_json(url).await {
                Ok(body) => return Some(body),
                Err(e) => {
                    debug!(url, attempt, error = %e, "Request failed");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            debug!(
                url,
                attempts = self.max_attempts(),
                error = %e,
                "Giving up on request"
            );
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
