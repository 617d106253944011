//! reqwest-backed [`Transport`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::Transport;
use crate::config::HttpConfig;
use crate::types::FetchError;

pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(cfg: &HttpConfig, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout())
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self.http.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}
