//! HTTP access to the hospital capacity API.

use std::time::Duration;

use anyhow::Context;
use census_core::{normalize_code, CensusError, HistoryWindow, HospitalFetch, RawSample};
use census_feed::{history_path, parse_history_str, parse_snapshot_str, snapshot_path};
use futures_util::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

pub struct CensusClient {
    client: Client,
    base_url: String,
}

impl CensusClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, path: &str) -> Result<String, CensusError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| CensusError::Transport(err.to_string()))?;

        response
            .text()
            .await
            .map_err(|err| CensusError::Transport(err.to_string()))
    }

    pub async fn fetch_history(
        &self,
        hospital_code: &str,
        window: HistoryWindow,
    ) -> Result<Vec<RawSample>, CensusError> {
        let body = self.get_text(&history_path(hospital_code, window)).await?;
        parse_history_str(hospital_code, &body)
    }

    pub async fn fetch_snapshot(&self) -> Result<Vec<RawSample>, CensusError> {
        let body = self.get_text(snapshot_path()).await?;
        parse_snapshot_str(&body)
    }

    /// Fetch every hospital concurrently. Each outcome is independent.
    pub async fn refresh(&self, hospitals: &[String], window: HistoryWindow) -> Vec<HospitalFetch> {
        let requests = hospitals.iter().map(|code| async move {
            let code = normalize_code(code);
            let outcome = self.fetch_history(&code, window).await;
            match &outcome {
                Ok(samples) => info!(hospital = %code, samples = samples.len(), "fetched history"),
                Err(err) => warn!(hospital = %code, error = %err, "history fetch failed"),
            }
            HospitalFetch {
                hospital_code: code,
                outcome,
            }
        });

        join_all(requests).await
    }
}
