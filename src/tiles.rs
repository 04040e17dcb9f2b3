//! HTTP tile lookup.
//!
//! POSTs the datatake's identity, sensing window and footprint to the
//! configured catalogue endpoint and expects `{"tiles": ["T31TCJ", ...]}`
//! back.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use datatake_completeness_core::models::Datatake;
use datatake_completeness_core::tiles::TileLookup;

use crate::config::TilesConfig;

#[derive(Debug, Serialize)]
struct TileSearchRequest<'a> {
    satellite_unit: &'a str,
    datatake_id: &'a str,
    sensing_start: Option<DateTime<Utc>>,
    sensing_stop: Option<DateTime<Utc>>,
    footprint: Option<&'a [[f64; 2]]>,
}

#[derive(Debug, Deserialize)]
struct TileSearchResponse {
    tiles: Vec<String>,
}

pub struct HttpTileLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpTileLookup {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TileLookup for HttpTileLookup {
    async fn search_expected_tiles(&self, datatake: &Datatake) -> Result<Vec<String>> {
        let request = TileSearchRequest {
            satellite_unit: &datatake.satellite_unit,
            datatake_id: &datatake.datatake_id,
            sensing_start: datatake.sensing_start,
            sensing_stop: datatake.sensing_stop,
            footprint: datatake.footprint.as_deref(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Tile search request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Tile search returned {}: {}", status, body);
        }

        let parsed: TileSearchResponse = response
            .json()
            .await
            .context("Failed to parse tile search response")?;
        Ok(parsed.tiles)
    }
}

/// Tile lookup selected by `[tiles].provider`, if any.
pub fn build_tile_lookup(config: &TilesConfig) -> Result<Option<Arc<dyn TileLookup>>> {
    if !config.is_enabled() {
        return Ok(None);
    }
    match config.provider.as_str() {
        "http" => {
            let url = config
                .url
                .as_deref()
                .context("tiles.url must be specified when provider is 'http'")?;
            let lookup: Arc<dyn TileLookup> = Arc::new(HttpTileLookup::new(
                url,
                Duration::from_secs(config.timeout_secs),
            )?);
            Ok(Some(lookup))
        }
        other => bail!("Unknown tiles provider: '{}'", other),
    }
}
