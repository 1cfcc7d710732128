//! Upstream price feed
//!
//! One call returns the latest price of every market the provider tracks,
//! as a flat `{"<venue>:<exchange>:<pair>": price}` map wrapped in a
//! `result` envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use types::market::PriceSnapshot;

/// Failure to obtain a snapshot from the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned status {0}")]
    Status(u16),

    #[error("undecodable feed response: {0}")]
    Decode(String),
}

/// Source of price snapshots.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FeedError>;
}

#[derive(Debug, Deserialize)]
struct PricesEnvelope {
    result: PriceSnapshot,
}

/// Decode a `/markets/prices` response body.
pub fn decode_prices(body: &str) -> Result<PriceSnapshot, FeedError> {
    serde_json::from_str::<PricesEnvelope>(body)
        .map(|envelope| envelope.result)
        .map_err(|e| FeedError::Decode(e.to_string()))
}

/// HTTP client for a Cryptowatch-style `/markets/prices` endpoint.
pub struct HttpPriceFeed {
    client: Client,
    base_url: String,
}

impl HttpPriceFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn prices_url(&self) -> String {
        format!("{}/markets/prices", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FeedError> {
        let url = self.prices_url();
        let res = self.client.get(&url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = res.text().await?;
        let snapshot = decode_prices(&body)?;
        debug!(url = %url, markets = snapshot.len(), "Fetched price snapshot");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_prices_envelope() {
        let body = r#"{
            "result": {
                "market:binance-us:atomusd": 12.5,
                "market:kraken:btcusd": 64000,
                "bad-key": 3
            },
            "allowance": {"cost": 0.005, "remaining": 9.9}
        }"#;

        let snapshot = decode_prices(body).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("market:kraken:btcusd"), Some(64000.0));
    }

    #[test]
    fn test_decode_rejects_non_numeric_price() {
        let body = r#"{"result": {"market:kraken:btcusd": "64000"}}"#;
        assert!(matches!(decode_prices(body), Err(FeedError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_missing_result() {
        assert!(matches!(decode_prices("{}"), Err(FeedError::Decode(_))));
        assert!(matches!(decode_prices("<html>"), Err(FeedError::Decode(_))));
    }

    #[test]
    fn test_prices_url() {
        let feed = HttpPriceFeed::new("https://api.cryptowat.ch/", Duration::from_secs(5)).unwrap();
        assert_eq!(feed.prices_url(), "https://api.cryptowat.ch/markets/prices");
    }
}
