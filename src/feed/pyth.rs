//! Pyth Hermes HTTP price source.
//!
//! Polls the Hermes `latest` endpoint for a known set of feed ids. Hermes
//! serves prices as fixed-point integer strings plus a decimal exponent.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{PriceFeedSource, PriceUpdate};

#[derive(Deserialize, Debug)]
struct HermesResponse {
    parsed: Vec<HermesParsedFeed>,
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct HermesParsedFeed {
    id: String,
    price: HermesPrice,
}

#[derive(Deserialize, Debug)]
struct HermesPrice {
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

pub struct PythHermesSource {
    client: Client,
    endpoint: String,
    feeds: HashMap<String, String>,
}

/// Mainnet feed ids for the default symbol set.
fn default_feeds() -> HashMap<String, String> {
    [
        ("ETH/USD", "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"),
        ("BTC/USD", "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"),
        ("USDC/USD", "0xeaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a"),
        ("SOL/USD", "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"),
    ]
    .into_iter()
    .map(|(s, id)| (s.to_string(), id.to_string()))
    .collect()
}

impl PythHermesSource {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            feeds: default_feeds(),
        }
    }

    /// Replace the symbol -> feed id table.
    pub fn with_feeds(mut self, feeds: HashMap<String, String>) -> Self {
        self.feeds = feeds;
        self
    }

    fn feed_id(&self, symbol: &str) -> Option<&str> {
        self.feeds.get(symbol).map(|s| s.as_str())
    }
}

#[async_trait]
impl PriceFeedSource for PythHermesSource {
    async fn latest_price(&self, symbol: &str) -> Result<PriceUpdate> {
        let feed_id = self
            .feed_id(symbol)
            .ok_or_else(|| anyhow::anyhow!("no feed id for {}", symbol))?;

        let url = format!(
            "{}/v2/updates/price/latest?ids[]={}&parsed=true",
            self.endpoint, feed_id
        );

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("hermes error {}: {}", status, body));
        }

        let data: HermesResponse = resp.json().await?;
        let feed = data
            .parsed
            .first()
            .ok_or_else(|| anyhow::anyhow!("empty hermes payload for {}", symbol))?;

        let raw_price: f64 = feed.price.price.parse()?;
        let raw_confidence: f64 = feed.price.conf.parse()?;

        Ok(PriceUpdate {
            symbol: symbol.to_string(),
            raw_price,
            raw_confidence,
            exponent: feed.price.expo,
            publish_time: feed.price.publish_time.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_feeds_cover_tracked_symbols() {
        let feeds = default_feeds();
        for symbol in ["ETH/USD", "BTC/USD", "USDC/USD", "SOL/USD"] {
            assert!(feeds.contains_key(symbol), "missing feed id for {}", symbol);
        }
    }

    #[test]
    fn test_unknown_symbol_has_no_feed() {
        let source = PythHermesSource::new("https://hermes.pyth.network", Duration::from_secs(10));
        assert!(source.feed_id("DOGE/USD").is_none());
        assert!(source.feed_id("ETH/USD").is_some());
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let source = PythHermesSource::new("https://hermes.pyth.network/", Duration::from_secs(1));
        assert_eq!(source.endpoint, "https://hermes.pyth.network");
    }

    #[test]
    fn test_hermes_payload_parses() {
        let raw = r#"{
            "parsed": [{
                "id": "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace",
                "price": {"price": "423501000000", "conf": "150000000", "expo": -8, "publish_time": 1700000000}
            }]
        }"#;
        let parsed: HermesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.parsed.len(), 1);
        assert_eq!(parsed.parsed[0].price.expo, -8);
        assert_eq!(parsed.parsed[0].price.publish_time, 1_700_000_000);
    }
}
