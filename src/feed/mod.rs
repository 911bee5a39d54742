//! Price feed abstraction.
//!
//! The pipeline consumes any source able to answer "latest price for this
//! symbol"; the concrete transport lives behind [`PriceFeedSource`].

pub mod pyth;

use anyhow::Result;
use async_trait::async_trait;

use crate::history::PriceSample;

pub use pyth::PythHermesSource;

/// Raw feed answer before exponent decoding.
///
/// Feeds publish fixed-point integers plus a decimal exponent; the decoded
/// value is `raw * 10^exponent` for both price and confidence.
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub symbol: String,
    pub raw_price: f64,
    pub raw_confidence: f64,
    pub exponent: i32,
    /// Feed-side publish time, epoch seconds.
    pub publish_time: u64,
}

impl PriceUpdate {
    pub fn price(&self) -> f64 {
        self.raw_price * 10f64.powi(self.exponent)
    }

    pub fn confidence(&self) -> f64 {
        self.raw_confidence * 10f64.powi(self.exponent)
    }

    pub fn into_sample(self) -> PriceSample {
        let price = self.price();
        let confidence = self.confidence();
        PriceSample {
            symbol: self.symbol,
            price,
            confidence,
            timestamp: self.publish_time,
        }
    }
}

/// Capability consumed by the collector: latest price for one symbol.
///
/// Implementations must bound their own network time (the collector relies
/// on a per-request timeout so one stalled symbol cannot delay a cycle).
#[async_trait]
pub trait PriceFeedSource: Send + Sync {
    async fn latest_price(&self, symbol: &str) -> Result<PriceUpdate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponent_decode() {
        let update = PriceUpdate {
            symbol: "ETH/USD".to_string(),
            raw_price: 423_501_000_000.0,
            raw_confidence: 150_000_000.0,
            exponent: -8,
            publish_time: 1_700_000_000,
        };
        assert!((update.price() - 4235.01).abs() < 1e-9);
        assert!((update.confidence() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_into_sample_carries_fields() {
        let update = PriceUpdate {
            symbol: "BTC/USD".to_string(),
            raw_price: 65_000.0,
            raw_confidence: 2.0,
            exponent: 0,
            publish_time: 42,
        };
        let sample = update.into_sample();
        assert_eq!(sample.symbol, "BTC/USD");
        assert_eq!(sample.price, 65_000.0);
        assert_eq!(sample.confidence, 2.0);
        assert_eq!(sample.timestamp, 42);
    }
}
