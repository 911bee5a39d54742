//! Realized volatility estimation over the price history.
//!
//! Returns are simple period returns over consecutive samples; volatility is
//! the population standard deviation of those returns. Annualization assumes
//! hourly sample spacing and is not validated against actual timestamp
//! deltas (known limitation of the estimate, kept for continuity with the
//! figures downstream consumers calibrate against).

use std::sync::Arc;

use crate::history::{PriceHistory, PriceSample};
use crate::logging::log_volatility;

/// Returned whenever there is not enough history to estimate.
pub const FALLBACK_VOLATILITY: f64 = 0.15;
/// Bounds for the annualized estimate.
pub const MIN_ANNUALIZED: f64 = 0.01;
pub const MAX_ANNUALIZED: f64 = 2.0;

/// Hourly periods in a year.
const PERIODS_PER_YEAR: f64 = 24.0 * 365.0;
/// When the requested window is too sparse, fall back to this many of the
/// most recent samples.
const RECENT_FALLBACK_COUNT: usize = 24;

#[derive(Clone)]
pub struct VolatilityEstimator {
    history: Arc<PriceHistory>,
}

impl VolatilityEstimator {
    pub fn new(history: Arc<PriceHistory>) -> Self {
        Self { history }
    }

    /// Annualized historical volatility over the trailing window, clamped to
    /// [MIN_ANNUALIZED, MAX_ANNUALIZED]. Falls back to the most recent
    /// samples when the window is too sparse, and to FALLBACK_VOLATILITY
    /// when fewer than two usable returns exist.
    pub fn historical(&self, symbol: &str, period_secs: u64) -> f64 {
        let mut samples = self.history.window(symbol, period_secs);
        if samples.len() < 2 {
            let n = self.history.len(symbol).min(RECENT_FALLBACK_COUNT);
            samples = self.history.recent(symbol, n);
        }
        let value = annualized_volatility(&samples).unwrap_or(FALLBACK_VOLATILITY);
        log_volatility(symbol, "historical", value, samples.len());
        value
    }
}

/// Simple period returns over consecutive samples. Entries with a
/// non-positive previous price are skipped.
pub fn simple_returns(samples: &[PriceSample]) -> Vec<f64> {
    samples
        .windows(2)
        .filter(|w| w[0].price > 0.0)
        .map(|w| (w[1].price - w[0].price) / w[0].price)
        .collect()
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Raw (unclamped, unannualized) return volatility. None with fewer than
/// two returns.
pub fn realized_volatility(samples: &[PriceSample]) -> Option<f64> {
    let returns = simple_returns(samples);
    if returns.len() < 2 {
        return None;
    }
    Some(std_dev(&returns))
}

/// std -> annualize -> clamp, in that order.
pub fn annualized_volatility(samples: &[PriceSample]) -> Option<f64> {
    realized_volatility(samples)
        .map(|std| (std * PERIODS_PER_YEAR.sqrt()).clamp(MIN_ANNUALIZED, MAX_ANNUALIZED))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(prices: &[f64]) -> Vec<PriceSample> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceSample {
                symbol: "ETH/USD".to_string(),
                price: p,
                confidence: 0.1,
                timestamp: 1000 + i as u64 * 3600,
            })
            .collect()
    }

    fn estimator_with(prices: &[f64]) -> (VolatilityEstimator, Arc<PriceHistory>) {
        let history = Arc::new(PriceHistory::new(100));
        let now = crate::config::now_ts();
        for (i, &p) in prices.iter().enumerate() {
            history.append(PriceSample {
                symbol: "ETH/USD".to_string(),
                price: p,
                confidence: 0.1,
                timestamp: now - (prices.len() - i) as u64 * 3600,
            });
        }
        (VolatilityEstimator::new(Arc::clone(&history)), history)
    }

    #[test]
    fn test_simple_returns_known_series() {
        let returns = simple_returns(&series(&[100.0, 101.0, 99.0, 102.0, 98.0]));
        assert_eq!(returns.len(), 4);
        assert!((returns[0] - 0.01).abs() < 1e-9);
        assert!((returns[1] - (-0.019801980198019802)).abs() < 1e-9);
        assert!((returns[2] - 0.030303030303030304).abs() < 1e-9);
        assert!((returns[3] - (-0.0392156862745098)).abs() < 1e-9);
    }

    #[test]
    fn test_returns_skip_non_positive_prev_price() {
        let returns = simple_returns(&series(&[0.0, 100.0, 110.0]));
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_realized_volatility_known_series() {
        let vol = realized_volatility(&series(&[100.0, 101.0, 99.0, 102.0, 98.0])).unwrap();
        assert!((vol - 0.026743).abs() < 1e-4);
    }

    #[test]
    fn test_annualization_applies_after_std_then_clamps() {
        let samples = series(&[100.0, 101.0, 99.0, 102.0, 98.0]);
        let std = realized_volatility(&samples).unwrap();
        let unclamped = std * (24.0f64 * 365.0).sqrt();
        // The raw annualized figure exceeds the cap; the clamp is the final step.
        assert!(unclamped > MAX_ANNUALIZED);
        assert!((unclamped - 2.503).abs() < 1e-2);
        assert_eq!(annualized_volatility(&samples), Some(MAX_ANNUALIZED));
    }

    #[test]
    fn test_constant_prices_clamp_to_floor() {
        let vol = annualized_volatility(&series(&[250.0; 10])).unwrap();
        assert_eq!(vol, MIN_ANNUALIZED);
    }

    #[test]
    fn test_too_few_samples_yield_fallback() {
        let (est, _h) = estimator_with(&[]);
        assert_eq!(est.historical("ETH/USD", 24 * 3600), FALLBACK_VOLATILITY);

        let (est, _h) = estimator_with(&[4000.0]);
        assert_eq!(est.historical("ETH/USD", 24 * 3600), FALLBACK_VOLATILITY);
    }

    #[test]
    fn test_unknown_symbol_yields_fallback() {
        let (est, _h) = estimator_with(&[4000.0, 4010.0, 4005.0]);
        assert_eq!(est.historical("BTC/USD", 24 * 3600), FALLBACK_VOLATILITY);
    }

    #[test]
    fn test_sparse_window_falls_back_to_recent_samples() {
        // Samples are all older than the requested window, so the window
        // query comes back short and the recent-samples path takes over.
        let history = Arc::new(PriceHistory::new(100));
        let now = crate::config::now_ts();
        for (i, p) in [100.0, 101.0, 99.0, 102.0, 98.0].iter().enumerate() {
            history.append(PriceSample {
                symbol: "ETH/USD".to_string(),
                price: *p,
                confidence: 0.1,
                timestamp: now - 48 * 3600 - (5 - i as u64) * 3600,
            });
        }
        let est = VolatilityEstimator::new(history);
        let vol = est.historical("ETH/USD", 3600);
        // Same series as the known-series test: clamps to the cap.
        assert_eq!(vol, MAX_ANNUALIZED);
    }

    #[test]
    fn test_estimator_on_live_window() {
        let (est, _h) = estimator_with(&[100.0, 101.0, 99.0, 102.0, 98.0]);
        let vol = est.historical("ETH/USD", 24 * 3600);
        assert_eq!(vol, MAX_ANNUALIZED);
    }
}
