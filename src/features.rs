//! Model input construction.
//!
//! Builds the fixed-shape `[1, sequence_length, feature_count]` sequence the
//! inference backend expects. When real history is too short the builder
//! substitutes a synthetic random-walk series so inference stays invocable;
//! the origin tag tells callers which path produced the tensor.

use ndarray::Array3;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::Serialize;
use std::sync::Arc;

use crate::history::PriceHistory;
use crate::volatility::VolatilityEstimator;

pub const FEATURE_COUNT: usize = 5;

/// Seed price for the synthetic series.
const SYNTHETIC_BASE_PRICE: f64 = 4000.0;
/// Volatility assumed by the synthetic walk (also broadcast as feature 4).
const SYNTHETIC_VOLATILITY: f64 = 0.15;
/// Synthetic prices never walk below this.
const SYNTHETIC_PRICE_FLOOR: f64 = 100.0;
/// Confidence ratio stamped on synthetic positions.
const SYNTHETIC_CONFIDENCE_RATIO: f64 = 0.001;

/// Whether a feature sequence was derived from observed prices or generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureOrigin {
    Live,
    Synthetic,
}

pub struct FeatureBuilder {
    history: Arc<PriceHistory>,
    estimator: VolatilityEstimator,
    sequence_length: usize,
    short_vol_window_secs: u64,
}

impl FeatureBuilder {
    pub fn new(
        history: Arc<PriceHistory>,
        estimator: VolatilityEstimator,
        sequence_length: usize,
        short_vol_window_secs: u64,
    ) -> Self {
        Self {
            history,
            estimator,
            sequence_length: sequence_length.max(1),
            short_vol_window_secs,
        }
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Build the input sequence for one symbol. The shape is always exactly
    /// `[1, sequence_length, FEATURE_COUNT]`, live or synthetic.
    pub fn build(&self, symbol: &str) -> (Array3<f32>, FeatureOrigin) {
        let samples = self.history.recent(symbol, self.sequence_length);
        if samples.len() < self.sequence_length {
            return (self.synthetic(), FeatureOrigin::Synthetic);
        }

        let n = self.sequence_length;
        let short_vol = self.estimator.historical(symbol, self.short_vol_window_secs) as f32;
        let mut seq = Array3::<f32>::zeros((1, n, FEATURE_COUNT));

        for (i, sample) in samples.iter().enumerate() {
            let log_price = if sample.price > 0.0 { sample.price.ln() } else { 0.0 };
            let conf_ratio = if sample.price > 0.0 {
                sample.confidence / sample.price
            } else {
                0.0
            };
            let period_return = if i == 0 {
                0.0
            } else {
                let prev = samples[i - 1].price;
                if prev > 0.0 {
                    (sample.price - prev) / prev
                } else {
                    0.0
                }
            };

            seq[[0, i, 0]] = log_price as f32;
            seq[[0, i, 1]] = conf_ratio as f32;
            seq[[0, i, 2]] = i as f32 / n as f32;
            seq[[0, i, 3]] = period_return as f32;
            seq[[0, i, 4]] = short_vol;
        }

        (seq, FeatureOrigin::Live)
    }

    /// Random-walk stand-in with the same layout as the live path. Carries
    /// no market signal; callers must treat the result as degraded input.
    fn synthetic(&self) -> Array3<f32> {
        let n = self.sequence_length;
        let mut rng = rand::thread_rng();
        let mut seq = Array3::<f32>::zeros((1, n, FEATURE_COUNT));
        let mut price = SYNTHETIC_BASE_PRICE;

        for i in 0..n {
            let shock: f64 = rng.sample::<f64, _>(StandardNormal)
                * SYNTHETIC_VOLATILITY
                * price
                * 0.01;
            let period_return = if i == 0 { 0.0 } else { shock / price };
            price = (price + shock).max(SYNTHETIC_PRICE_FLOOR);

            seq[[0, i, 0]] = price.ln() as f32;
            seq[[0, i, 1]] = SYNTHETIC_CONFIDENCE_RATIO as f32;
            seq[[0, i, 2]] = i as f32 / n as f32;
            seq[[0, i, 3]] = period_return as f32;
            seq[[0, i, 4]] = SYNTHETIC_VOLATILITY as f32;
        }

        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::PriceSample;

    fn builder_with_samples(count: usize, sequence_length: usize) -> FeatureBuilder {
        let history = Arc::new(PriceHistory::new(1000));
        let now = crate::config::now_ts();
        for i in 0..count {
            history.append(PriceSample {
                symbol: "ETH/USD".to_string(),
                price: 4000.0 + i as f64,
                confidence: 4.0,
                timestamp: now - (count - i) as u64 * 3600,
            });
        }
        let estimator = VolatilityEstimator::new(Arc::clone(&history));
        FeatureBuilder::new(history, estimator, sequence_length, 6 * 3600)
    }

    #[test]
    fn test_live_shape_and_origin() {
        let builder = builder_with_samples(24, 24);
        let (seq, origin) = builder.build("ETH/USD");
        assert_eq!(seq.dim(), (1, 24, FEATURE_COUNT));
        assert_eq!(origin, FeatureOrigin::Live);
    }

    #[test]
    fn test_synthetic_shape_when_history_short() {
        let builder = builder_with_samples(5, 24);
        let (seq, origin) = builder.build("ETH/USD");
        assert_eq!(seq.dim(), (1, 24, FEATURE_COUNT));
        assert_eq!(origin, FeatureOrigin::Synthetic);
    }

    #[test]
    fn test_synthetic_for_unknown_symbol() {
        let builder = builder_with_samples(24, 24);
        let (seq, origin) = builder.build("BTC/USD");
        assert_eq!(origin, FeatureOrigin::Synthetic);
        assert_eq!(seq.dim(), (1, 24, FEATURE_COUNT));
    }

    #[test]
    fn test_live_feature_values() {
        let builder = builder_with_samples(24, 24);
        let (seq, _) = builder.build("ETH/USD");

        // Oldest of the last 24 samples has price 4000.0, confidence 4.0.
        assert!((seq[[0, 0, 0]] - 4000.0f32.ln()).abs() < 1e-4);
        assert!((seq[[0, 0, 1]] - 0.001).abs() < 1e-6);
        assert_eq!(seq[[0, 0, 2]], 0.0);
        // First position has no previous sample.
        assert_eq!(seq[[0, 0, 3]], 0.0);

        // Time position advances linearly.
        assert!((seq[[0, 12, 2]] - 0.5).abs() < 1e-6);
        // Period return at i=1: (4001 - 4000) / 4000.
        assert!((seq[[0, 1, 3]] - (1.0 / 4000.0) as f32).abs() < 1e-7);
    }

    #[test]
    fn test_short_vol_broadcast_constant() {
        let builder = builder_with_samples(24, 24);
        let (seq, _) = builder.build("ETH/USD");
        let first = seq[[0, 0, 4]];
        for i in 1..24 {
            assert_eq!(seq[[0, i, 4]], first);
        }
    }

    #[test]
    fn test_synthetic_values_are_finite_and_positive_logs() {
        let builder = builder_with_samples(0, 24);
        let (seq, origin) = builder.build("ETH/USD");
        assert_eq!(origin, FeatureOrigin::Synthetic);
        for i in 0..24 {
            for f in 0..FEATURE_COUNT {
                assert!(seq[[0, i, f]].is_finite());
            }
            // Prices stay above the floor, so log-price stays positive.
            assert!(seq[[0, i, 0]] > 0.0);
            assert_eq!(seq[[0, i, 4]], SYNTHETIC_VOLATILITY as f32);
        }
        assert_eq!(seq[[0, 0, 3]], 0.0);
    }
}
