//! Pipeline composition and lifecycle.
//!
//! `RiskService::new` wires the components together without side effects;
//! the collector only starts polling on an explicit `start()`. Accessors are
//! synchronous compositions of already-resilient sub-calls and always
//! produce a bounded answer.

use anyhow::Result;
use std::sync::Arc;

use crate::collector::PriceCollector;
use crate::config::Config;
use crate::features::FeatureBuilder;
use crate::feed::PriceFeedSource;
use crate::history::{PriceHistory, PriceSample, SymbolOverview};
use crate::inference::{InferenceBackend, VolatilityPredictor};
use crate::lambda::{lambda_milli, LambdaCalculator};
use crate::logging::{log_lambda, log_prediction, ts_now};
use crate::summary::{PredictionSummary, RiskTier, VolatilitySnapshot};
use crate::volatility::VolatilityEstimator;
use tokio::time::Duration;

pub struct RiskService {
    cfg: Config,
    history: Arc<PriceHistory>,
    collector: PriceCollector,
    estimator: VolatilityEstimator,
    features: FeatureBuilder,
    predictor: VolatilityPredictor,
    lambda: LambdaCalculator,
}

impl RiskService {
    /// Wire the pipeline. No network access, no background work; call
    /// `start()` to begin collection.
    pub fn new(
        cfg: Config,
        feed: Arc<dyn PriceFeedSource>,
        backend: Option<Arc<dyn InferenceBackend>>,
    ) -> Self {
        let history = Arc::new(PriceHistory::new(cfg.max_history));
        let estimator = VolatilityEstimator::new(Arc::clone(&history));
        let features = FeatureBuilder::new(
            Arc::clone(&history),
            estimator.clone(),
            cfg.sequence_length,
            cfg.short_vol_window_secs,
        );
        let predictor = VolatilityPredictor::new(backend, cfg.sequence_length, cfg.feature_count);
        let lambda = LambdaCalculator::new(
            cfg.lambda_strategy,
            cfg.min_lambda,
            cfg.max_lambda,
            cfg.base_rate,
        );
        let collector = PriceCollector::new(
            feed,
            Arc::clone(&history),
            cfg.symbols.clone(),
            Duration::from_secs(cfg.poll_interval_secs),
            Duration::from_secs(cfg.error_backoff_secs),
            Duration::from_secs(cfg.stop_timeout_secs),
        );

        Self {
            cfg,
            history,
            collector,
            estimator,
            features,
            predictor,
            lambda,
        }
    }

    pub fn start(&self) -> Result<()> {
        self.collector.start()
    }

    pub async fn stop(&self) {
        self.collector.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.collector.is_running()
    }

    pub fn history(&self) -> &Arc<PriceHistory> {
        &self.history
    }

    /// Full report for one symbol: model and statistical volatility, lambda,
    /// confidence and risk labels.
    pub fn get_summary(&self, symbol: &str) -> PredictionSummary {
        let (features, origin) = self.features.build(symbol);
        let data_points = self.history.len(symbol);
        let prediction = self.predictor.predict(&features, origin, data_points);
        let historical = self.estimator.historical(symbol, self.cfg.vol_window_secs);
        let lambda = self.lambda.lambda(prediction.volatility);

        log_prediction(
            symbol,
            prediction.volatility,
            prediction.method.as_str(),
            prediction.confidence.as_str(),
        );
        log_lambda(
            symbol,
            prediction.volatility,
            lambda,
            self.lambda.strategy().as_str(),
        );

        PredictionSummary {
            symbol: symbol.to_string(),
            current_price: self.history.latest(symbol).map(|s| s.price),
            model_volatility: prediction.volatility,
            historical_volatility: historical,
            lambda,
            lambda_milli: lambda_milli(lambda),
            confidence: prediction.confidence,
            method: prediction.method,
            data_points,
            risk_tier: RiskTier::from_volatility(prediction.volatility),
            generated_at: ts_now(),
        }
    }

    /// Statistical-path answer only: trailing-window volatility and its
    /// lambda, without touching the model.
    pub fn get_current_volatility(&self, symbol: &str) -> VolatilitySnapshot {
        let volatility = self.estimator.historical(symbol, self.cfg.vol_window_secs);
        let lambda = self.lambda.lambda(volatility);
        VolatilitySnapshot {
            volatility,
            lambda,
            lambda_milli: lambda_milli(lambda),
        }
    }

    /// Last `count` samples for a symbol, oldest first.
    pub fn get_price_history(&self, symbol: &str, count: usize) -> Vec<PriceSample> {
        self.history.recent(symbol, count)
    }

    /// Per-symbol collection status for health reporting.
    pub fn history_overview(&self) -> Vec<SymbolOverview> {
        self.history.overview()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::now_ts;
    use crate::feed::PriceUpdate;
    use crate::inference::PredictionMethod;
    use crate::lambda::LambdaStrategy;
    use async_trait::async_trait;
    use ndarray::Array3;

    struct IdleFeed;

    #[async_trait]
    impl crate::feed::PriceFeedSource for IdleFeed {
        async fn latest_price(&self, _symbol: &str) -> Result<PriceUpdate> {
            Err(anyhow::anyhow!("idle"))
        }
    }

    struct FixedBackend(f64);

    impl InferenceBackend for FixedBackend {
        fn run(&self, _input: &Array3<f32>) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn test_config() -> Config {
        Config {
            symbols: vec!["ETH/USD".to_string()],
            hermes_endpoint: String::new(),
            poll_interval_secs: 30,
            error_backoff_secs: 60,
            stop_timeout_secs: 5,
            request_timeout_secs: 10,
            max_history: 1000,
            sequence_length: 24,
            feature_count: 5,
            vol_window_secs: 24 * 3600,
            short_vol_window_secs: 6 * 3600,
            min_lambda: 0.3,
            max_lambda: 1.8,
            base_rate: 0.05,
            lambda_strategy: LambdaStrategy::Linear,
            model_path: String::new(),
        }
    }

    fn seed_hourly(service: &RiskService, symbol: &str, prices: &[f64]) {
        let now = now_ts();
        for (i, &p) in prices.iter().enumerate() {
            service.history.append(PriceSample {
                symbol: symbol.to_string(),
                price: p,
                confidence: 1.0,
                timestamp: now - (prices.len() - i) as u64 * 3600,
            });
        }
    }

    #[test]
    fn test_empty_history_no_backend_summary() {
        let service = RiskService::new(test_config(), Arc::new(IdleFeed), None);
        let summary = service.get_summary("ETH/USD");

        assert_eq!(summary.model_volatility, 0.15);
        assert_eq!(summary.method, PredictionMethod::Fallback);
        assert!((summary.lambda - 1.35).abs() < 1e-9);
        assert_eq!(summary.lambda_milli, 1350);
        assert_eq!(summary.current_price, None);
        assert_eq!(summary.data_points, 0);
        assert_eq!(summary.risk_tier, RiskTier::Medium);
        assert_eq!(summary.historical_volatility, 0.15);
    }

    #[test]
    fn test_summary_with_backend_and_history() {
        let service = RiskService::new(
            test_config(),
            Arc::new(IdleFeed),
            Some(Arc::new(FixedBackend(0.4))),
        );
        let prices: Vec<f64> = (0..30).map(|i| 4000.0 + i as f64).collect();
        seed_hourly(&service, "ETH/USD", &prices);

        let summary = service.get_summary("ETH/USD");
        assert_eq!(summary.model_volatility, 0.4);
        assert_eq!(summary.method, PredictionMethod::LstmWithRealData);
        assert_eq!(summary.risk_tier, RiskTier::High);
        assert_eq!(summary.data_points, 30);
        assert_eq!(summary.current_price, Some(4029.0));
        // lambda(0.4) = 1.8 - 0.8 * 1.5
        assert!((summary.lambda - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_current_volatility_uses_statistical_path() {
        let service = RiskService::new(
            test_config(),
            Arc::new(IdleFeed),
            Some(Arc::new(FixedBackend(0.9))),
        );
        seed_hourly(&service, "ETH/USD", &[100.0; 30]);

        let snap = service.get_current_volatility("ETH/USD");
        // Constant prices clamp to the annualized floor; the backend value
        // plays no part here.
        assert_eq!(snap.volatility, 0.01);
        assert!((snap.lambda - (1.8 - (0.01 / 0.5) * 1.5)).abs() < 1e-9);
    }

    #[test]
    fn test_price_history_accessor() {
        let service = RiskService::new(test_config(), Arc::new(IdleFeed), None);
        seed_hourly(&service, "ETH/USD", &[1.0, 2.0, 3.0, 4.0]);

        let last_two = service.get_price_history("ETH/USD", 2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].price, 3.0);
        assert_eq!(last_two[1].price, 4.0);
    }

    #[test]
    fn test_overview_reports_seeded_symbols() {
        let service = RiskService::new(test_config(), Arc::new(IdleFeed), None);
        seed_hourly(&service, "ETH/USD", &[1.0, 2.0]);
        let overview = service.history_overview();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].count, 2);
    }

    #[tokio::test]
    async fn test_construction_has_no_side_effects() {
        let service = RiskService::new(test_config(), Arc::new(IdleFeed), None);
        assert!(!service.is_running());
        service.start().unwrap();
        assert!(service.is_running());
        service.stop().await;
        assert!(!service.is_running());
    }
}
