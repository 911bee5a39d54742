use crate::lambda::LambdaStrategy;

/// Service configuration. All pipeline parameters are fixed at construction
/// time; nothing here is re-read while the service runs.
#[derive(Clone)]
pub struct Config {
    /// Symbols tracked by the collector, e.g. "ETH/USD".
    pub symbols: Vec<String>,
    pub hermes_endpoint: String,
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Sleep after a whole poll cycle fails unexpectedly.
    pub error_backoff_secs: u64,
    /// Bound on waiting for the collector task to exit on stop.
    pub stop_timeout_secs: u64,
    /// Per-request timeout for feed calls.
    pub request_timeout_secs: u64,
    /// Per-symbol price history capacity.
    pub max_history: usize,
    pub sequence_length: usize,
    pub feature_count: usize,
    /// Lookback for the headline historical volatility figure.
    pub vol_window_secs: u64,
    /// Short lookback for the volatility feature column.
    pub short_vol_window_secs: u64,
    pub min_lambda: f64,
    pub max_lambda: f64,
    /// Base lending rate consumed by the enhanced lambda strategy.
    pub base_rate: f64,
    pub lambda_strategy: LambdaStrategy,
    pub model_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            symbols: std::env::var("SYMBOLS")
                .unwrap_or_else(|_| "ETH/USD,BTC/USD,USDC/USD,SOL/USD".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            hermes_endpoint: std::env::var("HERMES_ENDPOINT").unwrap_or_else(|_| "https://hermes.pyth.network".to_string()),
            poll_interval_secs: std::env::var("UPDATE_INTERVAL").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
            error_backoff_secs: std::env::var("ERROR_BACKOFF_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(60),
            stop_timeout_secs: std::env::var("STOP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            max_history: std::env::var("MAX_HISTORY").ok().and_then(|v| v.parse().ok()).unwrap_or(1000),
            sequence_length: std::env::var("SEQUENCE_LENGTH").ok().and_then(|v| v.parse().ok()).unwrap_or(24),
            feature_count: std::env::var("FEATURE_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            vol_window_secs: std::env::var("VOL_WINDOW_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(24 * 3600),
            short_vol_window_secs: std::env::var("SHORT_VOL_WINDOW_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(6 * 3600),
            min_lambda: std::env::var("MIN_LAMBDA").ok().and_then(|v| v.parse().ok()).unwrap_or(0.3),
            max_lambda: std::env::var("MAX_LAMBDA").ok().and_then(|v| v.parse().ok()).unwrap_or(1.8),
            base_rate: std::env::var("BASE_RATE").ok().and_then(|v| v.parse().ok()).unwrap_or(0.05),
            lambda_strategy: match std::env::var("LAMBDA_STRATEGY").as_deref() {
                Ok("enhanced") => LambdaStrategy::Enhanced,
                _ => LambdaStrategy::Linear,
            },
            model_path: std::env::var("MODEL_PATH").unwrap_or_else(|_| "model/lstm_vol.onnx".to_string()),
        }
    }
}

pub fn now_ts() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Only assert relations that hold regardless of the test runner's env.
        let cfg = Config::from_env();
        assert!(cfg.max_history >= cfg.sequence_length);
        assert!(cfg.min_lambda < cfg.max_lambda);
        assert!(cfg.feature_count > 0);
        assert!(!cfg.symbols.is_empty());
    }
}
