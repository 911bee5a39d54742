//! Real-time volatility estimation and risk-lambda pipeline.
//!
//! A background collector polls an external price feed into a bounded
//! per-symbol history. Estimation requests read immutable snapshots of that
//! history, derive statistical and model-based volatility figures, and map
//! them to a clamped lending risk coefficient (lambda). Every path degrades
//! to a bounded numeric answer; nothing in this crate is fatal at runtime.

pub mod collector;
pub mod config;
pub mod features;
pub mod feed;
pub mod history;
pub mod inference;
pub mod lambda;
pub mod logging;
pub mod service;
pub mod summary;
pub mod volatility;

pub use collector::PriceCollector;
pub use config::Config;
pub use features::{FeatureBuilder, FeatureOrigin};
pub use feed::{PriceFeedSource, PriceUpdate};
pub use history::{PriceHistory, PriceSample};
pub use inference::{InferenceBackend, OnnxBackend, Prediction, VolatilityPredictor};
pub use lambda::{LambdaCalculator, LambdaStrategy};
pub use service::RiskService;
pub use summary::{PredictionSummary, RiskTier, VolatilitySnapshot};
pub use volatility::VolatilityEstimator;
