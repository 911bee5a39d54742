//! Model-based volatility prediction.
//!
//! The backend is a capability: given the fixed-shape feature tensor it
//! returns one scalar. The predictor wraps whichever backend is configured
//! (or none) and guarantees a bounded numeric answer with metadata on every
//! call; backend failures never reach the caller.

use anyhow::Result;
use ndarray::Array3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::features::FeatureOrigin;
use crate::volatility::FALLBACK_VOLATILITY;

/// Bounds for model-predicted volatility. Backends are not trusted to
/// respect them.
pub const MIN_PREDICTED: f64 = 0.005;
pub const MAX_PREDICTED: f64 = 1.0;

/// Capability consumed by the predictor: one scalar per fixed-shape tensor.
pub trait InferenceBackend: Send + Sync {
    fn run(&self, input: &Array3<f32>) -> Result<f64>;
}

/// ONNX Runtime backed implementation.
pub struct OnnxBackend {
    session: Session,
    output_name: String,
}

impl OnnxBackend {
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow::anyhow!("model has no outputs"))?;
        Ok(Self {
            session,
            output_name,
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn run(&self, input: &Array3<f32>) -> Result<f64> {
        let tensor = Value::from_array(input.clone())?;
        let outputs = self.session.run(ort::inputs![tensor]?)?;
        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| anyhow::anyhow!("missing output {}", self.output_name))?;
        let data = output.try_extract_tensor::<f32>()?;
        let first = data
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("empty model output"))?;
        Ok(first as f64)
    }
}

/// How a prediction was produced. Degraded modes carry no learned signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    LstmWithRealData,
    HistoricalCalculation,
    Fallback,
    ErrorFallback,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMethod::LstmWithRealData => "lstm_with_real_data",
            PredictionMethod::HistoricalCalculation => "historical_calculation",
            PredictionMethod::Fallback => "fallback",
            PredictionMethod::ErrorFallback => "error_fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Tier from the amount of real data behind the prediction.
    pub fn from_data_points(data_points: usize) -> Self {
        if data_points > 100 {
            ConfidenceTier::High
        } else if data_points > 20 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub volatility: f64,
    pub method: PredictionMethod,
    pub confidence: ConfidenceTier,
    pub data_points: usize,
}

pub struct VolatilityPredictor {
    backend: Option<Arc<dyn InferenceBackend>>,
    sequence_length: usize,
    feature_count: usize,
}

impl VolatilityPredictor {
    pub fn new(
        backend: Option<Arc<dyn InferenceBackend>>,
        sequence_length: usize,
        feature_count: usize,
    ) -> Self {
        Self {
            backend,
            sequence_length,
            feature_count,
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Predict volatility from a feature sequence. Always returns a value in
    /// [MIN_PREDICTED, MAX_PREDICTED] (or the 0.15 constant on the fallback
    /// paths); never errors.
    pub fn predict(
        &self,
        features: &Array3<f32>,
        origin: FeatureOrigin,
        data_points: usize,
    ) -> Prediction {
        if features.dim() != (1, self.sequence_length, self.feature_count) {
            // Shape invariant violated upstream; answer safely instead of
            // handing a ragged tensor to the backend.
            return self.constant_fallback(PredictionMethod::ErrorFallback, data_points);
        }

        match (&self.backend, origin) {
            (Some(backend), _) => match backend.run(features) {
                Ok(raw) => {
                    let method = match origin {
                        FeatureOrigin::Live => PredictionMethod::LstmWithRealData,
                        // A prediction over generated input is flagged so
                        // consumers can discount it.
                        FeatureOrigin::Synthetic => PredictionMethod::Fallback,
                    };
                    Prediction {
                        volatility: raw.clamp(MIN_PREDICTED, MAX_PREDICTED),
                        method,
                        confidence: self.confidence_for(origin, data_points),
                        data_points,
                    }
                }
                Err(_) => self.constant_fallback(PredictionMethod::ErrorFallback, data_points),
            },
            (None, FeatureOrigin::Live) => Prediction {
                volatility: degraded_estimate(features, self.sequence_length)
                    .clamp(MIN_PREDICTED, MAX_PREDICTED),
                method: PredictionMethod::HistoricalCalculation,
                confidence: self.confidence_for(origin, data_points),
                data_points,
            },
            (None, FeatureOrigin::Synthetic) => {
                self.constant_fallback(PredictionMethod::Fallback, data_points)
            }
        }
    }

    fn confidence_for(&self, origin: FeatureOrigin, data_points: usize) -> ConfidenceTier {
        match origin {
            FeatureOrigin::Live => ConfidenceTier::from_data_points(data_points),
            FeatureOrigin::Synthetic => ConfidenceTier::Low,
        }
    }

    fn constant_fallback(&self, method: PredictionMethod, data_points: usize) -> Prediction {
        Prediction {
            volatility: FALLBACK_VOLATILITY,
            method,
            confidence: ConfidenceTier::Low,
            data_points,
        }
    }
}

/// Degraded estimate used when no backend is configured: mean of the
/// period-return and volatility feature columns.
fn degraded_estimate(features: &Array3<f32>, sequence_length: usize) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for i in 0..sequence_length {
        for col in [3, 4] {
            sum += features[[0, i, col]] as f64;
            count += 1;
        }
    }
    if count == 0 {
        return FALLBACK_VOLATILITY;
    }
    sum / count as f64
}
