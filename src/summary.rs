//! Aggregated prediction reports handed to the API layer.

use serde::Serialize;

use crate::inference::{ConfidenceTier, PredictionMethod};

/// Fixed volatility bands for the headline risk label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskTier {
    pub fn from_volatility(volatility: f64) -> Self {
        if volatility < 0.10 {
            RiskTier::Low
        } else if volatility < 0.25 {
            RiskTier::Medium
        } else if volatility < 0.5 {
            RiskTier::High
        } else {
            RiskTier::Extreme
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Extreme => "EXTREME",
        }
    }
}

/// One-shot composition of every figure the pipeline produces for a symbol.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionSummary {
    pub symbol: String,
    pub current_price: Option<f64>,
    /// Model-predicted (or degraded-estimate) volatility.
    pub model_volatility: f64,
    /// Statistical volatility over the trailing window, for comparison.
    pub historical_volatility: f64,
    pub lambda: f64,
    pub lambda_milli: u32,
    pub confidence: ConfidenceTier,
    pub method: PredictionMethod,
    pub data_points: usize,
    pub risk_tier: RiskTier,
    /// RFC3339 generation timestamp.
    pub generated_at: String,
}

/// Lightweight answer for the volatility-only accessor.
#[derive(Debug, Clone, Serialize)]
pub struct VolatilitySnapshot {
    pub volatility: f64,
    pub lambda: f64,
    pub lambda_milli: u32,
}
