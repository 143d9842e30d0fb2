//! Momentum and volatility measures plus the volatility regime threshold.

use crate::config::{SignalConfig, ThresholdMode};
use crate::error::{SignalError, SignalResult};
use crate::indicators::{
    calculate_expanding_quantile, calculate_quantile, calculate_rolling_mean,
    calculate_rolling_quantile, calculate_rolling_std,
};
use crate::normalizer::NormalizedReturns;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub normalized: NormalizedReturns,
    pub momentum1: Vec<f64>,
    pub momentum2: Vec<f64>,
    /// Trailing std of the first asset's returns; shared by both assets.
    pub volatility: Vec<f64>,
}

pub fn calculate_indicators(normalized: NormalizedReturns, config: &SignalConfig) -> IndicatorFrame {
    let (momentum1, momentum2) = rayon::join(
        || calculate_rolling_mean(&normalized.first.returns, config.window),
        || calculate_rolling_mean(&normalized.second.returns, config.window),
    );
    let volatility = calculate_rolling_std(&normalized.first.returns, config.volatility_window);

    IndicatorFrame {
        normalized,
        momentum1,
        momentum2,
        volatility,
    }
}

/// Upper bound for the low-volatility regime filter.
#[derive(Debug, Clone, PartialEq)]
pub enum VolatilityThreshold {
    /// One scalar over the whole retained sample. Early rows are compared against a
    /// value informed by later volatility.
    FullSample(f64),
    /// One value per retained row, computed only from rows up to that row.
    PointInTime(Vec<f64>),
}

impl VolatilityThreshold {
    pub fn compute(volatility: &[f64], config: &SignalConfig) -> SignalResult<Self> {
        match config.threshold_mode {
            ThresholdMode::FullSample => calculate_quantile(volatility, config.quantile)
                .map(VolatilityThreshold::FullSample)
                .ok_or_else(|| {
                    SignalError::InvariantViolation(
                        "volatility threshold requires at least one defined value".to_string(),
                    )
                }),
            ThresholdMode::Expanding => Ok(VolatilityThreshold::PointInTime(
                calculate_expanding_quantile(volatility, config.quantile),
            )),
            ThresholdMode::Rolling(window) => Ok(VolatilityThreshold::PointInTime(
                calculate_rolling_quantile(volatility, window, config.quantile),
            )),
        }
    }

    pub fn at(&self, index: usize) -> f64 {
        match self {
            VolatilityThreshold::FullSample(value) => *value,
            VolatilityThreshold::PointInTime(values) => {
                values.get(index).copied().unwrap_or(f64::NAN)
            }
        }
    }

    pub fn scalar(&self) -> Option<f64> {
        match self {
            VolatilityThreshold::FullSample(value) => Some(*value),
            VolatilityThreshold::PointInTime(_) => None,
        }
    }
}
