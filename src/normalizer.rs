//! Return normalization: percent returns plus rolling and exponentially weighted
//! mean/std ratios per asset.

use crate::config::SignalConfig;
use crate::data::{AlignedPrices, AssetCloses};
use crate::error::{SignalError, SignalResult};
use crate::indicators::{
    calculate_ewm_mean_std, calculate_pct_change, calculate_rolling_mean, calculate_rolling_std,
};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct AssetReturns {
    pub symbol: String,
    pub closes: Vec<f64>,
    pub returns: Vec<f64>,
    /// Rolling mean / rolling std over `window`; NaN during warm-up or when std is zero.
    pub rolling_norm: Vec<f64>,
    /// EWM mean / EWM std over `exp_span`; NaN on the first bar or when std is zero.
    pub exp_norm: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReturns {
    pub dates: Vec<NaiveDate>,
    pub first: AssetReturns,
    pub second: AssetReturns,
}

pub fn normalize_asset(asset: &AssetCloses, window: usize, exp_span: f64) -> AssetReturns {
    let returns = calculate_pct_change(&asset.closes);

    let rolling_mean = calculate_rolling_mean(&returns, window);
    let rolling_std = calculate_rolling_std(&returns, window);
    let rolling_norm = ratio(&rolling_mean, &rolling_std);

    let (exp_mean, exp_std) = calculate_ewm_mean_std(&returns, exp_span);
    let exp_norm = ratio(&exp_mean, &exp_std);

    AssetReturns {
        symbol: asset.symbol.clone(),
        closes: asset.closes.clone(),
        returns,
        rolling_norm,
        exp_norm,
    }
}

/// Normalizes both assets. The two assets are independent, so they are computed
/// in parallel; the result is identical to a sequential run.
pub fn normalize_returns(
    prices: &AlignedPrices,
    config: &SignalConfig,
) -> SignalResult<NormalizedReturns> {
    let rows = prices.dates.len();
    for asset in [&prices.first, &prices.second] {
        if asset.closes.len() != rows {
            return Err(SignalError::length_mismatch(
                "return normalizer",
                rows,
                asset.closes.len(),
            ));
        }
    }

    let (first, second) = rayon::join(
        || normalize_asset(&prices.first, config.window, config.exp_span),
        || normalize_asset(&prices.second, config.window, config.exp_span),
    );

    Ok(NormalizedReturns {
        dates: prices.dates.clone(),
        first,
        second,
    })
}

fn ratio(numerators: &[f64], denominators: &[f64]) -> Vec<f64> {
    numerators
        .iter()
        .zip(denominators)
        .map(|(&mean, &std)| {
            if mean.is_finite() && std.is_finite() && std != 0.0 {
                mean / std
            } else {
                f64::NAN
            }
        })
        .collect()
}
