//! Execution lag, realized strategy returns and the entry/exit series handed to
//! the simulator.

use crate::ensemble::EnsembleFrame;
use crate::error::{SignalError, SignalResult};
use crate::indicators::calculate_cumulative_return_pct;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyReturns {
    pub strategy_returns: Vec<f64>,
    pub strategy_cumulative_pct: Vec<f64>,
    pub buy_hold_cumulative_pct: Vec<f64>,
}

/// `returns[t] * signal[t - 1]`; the first bar has no prior signal and returns 0.
pub fn apply_execution_lag(returns: &[f64], signal: &[u8]) -> SignalResult<Vec<f64>> {
    if returns.len() != signal.len() {
        return Err(SignalError::length_mismatch(
            "execution lag",
            returns.len(),
            signal.len(),
        ));
    }

    let mut lagged = Vec::with_capacity(returns.len());
    for (i, &ret) in returns.iter().enumerate() {
        if i == 0 {
            lagged.push(0.0);
        } else {
            lagged.push(ret * f64::from(signal[i - 1]));
        }
    }
    Ok(lagged)
}

pub fn calculate_strategy_returns(frame: &EnsembleFrame) -> SignalResult<StrategyReturns> {
    let returns1 = frame.retained.returns1();
    let strategy_returns = apply_execution_lag(&returns1, &frame.ensemble)?;
    let strategy_cumulative_pct = calculate_cumulative_return_pct(&strategy_returns);
    let buy_hold_cumulative_pct = calculate_cumulative_return_pct(&returns1);

    Ok(StrategyReturns {
        strategy_returns,
        strategy_cumulative_pct,
        buy_hold_cumulative_pct,
    })
}

/// Entries where the ensemble is 1 and exits where it is 0, on the same index.
pub fn derive_entries_exits(ensemble: &[u8]) -> (Vec<bool>, Vec<bool>) {
    let entries = ensemble.iter().map(|v| *v == 1).collect();
    let exits = ensemble.iter().map(|v| *v == 0).collect();
    (entries, exits)
}

/// Reindexes `values` (keyed by sorted `source_dates`) onto sorted `target_dates`,
/// filling each target date with the value at the same or the next later source
/// date. Targets after the last source date stay `None`.
pub fn reindex_backfill<T: Copy>(
    source_dates: &[NaiveDate],
    values: &[T],
    target_dates: &[NaiveDate],
) -> SignalResult<Vec<Option<T>>> {
    if source_dates.len() != values.len() {
        return Err(SignalError::length_mismatch(
            "backfill reindex",
            source_dates.len(),
            values.len(),
        ));
    }

    let mut filled = Vec::with_capacity(target_dates.len());
    let mut cursor = 0usize;
    for target in target_dates {
        while cursor < source_dates.len() && source_dates[cursor] < *target {
            cursor += 1;
        }
        filled.push(values.get(cursor).copied());
    }
    Ok(filled)
}
