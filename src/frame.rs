use crate::config::SignalConfig;
use crate::error::{SignalError, SignalResult};
use crate::measures::IndicatorFrame;
use chrono::NaiveDate;
use log::debug;

/// Every measure the ensemble needs for one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketRow {
    pub date: NaiveDate,
    pub close1: f64,
    pub close2: f64,
    pub return1: f64,
    pub return2: f64,
    pub net_return1: f64,
    pub net_return2: f64,
    pub exp_net1: f64,
    pub exp_net2: f64,
    pub momentum1: f64,
    pub momentum2: f64,
    pub volatility: f64,
}

impl MarketRow {
    pub fn is_complete(&self) -> bool {
        [
            self.close1,
            self.close2,
            self.return1,
            self.return2,
            self.net_return1,
            self.net_return2,
            self.exp_net1,
            self.exp_net2,
            self.momentum1,
            self.momentum2,
            self.volatility,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Rows that survived the warm-up drop, in date order.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedFrame {
    pub symbol1: String,
    pub symbol2: String,
    pub rows: Vec<MarketRow>,
    pub dropped: usize,
}

impl RetainedFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn volatility(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.volatility).collect()
    }

    pub fn returns1(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.return1).collect()
    }
}

/// Drops every row where a used column is undefined (warm-up or zero dispersion).
pub fn retain_complete_rows(
    frame: &IndicatorFrame,
    config: &SignalConfig,
) -> SignalResult<RetainedFrame> {
    let normalized = &frame.normalized;
    let total = normalized.dates.len();
    let columns = [
        ("close1", normalized.first.closes.len()),
        ("close2", normalized.second.closes.len()),
        ("return1", normalized.first.returns.len()),
        ("return2", normalized.second.returns.len()),
        ("net_return1", normalized.first.rolling_norm.len()),
        ("net_return2", normalized.second.rolling_norm.len()),
        ("exp_net1", normalized.first.exp_norm.len()),
        ("exp_net2", normalized.second.exp_norm.len()),
        ("momentum1", frame.momentum1.len()),
        ("momentum2", frame.momentum2.len()),
        ("volatility", frame.volatility.len()),
    ];
    for (name, len) in columns {
        if len != total {
            return Err(SignalError::length_mismatch(name, total, len));
        }
    }

    let rows: Vec<MarketRow> = (0..total)
        .map(|i| MarketRow {
            date: normalized.dates[i],
            close1: normalized.first.closes[i],
            close2: normalized.second.closes[i],
            return1: normalized.first.returns[i],
            return2: normalized.second.returns[i],
            net_return1: normalized.first.rolling_norm[i],
            net_return2: normalized.second.rolling_norm[i],
            exp_net1: normalized.first.exp_norm[i],
            exp_net2: normalized.second.exp_norm[i],
            momentum1: frame.momentum1[i],
            momentum2: frame.momentum2[i],
            volatility: frame.volatility[i],
        })
        .filter(MarketRow::is_complete)
        .collect();

    if rows.is_empty() {
        return Err(SignalError::InsufficientHistory {
            rows: total,
            required: config.warmup_rows(),
        });
    }

    let dropped = total - rows.len();
    debug!("Retained {} of {} aligned rows ({} dropped)", rows.len(), total, dropped);

    Ok(RetainedFrame {
        symbol1: normalized.first.symbol.clone(),
        symbol2: normalized.second.symbol.clone(),
        rows,
        dropped,
    })
}
