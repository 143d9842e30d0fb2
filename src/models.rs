use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closing prices for one symbol, sorted by date with unique dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Builds a series, sorting by date. When a date repeats the last point wins.
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        let mut by_date = BTreeMap::new();
        for point in points {
            by_date.insert(point.date, point);
        }
        Self {
            symbol: symbol.into(),
            points: by_date.into_values().collect(),
        }
    }

    /// Convenience constructor for consecutive calendar days starting at `start`.
    pub fn from_closes(symbol: impl Into<String>, start: NaiveDate, closes: &[f64]) -> Self {
        let points = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| PricePoint { date, close })
            .collect();
        Self::new(symbol, points)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Keeps only points within `[start, end]` (either bound optional).
    pub fn restrict(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let points = self
            .points
            .iter()
            .filter(|p| {
                start.map_or(true, |s| p.date >= s) && end.map_or(true, |e| p.date <= e)
            })
            .copied()
            .collect();
        Self {
            symbol: self.symbol.clone(),
            points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
}

/// A chartable point where the ensemble is long (buy) or flat (sell).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalMarker {
    pub date: NaiveDate,
    pub price: f64,
    pub action: SignalAction,
}

/// One retained timestamp of the output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
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
    pub volatility_threshold: f64,
    pub net_signal: u8,
    pub momentum_signal: u8,
    pub exp_signal: u8,
    pub abs_signal: u8,
    pub baseline_signal: u8,
    pub vol_filter: u8,
    pub vol_signal: u8,
    pub ensemble_signal: u8,
    pub strategy_return: f64,
    pub strategy_cumulative_pct: f64,
    pub buy_hold_cumulative_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Active,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Active => "active",
            TradeStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub quantity: f64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub status: TradeStatus,
    pub pnl: f64,
    pub return_pct: f64,
    pub bars_held: usize,
    pub stop_loss_triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub period_days: i64,
    pub start_value: f64,
    pub end_value: f64,
    pub total_return_pct: f64,
    pub benchmark_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub closed_trades: usize,
    pub open_trades: usize,
    pub open_trade_pnl: f64,
    pub win_rate_pct: f64,
    pub best_trade_pct: f64,
    pub worst_trade_pct: f64,
    pub avg_winning_trade_pct: f64,
    pub avg_losing_trade_pct: f64,
    pub avg_trade_bars: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub cagr: f64,
}

impl PerformanceStats {
    /// Named scalar metrics in display order.
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("Period [days]", self.period_days as f64),
            ("Start Value", self.start_value),
            ("End Value", self.end_value),
            ("Total Return [%]", self.total_return_pct),
            ("Benchmark Return [%]", self.benchmark_return_pct),
            ("Max Drawdown [%]", self.max_drawdown_pct),
            ("Total Trades", self.total_trades as f64),
            ("Total Closed Trades", self.closed_trades as f64),
            ("Total Open Trades", self.open_trades as f64),
            ("Open Trade PnL", self.open_trade_pnl),
            ("Win Rate [%]", self.win_rate_pct),
            ("Best Trade [%]", self.best_trade_pct),
            ("Worst Trade [%]", self.worst_trade_pct),
            ("Avg Winning Trade [%]", self.avg_winning_trade_pct),
            ("Avg Losing Trade [%]", self.avg_losing_trade_pct),
            ("Avg Trade Duration [bars]", self.avg_trade_bars),
            ("Profit Factor", self.profit_factor),
            ("Expectancy", self.expectancy),
            ("Sharpe Ratio", self.sharpe_ratio),
            ("Sortino Ratio", self.sortino_ratio),
            ("Calmar Ratio", self.calmar_ratio),
            ("CAGR", self.cagr),
        ]
    }
}
