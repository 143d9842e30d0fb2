//! Default simulator: one long/flat position sized with all available cash.

use crate::backtest::{BacktestSimulator, SimulationInput, SimulationReport};
use crate::models::*;
use anyhow::Result;
use chrono::NaiveDate;
use log::debug;
use statrs::statistics::Statistics;
use uuid::Uuid;

struct OpenPosition {
    id: String,
    quantity: f64,
    entry_price: f64,
    entry_date: NaiveDate,
    entry_index: usize,
}

impl OpenPosition {
    fn into_trade(
        self,
        symbol: &str,
        price: f64,
        date: NaiveDate,
        index: usize,
        status: TradeStatus,
        stop_loss_triggered: bool,
    ) -> Trade {
        let pnl = (price - self.entry_price) * self.quantity;
        let (exit_date, exit_price) = match status {
            TradeStatus::Closed => (Some(date), Some(price)),
            TradeStatus::Active => (None, None),
        };
        Trade {
            id: self.id,
            symbol: symbol.to_string(),
            quantity: self.quantity,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            exit_date,
            exit_price,
            status,
            pnl,
            return_pct: (price / self.entry_price - 1.0) * 100.0,
            bars_held: index - self.entry_index,
            stop_loss_triggered,
        }
    }
}

/// Fills at the bar's close with fractional units and no fees. An entry while flat
/// buys with all cash; an exit (or a stop hit) while long sells everything. A
/// position still open on the last bar is reported as an active trade marked to
/// the last close.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalPortfolio;

impl BacktestSimulator for SignalPortfolio {
    fn name(&self) -> &str {
        "signal_portfolio"
    }

    fn simulate(&self, input: &SimulationInput) -> Result<SimulationReport> {
        input.validate()?;
        let config = &input.config;

        let mut cash = config.initial_cash;
        let mut position: Option<OpenPosition> = None;
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve = Vec::with_capacity(input.len());

        for (i, (&date, &price)) in input.dates.iter().zip(&input.close).enumerate() {
            let mut closed_this_bar = false;

            if let Some(open) = position.take() {
                let stop_hit = config
                    .stop_loss
                    .map(|ratio| price <= open.entry_price * (1.0 - ratio))
                    .unwrap_or(false);
                if stop_hit || input.exits[i] {
                    cash += open.quantity * price;
                    trades.push(open.into_trade(
                        &input.symbol,
                        price,
                        date,
                        i,
                        TradeStatus::Closed,
                        stop_hit,
                    ));
                    closed_this_bar = true;
                } else {
                    position = Some(open);
                }
            }

            if position.is_none() && !closed_this_bar && input.entries[i] && price > 0.0 {
                position = Some(OpenPosition {
                    id: Uuid::new_v4().to_string(),
                    quantity: cash / price,
                    entry_price: price,
                    entry_date: date,
                    entry_index: i,
                });
                cash = 0.0;
            }

            let holdings = position.as_ref().map(|p| p.quantity * price).unwrap_or(0.0);
            equity_curve.push(cash + holdings);
        }

        if let (Some(open), Some(&last_date), Some(&last_price)) =
            (position.take(), input.dates.last(), input.close.last())
        {
            let last_index = input.len() - 1;
            trades.push(open.into_trade(
                &input.symbol,
                last_price,
                last_date,
                last_index,
                TradeStatus::Active,
                false,
            ));
        }

        debug!(
            "{} simulated {} bars with {} trades",
            self.name(),
            input.len(),
            trades.len()
        );

        let stats = PerformanceCalculator::calculate_performance(input, &trades, &equity_curve);
        Ok(SimulationReport {
            stats,
            trades,
            equity_curve,
        })
    }
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    pub fn calculate_performance(
        input: &SimulationInput,
        trades: &[Trade],
        equity_curve: &[f64],
    ) -> PerformanceStats {
        let config = &input.config;
        let start_value = config.initial_cash;
        let end_value = equity_curve.last().copied().unwrap_or(start_value);
        let total_return_pct = (end_value / start_value - 1.0) * 100.0;

        let benchmark_return_pct = match (input.close.first(), input.close.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => (last / first - 1.0) * 100.0,
            _ => 0.0,
        };

        let closed: Vec<&Trade> = trades
            .iter()
            .filter(|t| t.status == TradeStatus::Closed)
            .collect();
        let open_trade_pnl: f64 = trades
            .iter()
            .filter(|t| t.status == TradeStatus::Active)
            .map(|t| t.pnl)
            .sum();

        let closed_returns: Vec<f64> = closed.iter().map(|t| t.return_pct).collect();
        let winning: Vec<f64> = closed_returns.iter().copied().filter(|r| *r > 0.0).collect();
        let losing: Vec<f64> = closed_returns.iter().copied().filter(|r| *r < 0.0).collect();
        let win_rate_pct = if closed.is_empty() {
            0.0
        } else {
            winning.len() as f64 / closed.len() as f64 * 100.0
        };

        let gross_profit: f64 = closed.iter().map(|t| t.pnl).filter(|p| *p > 0.0).sum();
        let gross_loss: f64 = closed.iter().map(|t| t.pnl).filter(|p| *p < 0.0).sum();
        let profit_factor = if gross_loss < 0.0 {
            gross_profit / gross_loss.abs()
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let pnls: Vec<f64> = closed.iter().map(|t| t.pnl).collect();
        let bars: Vec<f64> = closed.iter().map(|t| t.bars_held as f64).collect();

        let period_days = input.len() as i64 * config.frequency_days;
        let max_drawdown_pct = Self::calculate_max_drawdown_pct(equity_curve);
        let periods_per_year = config.periods_per_year();
        let cagr = Self::calculate_cagr(
            start_value,
            end_value,
            period_days as f64 / config.annualization_days,
        );

        let returns = Self::bar_returns(equity_curve);
        let rf_per_bar = config.risk_free_rate / periods_per_year;

        PerformanceStats {
            start: input.dates.first().copied(),
            end: input.dates.last().copied(),
            period_days,
            start_value,
            end_value,
            total_return_pct,
            benchmark_return_pct,
            max_drawdown_pct,
            total_trades: trades.len(),
            closed_trades: closed.len(),
            open_trades: trades.len() - closed.len(),
            open_trade_pnl,
            win_rate_pct,
            best_trade_pct: Self::extreme(&closed_returns, f64::max),
            worst_trade_pct: Self::extreme(&closed_returns, f64::min),
            avg_winning_trade_pct: Self::average(&winning),
            avg_losing_trade_pct: Self::average(&losing),
            avg_trade_bars: Self::average(&bars),
            profit_factor,
            expectancy: Self::average(&pnls),
            sharpe_ratio: Self::calculate_sharpe_ratio(&returns, rf_per_bar, periods_per_year),
            sortino_ratio: Self::calculate_sortino_ratio(&returns, rf_per_bar, periods_per_year),
            calmar_ratio: Self::calculate_calmar_ratio(cagr, max_drawdown_pct),
            cagr,
        }
    }

    fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .map(|window| {
                if window[0] > 0.0 {
                    window[1] / window[0] - 1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn average(values: &[f64]) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;

        for value in values.iter().copied() {
            if value.is_finite() {
                sum += value;
                count += 1;
            }
        }

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    fn extreme(values: &[f64], pick: fn(f64, f64) -> f64) -> f64 {
        values.iter().copied().reduce(pick).unwrap_or(0.0)
    }

    fn calculate_cagr(start_value: f64, end_value: f64, years: f64) -> f64 {
        if start_value <= 0.0 || !end_value.is_finite() || years <= 0.0 {
            return 0.0;
        }

        let total_return_ratio = end_value / start_value;
        if total_return_ratio <= 0.0 {
            return -1.0;
        }

        total_return_ratio.powf(1.0 / years) - 1.0
    }

    pub fn calculate_sharpe_ratio(returns: &[f64], rf_per_bar: f64, periods_per_year: f64) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let mean_return = returns.iter().mean();
        let std_dev = returns.iter().std_dev();
        if !std_dev.is_finite() || std_dev == 0.0 {
            return 0.0;
        }

        (mean_return - rf_per_bar) / std_dev * periods_per_year.sqrt()
    }

    pub fn calculate_sortino_ratio(returns: &[f64], rf_per_bar: f64, periods_per_year: f64) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let mean_excess = returns.iter().mean() - rf_per_bar;
        let downside = (returns
            .iter()
            .map(|r| (r - rf_per_bar).min(0.0).powi(2))
            .sum::<f64>()
            / returns.len() as f64)
            .sqrt();
        if downside == 0.0 {
            return 0.0;
        }

        mean_excess / downside * periods_per_year.sqrt()
    }

    fn calculate_calmar_ratio(cagr: f64, max_drawdown_pct: f64) -> f64 {
        if !cagr.is_finite() || !max_drawdown_pct.is_finite() {
            return 0.0;
        }

        let drawdown_ratio = (max_drawdown_pct / 100.0).abs();
        if drawdown_ratio <= f64::EPSILON {
            return 0.0;
        }

        cagr / drawdown_ratio
    }

    fn calculate_max_drawdown_pct(equity_curve: &[f64]) -> f64 {
        let Some(&first) = equity_curve.first() else {
            return 0.0;
        };

        let mut peak_value = first;
        let mut max_drawdown_pct = 0.0f64;
        for &value in equity_curve {
            if value > peak_value {
                peak_value = value;
            } else if peak_value > 0.0 {
                max_drawdown_pct = max_drawdown_pct.max((peak_value - value) / peak_value * 100.0);
            }
        }
        max_drawdown_pct
    }
}
