//! The end-to-end chain: align, normalize, measure, drop, vote, apply returns and
//! build the simulator input. Each stage consumes the previous stage's bundle.

use crate::backtest::{BacktestSimulator, SimulationInput, SimulationReport};
use crate::config::{SignalConfig, SimulatorConfig};
use crate::data::align_prices;
use crate::ensemble::{evaluate_ensemble, EnsembleFrame};
use crate::error::SignalResult;
use crate::frame::retain_complete_rows;
use crate::measures::{calculate_indicators, VolatilityThreshold};
use crate::models::{PriceSeries, SignalRow};
use crate::normalizer::normalize_returns;
use crate::returns::{calculate_strategy_returns, StrategyReturns};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub symbol1: String,
    pub symbol2: String,
    /// Shared dates before the warm-up drop.
    pub aligned_rows: usize,
    pub dropped_rows: usize,
    pub threshold: VolatilityThreshold,
    pub table: Vec<SignalRow>,
    pub simulation_input: SimulationInput,
}

impl PipelineOutput {
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.table.iter().map(|row| row.date).collect()
    }

    pub fn ensemble(&self) -> Vec<u8> {
        self.table.iter().map(|row| row.ensemble_signal).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalPipeline {
    pub config: SignalConfig,
    pub simulator: SimulatorConfig,
}

impl SignalPipeline {
    pub fn new(config: SignalConfig, simulator: SimulatorConfig) -> SignalResult<Self> {
        config.validate()?;
        simulator.validate()?;
        Ok(Self { config, simulator })
    }

    /// Runs every stage on the two close series. Pure: the same inputs always give
    /// the same output.
    pub fn run(&self, first: &PriceSeries, second: &PriceSeries) -> SignalResult<PipelineOutput> {
        let aligned = align_prices(first, second)?;
        let aligned_rows = aligned.len();
        debug!(
            "Aligned {} rows for {}/{}",
            aligned_rows, first.symbol, second.symbol
        );

        let normalized = normalize_returns(&aligned, &self.config)?;
        let indicators = calculate_indicators(normalized, &self.config);
        let retained = retain_complete_rows(&indicators, &self.config)?;
        let threshold = VolatilityThreshold::compute(&retained.volatility(), &self.config)?;
        if let Some(value) = threshold.scalar() {
            debug!(
                "Volatility threshold at quantile {}: {:.6}",
                self.config.quantile, value
            );
        }

        let frame = evaluate_ensemble(retained, threshold, &self.config)?;
        let returns = calculate_strategy_returns(&frame)?;
        let table = build_table(&frame, &returns);

        let dates: Vec<NaiveDate> = table.iter().map(|row| row.date).collect();
        let close: Vec<f64> = table.iter().map(|row| row.close1).collect();
        let simulation_input = SimulationInput::from_signals(
            &frame.retained.symbol1,
            &dates,
            &close,
            &dates,
            &frame.ensemble,
            self.simulator.clone(),
        )?;

        Ok(PipelineOutput {
            symbol1: frame.retained.symbol1.clone(),
            symbol2: frame.retained.symbol2.clone(),
            aligned_rows,
            dropped_rows: frame.retained.dropped,
            threshold: frame.threshold,
            table,
            simulation_input,
        })
    }

    /// Hands the pipeline's simulator input to `simulator`.
    pub fn backtest(
        &self,
        output: &PipelineOutput,
        simulator: &dyn BacktestSimulator,
    ) -> Result<SimulationReport> {
        simulator
            .simulate(&output.simulation_input)
            .with_context(|| format!("{} simulation failed", simulator.name()))
    }
}

fn build_table(frame: &EnsembleFrame, returns: &StrategyReturns) -> Vec<SignalRow> {
    frame
        .retained
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let signals = &frame.signals[i];
            SignalRow {
                date: row.date,
                close1: row.close1,
                close2: row.close2,
                return1: row.return1,
                return2: row.return2,
                net_return1: row.net_return1,
                net_return2: row.net_return2,
                exp_net1: row.exp_net1,
                exp_net2: row.exp_net2,
                momentum1: row.momentum1,
                momentum2: row.momentum2,
                volatility: row.volatility,
                volatility_threshold: frame.threshold.at(i),
                net_signal: signals.net,
                momentum_signal: signals.momentum,
                exp_signal: signals.exp,
                abs_signal: signals.abs,
                baseline_signal: signals.baseline,
                vol_filter: signals.vol_filter,
                vol_signal: signals.vol_signal,
                ensemble_signal: frame.ensemble[i],
                strategy_return: returns.strategy_returns[i],
                strategy_cumulative_pct: returns.strategy_cumulative_pct[i],
                buy_hold_cumulative_pct: returns.buy_hold_cumulative_pct[i],
            }
        })
        .collect()
}
