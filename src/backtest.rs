//! Contract between the signal pipeline and a pluggable backtest simulator.

use crate::config::SimulatorConfig;
use crate::error::{SignalError, SignalResult};
use crate::models::{PerformanceStats, Trade};
use crate::returns::{derive_entries_exits, reindex_backfill};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

/// Everything a simulator receives: the first asset's closes and boolean entry/exit
/// series on one index, plus cash, frequency and stop settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationInput {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub entries: Vec<bool>,
    pub exits: Vec<bool>,
    pub config: SimulatorConfig,
}

impl SimulationInput {
    /// Builds the simulator input from the ensemble signal observed on `signal_dates`,
    /// reindexed onto the working index `dates` with backward fill. Dates past the
    /// last signal get neither an entry nor an exit.
    pub fn from_signals(
        symbol: &str,
        dates: &[NaiveDate],
        close: &[f64],
        signal_dates: &[NaiveDate],
        ensemble: &[u8],
        config: SimulatorConfig,
    ) -> SignalResult<Self> {
        if dates.len() != close.len() {
            return Err(SignalError::length_mismatch(
                "simulation close",
                dates.len(),
                close.len(),
            ));
        }

        let (entries, exits) = derive_entries_exits(ensemble);
        let entries = reindex_backfill(signal_dates, &entries, dates)?
            .into_iter()
            .map(|v| v.unwrap_or(false))
            .collect();
        let exits = reindex_backfill(signal_dates, &exits, dates)?
            .into_iter()
            .map(|v| v.unwrap_or(false))
            .collect();

        let input = Self {
            symbol: symbol.to_string(),
            dates: dates.to_vec(),
            close: close.to_vec(),
            entries,
            exits,
            config,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn validate(&self) -> SignalResult<()> {
        let rows = self.dates.len();
        for (name, len) in [
            ("close", self.close.len()),
            ("entries", self.entries.len()),
            ("exits", self.exits.len()),
        ] {
            if len != rows {
                return Err(SignalError::length_mismatch(name, rows, len));
            }
        }
        if let Some(idx) = self
            .entries
            .iter()
            .zip(&self.exits)
            .position(|(entry, exit)| *entry && *exit)
        {
            return Err(SignalError::InvariantViolation(format!(
                "entry and exit both set on {}",
                self.dates[idx]
            )));
        }
        self.config.validate()
    }
}

/// Portfolio-level statistics plus the trade ledger and per-bar equity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub stats: PerformanceStats,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
}

/// Trade accounting engine consuming entry/exit signals.
pub trait BacktestSimulator {
    fn name(&self) -> &str;
    fn simulate(&self, input: &SimulationInput) -> Result<SimulationReport>;
}
