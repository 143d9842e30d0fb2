use crate::commands::{load_pair, price_source, DATA_UNAVAILABLE_MESSAGE};
use crate::config::{
    BaselineSignal, RunSettings, SignalConfig, SimulatorConfig, SubSignalKind, ThresholdMode,
};
use crate::error::SignalError;
use crate::models::SignalAction;
use crate::param_utils::parse_param_assignments;
use crate::pipeline::SignalPipeline;
use crate::portfolio::SignalPortfolio;
use crate::report::{format_stats, format_tail, signal_markers, write_report_json, write_table_csv};
use anyhow::{anyhow, Result};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_dir: PathBuf,
    pub settings: RunSettings,
    pub signal: SignalConfig,
    pub simulator: SimulatorConfig,
    pub output: Option<PathBuf>,
    pub stats_output: Option<PathBuf>,
}

/// Builds both configurations from `key=value` assignments plus the typed overrides.
pub fn build_configs(
    params: &[String],
    baseline: Option<&str>,
    threshold_mode: Option<&str>,
    vote: Option<&str>,
) -> Result<(SignalConfig, SimulatorConfig)> {
    let parameters = parse_param_assignments(params)?;
    let mut signal = SignalConfig::from_parameters(&parameters)?;
    if let Some(raw) = baseline {
        signal.baseline = BaselineSignal::parse(raw)?;
    }
    if let Some(raw) = threshold_mode {
        signal.threshold_mode = ThresholdMode::parse(raw)?;
    }
    if let Some(raw) = vote {
        signal.vote = raw
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(SubSignalKind::parse)
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok((signal, SimulatorConfig::from_parameters(&parameters)))
}

pub fn run(options: &RunOptions) -> Result<()> {
    let settings = &options.settings;
    settings.validate()?;
    info!(
        "Running ensemble for {} vs {} (window={}, ensembleParam={}, baseline={})",
        settings.first_symbol,
        settings.second_symbol,
        options.signal.window,
        options.signal.ensemble_param,
        options.signal.baseline.label()
    );

    let pipeline = SignalPipeline::new(options.signal.clone(), options.simulator.clone())?;
    let source = price_source(&options.data_dir, settings);
    let (first, second) = load_pair(&source, settings)?;

    let output = match pipeline.run(&first, &second) {
        Ok(output) => output,
        Err(SignalError::DataUnavailable { .. }) => return Err(anyhow!(DATA_UNAVAILABLE_MESSAGE)),
        Err(err) => return Err(err.into()),
    };
    info!(
        "{} of {} aligned rows retained after warm-up",
        output.table.len(),
        output.aligned_rows
    );
    match output.threshold.scalar() {
        Some(value) => info!("Volatility threshold: {:.6}", value),
        None => info!("Volatility threshold: point-in-time"),
    }

    println!("{}", format_tail(&output.table, settings.tail_rows));

    let markers = signal_markers(&output.table);
    let buys = markers
        .iter()
        .filter(|m| m.action == SignalAction::Buy)
        .count();
    info!(
        "{} buy markers and {} sell markers",
        buys,
        markers.len() - buys
    );

    let report = pipeline.backtest(&output, &SignalPortfolio)?;
    println!(
        "Backtest of {} ({} bars, freq {})",
        output.symbol1,
        output.simulation_input.len(),
        options.simulator.frequency_label()
    );
    println!("{}", format_stats(&report.stats));
    for trade in &report.trades {
        info!(
            "{} trade {} -> {}: {:.2}% ({})",
            trade.status.as_str(),
            trade.entry_date,
            trade
                .exit_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "open".to_string()),
            trade.return_pct,
            if trade.stop_loss_triggered { "stop" } else { "signal" }
        );
    }

    if let Some(path) = &options.output {
        write_table_csv(path, &output.table)?;
        info!("Wrote {} rows to {}", output.table.len(), path.display());
    }
    if let Some(path) = &options.stats_output {
        write_report_json(path, &report)?;
        info!("Wrote stats to {}", path.display());
    }
    Ok(())
}
