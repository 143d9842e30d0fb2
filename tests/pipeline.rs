use chrono::NaiveDate;
use pair_ensemble::commands::run::{self, RunOptions};
use pair_ensemble::config::{
    RunSettings, SignalConfig, SimulatorConfig, SubSignalKind, ThresholdMode,
};
use pair_ensemble::error::SignalError;
use pair_ensemble::indicators::calculate_cumulative_return_pct;
use pair_ensemble::models::{PriceSeries, SignalRow};
use pair_ensemble::pipeline::{PipelineOutput, SignalPipeline};
use pair_ensemble::portfolio::SignalPortfolio;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::sync::Once;

const TOLERANCE: f64 = 1e-9;

fn ensure_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 5).unwrap()
}

fn from_returns(symbol: &str, returns: impl Iterator<Item = f64>) -> PriceSeries {
    let mut close = 100.0;
    let mut closes = vec![close];
    for r in returns {
        close *= 1.0 + r;
        closes.push(close);
    }
    PriceSeries::from_closes(symbol, start_date(), &closes)
}

/// Steady climb with alternating step sizes so dispersion never vanishes.
fn ramp(symbol: &str, len: usize) -> PriceSeries {
    from_returns(
        symbol,
        (1..len).map(|i| 0.01 + if i % 2 == 0 { 0.002 } else { -0.002 }),
    )
}

/// Oscillates by a hair around a constant level.
fn near_flat(symbol: &str, len: usize) -> PriceSeries {
    from_returns(
        symbol,
        (1..len).map(|i| if i % 2 == 0 { 0.0001 } else { -0.0001 }),
    )
}

fn wavy(symbol: &str, len: usize, phase: f64) -> PriceSeries {
    let closes: Vec<f64> = (0..len)
        .map(|i| 100.0 + ((i as f64 + phase) * 0.45).sin() * 4.0 + (i as f64 * 0.13).cos())
        .collect();
    PriceSeries::from_closes(symbol, start_date(), &closes)
}

fn run_default(first: &PriceSeries, second: &PriceSeries) -> PipelineOutput {
    SignalPipeline::default().run(first, second).unwrap()
}

fn votes(row: &SignalRow, members: &[SubSignalKind]) -> usize {
    members
        .iter()
        .map(|kind| match kind {
            SubSignalKind::Net => row.net_signal,
            SubSignalKind::Momentum => row.momentum_signal,
            SubSignalKind::Exp => row.exp_signal,
            SubSignalKind::Abs => row.abs_signal,
            SubSignalKind::Baseline => row.baseline_signal,
            SubSignalKind::VolFilter => row.vol_filter,
            SubSignalKind::VolSignal => row.vol_signal,
        })
        .filter(|v| *v == 1)
        .count()
}

#[test]
fn ensemble_is_binary_and_matches_the_vote() {
    ensure_test_env();
    let output = run_default(&wavy("AAA", 200, 0.0), &wavy("BBB", 200, 2.5));
    let config = SignalConfig::default();
    assert!(!output.table.is_empty());
    for row in &output.table {
        assert!(row.ensemble_signal <= 1);
        let expected = u8::from(votes(row, &config.vote) >= config.ensemble_param);
        assert_eq!(row.ensemble_signal, expected, "vote mismatch on {}", row.date);
    }
}

#[test]
fn strategy_returns_lag_the_signal_by_one_bar() {
    ensure_test_env();
    let output = run_default(&wavy("AAA", 180, 0.0), &wavy("BBB", 180, 1.0));
    let table = &output.table;
    assert_eq!(table[0].strategy_return, 0.0);
    for t in 1..table.len() {
        let expected = table[t].return1 * f64::from(table[t - 1].ensemble_signal);
        assert!((table[t].strategy_return - expected).abs() < TOLERANCE);
    }

    let strategy: Vec<f64> = table.iter().map(|r| r.strategy_return).collect();
    let buy_hold: Vec<f64> = table.iter().map(|r| r.return1).collect();
    let strategy_cum = calculate_cumulative_return_pct(&strategy);
    let buy_hold_cum = calculate_cumulative_return_pct(&buy_hold);
    for (i, row) in table.iter().enumerate() {
        assert!((row.strategy_cumulative_pct - strategy_cum[i]).abs() < TOLERANCE);
        assert!((row.buy_hold_cumulative_pct - buy_hold_cum[i]).abs() < TOLERANCE);
    }
}

#[test]
fn running_twice_gives_identical_output() {
    ensure_test_env();
    let first = wavy("AAA", 150, 0.3);
    let second = wavy("BBB", 150, 1.7);
    let pipeline = SignalPipeline::default();
    assert_eq!(
        pipeline.run(&first, &second).unwrap(),
        pipeline.run(&first, &second).unwrap()
    );
}

#[test]
fn rising_asset_against_a_flat_one_is_long_after_warmup() {
    ensure_test_env();
    let output = run_default(&ramp("UP", 140), &near_flat("FLAT", 140));
    assert!(!output.table.is_empty());
    for row in &output.table {
        assert_eq!(row.net_signal, 1, "net on {}", row.date);
        assert_eq!(row.momentum_signal, 1, "momentum on {}", row.date);
        assert_eq!(row.exp_signal, 1, "exp on {}", row.date);
        assert_eq!(row.ensemble_signal, 1, "ensemble on {}", row.date);
    }
    assert!(output.simulation_input.entries.iter().all(|e| *e));
    assert!(output.simulation_input.exits.iter().all(|e| !*e));
}

#[test]
fn identical_series_never_favor_the_first_asset() {
    ensure_test_env();
    let output = run_default(&wavy("AAA", 160, 0.0), &wavy("BBB", 160, 0.0));
    for row in &output.table {
        assert_eq!(row.net_signal, 0);
        assert_eq!(row.momentum_signal, 0);
        assert_eq!(row.exp_signal, 0);
        assert_eq!(row.abs_signal, 0);
    }
}

#[test]
fn short_window_excludes_only_the_warmup_rows() {
    ensure_test_env();
    let config = SignalConfig {
        window: 5,
        volatility_window: 5,
        exp_span: 5.0,
        ..SignalConfig::default()
    };
    let pipeline = SignalPipeline::new(config, SimulatorConfig::default()).unwrap();
    let first = wavy("AAA", 20, 0.0);
    let output = pipeline.run(&first, &wavy("BBB", 20, 2.0)).unwrap();
    assert_eq!(output.aligned_rows, 20);
    assert_eq!(output.dropped_rows, 4);
    assert_eq!(output.table.len(), 16);
    assert_eq!(output.table[0].date, first.points()[4].date);
}

#[test]
fn history_shorter_than_the_window_is_rejected() {
    ensure_test_env();
    let result = SignalPipeline::default().run(&wavy("AAA", 30, 0.0), &wavy("BBB", 30, 1.0));
    assert_eq!(
        result,
        Err(SignalError::InsufficientHistory {
            rows: 30,
            required: 55
        })
    );
}

#[test]
fn disjoint_dates_are_unavailable_data() {
    ensure_test_env();
    let first = wavy("AAA", 10, 0.0);
    let late = PriceSeries::from_closes(
        "BBB",
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        &[1.0, 2.0, 3.0],
    );
    assert!(matches!(
        SignalPipeline::default().run(&first, &late),
        Err(SignalError::DataUnavailable { .. })
    ));
}

#[test]
fn expanding_threshold_only_sees_past_volatility() {
    ensure_test_env();
    let config = SignalConfig {
        threshold_mode: ThresholdMode::Expanding,
        ..SignalConfig::default()
    };
    let pipeline = SignalPipeline::new(config, SimulatorConfig::default()).unwrap();
    let output = pipeline
        .run(&wavy("AAA", 150, 0.0), &wavy("BBB", 150, 3.0))
        .unwrap();
    let first = &output.table[0];
    assert!((first.volatility_threshold - first.volatility).abs() < TOLERANCE);
    // a row can never sit strictly below a threshold derived from itself alone
    assert_eq!(first.vol_filter, 0);
    assert!(output.threshold.scalar().is_none());
}

#[test]
fn default_simulator_accounts_for_the_ensemble() {
    ensure_test_env();
    let pipeline = SignalPipeline::default();
    let output = pipeline
        .run(&ramp("UP", 140), &near_flat("FLAT", 140))
        .unwrap();
    let report = pipeline.backtest(&output, &SignalPortfolio).unwrap();

    // long from the first retained bar to the end
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.stats.open_trades, 1);
    let expected = output.table.last().unwrap().close1 / output.table[0].close1;
    assert!((report.stats.end_value / report.stats.start_value - expected).abs() < TOLERANCE);
    assert!((report.stats.total_return_pct - report.stats.benchmark_return_pct).abs() < 1e-6);
}

fn write_price_csv(dir: &Path, series: &PriceSeries) {
    let mut body = String::from("Date,Open,High,Low,Close,Volume\n");
    for point in series.points() {
        let _ = writeln!(
            body,
            "{},{},{},{},{},1000",
            point.date, point.close, point.close, point.close, point.close
        );
    }
    fs::write(dir.join(format!("{}.csv", series.symbol)), body).unwrap();
}

#[test]
fn run_command_writes_table_and_stats() {
    ensure_test_env();
    let dir = std::env::temp_dir().join(format!("pair-ensemble-run-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    write_price_csv(&dir, &wavy("AAA", 120, 0.0));
    write_price_csv(&dir, &wavy("BBB", 120, 1.2));

    let table_path = dir.join("table.csv");
    let stats_path = dir.join("stats.json");
    let options = RunOptions {
        data_dir: dir.clone(),
        settings: RunSettings {
            first_symbol: "AAA".to_string(),
            second_symbol: "BBB".to_string(),
            start_date: None,
            ..RunSettings::default()
        },
        signal: SignalConfig::default(),
        simulator: SimulatorConfig::default(),
        output: Some(table_path.clone()),
        stats_output: Some(stats_path.clone()),
    };
    run::run(&options).unwrap();

    let table = fs::read_to_string(&table_path).unwrap();
    // header plus 120 - 55 + 1 retained rows
    assert_eq!(table.lines().count(), 67);
    let stats: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&stats_path).unwrap()).unwrap();
    assert!(stats["stats"]["endValue"].is_number());
    assert!(stats["trades"].is_array());

    fs::remove_dir_all(&dir).ok();
}
