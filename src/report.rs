//! Presentation of a pipeline run: text tables, CSV/JSON exports and chart markers.

use crate::backtest::SimulationReport;
use crate::models::{PerformanceStats, SignalAction, SignalMarker, SignalRow};
use anyhow::{Context, Result};
use csv::Writer;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const TAIL_COLUMNS: [&str; 10] = [
    "date",
    "close1",
    "close2",
    "net_sig",
    "mom_sig",
    "exp_sig",
    "abs_sig",
    "vol_sig",
    "ensemble",
    "strat_cum%",
];

/// Renders the last `count` rows as a fixed-width text table.
pub fn format_tail(rows: &[SignalRow], count: usize) -> String {
    let mut out = String::new();
    let header: Vec<String> = TAIL_COLUMNS.iter().map(|c| format!("{:>12}", c)).collect();
    let _ = writeln!(out, "{}", header.join(""));

    let start = rows.len().saturating_sub(count);
    for row in &rows[start..] {
        let _ = writeln!(
            out,
            "{:>12}{:>12.4}{:>12.4}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12.2}",
            row.date.format("%Y-%m-%d").to_string(),
            row.close1,
            row.close2,
            row.net_signal,
            row.momentum_signal,
            row.exp_signal,
            row.abs_signal,
            row.vol_signal,
            row.ensemble_signal,
            row.strategy_cumulative_pct,
        );
    }
    out
}

pub fn format_stats(stats: &PerformanceStats) -> String {
    let mut out = String::new();
    if let (Some(start), Some(end)) = (stats.start, stats.end) {
        let _ = writeln!(out, "{:<28}{}", "Start", start);
        let _ = writeln!(out, "{:<28}{}", "End", end);
    }
    for (name, value) in stats.metrics() {
        let _ = writeln!(out, "{:<28}{:.4}", name, value);
    }
    out
}

/// Buy markers where the ensemble is long and sell markers where it is flat,
/// priced at the first asset's close.
pub fn signal_markers(rows: &[SignalRow]) -> Vec<SignalMarker> {
    rows.iter()
        .map(|row| SignalMarker {
            date: row.date,
            price: row.close1,
            action: if row.ensemble_signal == 1 {
                SignalAction::Buy
            } else {
                SignalAction::Sell
            },
        })
        .collect()
}

pub fn write_table_csv(path: &Path, rows: &[SignalRow]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    let mut writer = Writer::from_writer(file);
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row for {}", row.date))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the stats and trade ledger as pretty JSON.
pub fn write_report_json(path: &Path, report: &SimulationReport) -> Result<()> {
    let json = serde_json::json!({
        "stats": report.stats,
        "trades": report.trades,
    });
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create stats file: {}", path.display()))?;
    let body = serde_json::to_string_pretty(&json).context("Failed to serialize stats")?;
    file.write_all(body.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, ensemble: u8) -> SignalRow {
        SignalRow {
            date: NaiveDate::from_ymd_opt(2022, 4, day).unwrap(),
            close1: 100.0 + day as f64,
            close2: 90.0,
            return1: 0.01,
            return2: 0.0,
            net_return1: 0.5,
            net_return2: 0.1,
            exp_net1: 0.4,
            exp_net2: 0.2,
            momentum1: 0.01,
            momentum2: 0.0,
            volatility: 0.02,
            volatility_threshold: 0.03,
            net_signal: 1,
            momentum_signal: 1,
            exp_signal: 1,
            abs_signal: 1,
            baseline_signal: 1,
            vol_filter: 1,
            vol_signal: 1,
            ensemble_signal: ensemble,
            strategy_return: 0.0,
            strategy_cumulative_pct: 1.5,
            buy_hold_cumulative_pct: 2.0,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pair-ensemble-{}-{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn tail_shows_only_the_last_rows() {
        let rows: Vec<SignalRow> = (1..=5).map(|d| row(d, 1)).collect();
        let text = format_tail(&rows, 2);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("2022-04-05"));
        assert!(!text.contains("2022-04-03"));
    }

    #[test]
    fn markers_follow_the_ensemble() {
        let markers = signal_markers(&[row(1, 1), row(2, 0)]);
        assert_eq!(markers[0].action, SignalAction::Buy);
        assert_eq!(markers[1].action, SignalAction::Sell);
        assert_eq!(markers[1].price, 102.0);
    }

    #[test]
    fn csv_export_has_a_header_and_one_line_per_row() {
        let path = temp_path("table.csv");
        write_table_csv(&path, &[row(1, 1), row(2, 0)]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("date,close1,close2"));
        assert!(header.contains("ensemble_signal"));
        assert_eq!(lines.count(), 2);
    }
}
