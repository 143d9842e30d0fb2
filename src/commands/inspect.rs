use crate::commands::{load_pair, price_source, DATA_UNAVAILABLE_MESSAGE};
use crate::config::{RunSettings, SignalConfig};
use crate::data::{align_prices, AlignedPrices};
use crate::models::PriceSeries;
use anyhow::{anyhow, Result};
use log::{info, warn};
use std::path::Path;

/// Reports each series' span, their shared dates and how many rows survive warm-up.
pub fn run(data_dir: &Path, settings: &RunSettings, config: &SignalConfig) -> Result<()> {
    settings.validate()?;
    let source = price_source(data_dir, settings);
    let (first, second) = load_pair(&source, settings)?;
    let aligned = align_prices(&first, &second).map_err(|_| anyhow!(DATA_UNAVAILABLE_MESSAGE))?;

    for series in [&first, &second] {
        println!("{}", describe_series(series));
    }
    println!("{}", describe_overlap(&aligned, config));
    Ok(())
}

fn describe_series(series: &PriceSeries) -> String {
    match (series.first_date(), series.last_date()) {
        (Some(start), Some(end)) => format!(
            "{:<10} {} rows from {} to {}",
            series.symbol,
            series.len(),
            start,
            end
        ),
        _ => format!("{:<10} no rows", series.symbol),
    }
}

fn describe_overlap(aligned: &AlignedPrices, config: &SignalConfig) -> String {
    let warmup = config.warmup_rows();
    let usable = (aligned.len() + 1).saturating_sub(warmup);
    if usable == 0 {
        warn!(
            "{} shared rows cannot cover a warm-up of {}",
            aligned.len(),
            warmup
        );
    } else {
        info!("At most {} rows survive a warm-up of {}", usable, warmup);
    }

    let span = match (aligned.dates.first(), aligned.dates.last()) {
        (Some(start), Some(end)) => format!(" from {} to {}", start, end),
        _ => String::new(),
    };
    format!(
        "overlap    {} rows{}; warm-up {} rows; at most {} usable",
        aligned.len(),
        span,
        warmup,
        usable
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn overlap_counts_rows_left_after_warmup() {
        let start = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let first = PriceSeries::from_closes("AAA", start, &closes);
        let second = PriceSeries::from_closes("BBB", start, &closes[..12]);
        let aligned = align_prices(&first, &second).unwrap();
        let config = SignalConfig {
            window: 5,
            volatility_window: 3,
            ..SignalConfig::default()
        };
        let text = describe_overlap(&aligned, &config);
        assert!(text.contains("12 rows"));
        assert!(text.contains("at most 8 usable"));
        assert!(describe_series(&first).contains("20 rows"));
    }
}
