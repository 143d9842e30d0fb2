use crate::error::{SignalError, SignalResult};
use crate::models::{PricePoint, PriceSeries};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// External market data provider returning a daily closing-price series per symbol.
pub trait PriceSource {
    fn fetch(&self, symbol: &str) -> Result<PriceSeries>;
}

/// Normalizes a ticker string by trimming whitespace and uppercasing.
pub fn normalize_symbol(value: &str) -> Option<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Reads `<dir>/<SYMBOL>.csv` files with a date column and a close column.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol))
    }

    pub fn read_file(symbol: &str, path: &Path) -> Result<PriceSeries> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open price file {}", path.display()))?;
        let headers = reader
            .headers()
            .with_context(|| format!("failed to read header of {}", path.display()))?
            .clone();

        let date_idx = find_column(&headers, &["date", "datetime", "timestamp", "time"])
            .ok_or_else(|| anyhow!("{} has no date column", path.display()))?;
        let close_idx = find_column(&headers, &["close"])
            .or_else(|| find_column(&headers, &["adj close", "adj_close", "adjclose"]))
            .ok_or_else(|| anyhow!("{} has no close column", path.display()))?;

        let mut points = Vec::new();
        let mut skipped = 0usize;
        for (line, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("malformed row {} in {}", line + 2, path.display()))?;
            let raw_date = record.get(date_idx).unwrap_or("").trim();
            let date = parse_date(raw_date).with_context(|| {
                format!("invalid date '{}' on row {} of {}", raw_date, line + 2, path.display())
            })?;
            let close = record
                .get(close_idx)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite() && *value > 0.0);
            match close {
                Some(close) => points.push(PricePoint { date, close }),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(
                "Skipped {} rows without a usable close price in {}",
                skipped,
                path.display()
            );
        }
        debug!("Loaded {} closes for {} from {}", points.len(), symbol, path.display());

        Ok(PriceSeries::new(symbol, points))
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch(&self, symbol: &str) -> Result<PriceSeries> {
        let path = self.path_for(symbol);
        if !path.exists() {
            debug!("No price file for {} at {}", symbol, path.display());
            return Err(SignalError::DataUnavailable {
                symbol: symbol.to_string(),
            }
            .into());
        }
        Self::read_file(symbol, &path)
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| names.contains(&header.trim().to_ascii_lowercase().as_str()))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.date_naive());
    }
    // "2020-01-02 00:00:00+00:00" style exports
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| anyhow!("unrecognized date format"))
}

/// Closing prices of one asset on the shared index.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetCloses {
    pub symbol: String,
    pub closes: Vec<f64>,
}

/// Two price series restricted to the dates both of them carry.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPrices {
    pub dates: Vec<NaiveDate>,
    pub first: AssetCloses,
    pub second: AssetCloses,
}

impl AlignedPrices {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Inner-joins two series on their dates.
pub fn align_prices(first: &PriceSeries, second: &PriceSeries) -> SignalResult<AlignedPrices> {
    for series in [first, second] {
        if series.is_empty() {
            return Err(SignalError::DataUnavailable {
                symbol: series.symbol.clone(),
            });
        }
        // returns are undefined across a zero or negative close
        if let Some(point) = series
            .points()
            .iter()
            .find(|p| !p.close.is_finite() || p.close <= 0.0)
        {
            return Err(SignalError::InvariantViolation(format!(
                "{} has a non-positive close {} on {}",
                series.symbol, point.close, point.date
            )));
        }
    }

    let (a, b) = (first.points(), second.points());
    let mut dates = Vec::with_capacity(a.len().min(b.len()));
    let mut closes1 = Vec::with_capacity(dates.capacity());
    let mut closes2 = Vec::with_capacity(dates.capacity());
    let (mut i, mut j) = (0usize, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].date.cmp(&b[j].date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dates.push(a[i].date);
                closes1.push(a[i].close);
                closes2.push(b[j].close);
                i += 1;
                j += 1;
            }
        }
    }

    if dates.is_empty() {
        return Err(SignalError::DataUnavailable {
            symbol: format!("{}/{}", first.symbol, second.symbol),
        });
    }

    let dropped1 = a.len() - dates.len();
    let dropped2 = b.len() - dates.len();
    if dropped1 > 0 || dropped2 > 0 {
        warn!(
            "Aligned {} shared dates; dropped {} {} rows and {} {} rows without a counterpart",
            dates.len(),
            dropped1,
            first.symbol,
            dropped2,
            second.symbol
        );
    }

    Ok(AlignedPrices {
        dates,
        first: AssetCloses {
            symbol: first.symbol.clone(),
            closes: closes1,
        },
        second: AssetCloses {
            symbol: second.symbol.clone(),
            closes: closes2,
        },
    })
}
