pub mod inspect;
pub mod run;

use crate::cache::CachedPriceSource;
use crate::config::RunSettings;
use crate::data::{CsvPriceSource, PriceSource};
use crate::error::SignalError;
use crate::models::PriceSeries;
use anyhow::{anyhow, Result};
use log::{info, warn};
use std::path::Path;

pub const DATA_UNAVAILABLE_MESSAGE: &str = "Could not fetch data for one or both symbols.";

/// CSV files under `data_dir`, cached for the configured TTL.
pub fn price_source(data_dir: &Path, settings: &RunSettings) -> CachedPriceSource<CsvPriceSource> {
    CachedPriceSource::new(CsvPriceSource::new(data_dir), settings.cache_ttl)
}

/// Fetches both symbols restricted to the configured date range. Any failure or an
/// empty range is reported as missing data.
pub fn load_pair<S: PriceSource>(
    source: &S,
    settings: &RunSettings,
) -> Result<(PriceSeries, PriceSeries)> {
    let first = fetch_restricted(source, &settings.first_symbol, settings);
    let second = fetch_restricted(source, &settings.second_symbol, settings);
    match (first, second) {
        (Ok(first), Ok(second)) => {
            info!(
                "Loaded {} rows for {} and {} rows for {}",
                first.len(),
                first.symbol,
                second.len(),
                second.symbol
            );
            Ok((first, second))
        }
        (first, second) => {
            for err in [first.err(), second.err()].into_iter().flatten() {
                warn!("{:#}", err);
            }
            Err(anyhow!(DATA_UNAVAILABLE_MESSAGE))
        }
    }
}

fn fetch_restricted<S: PriceSource>(
    source: &S,
    symbol: &str,
    settings: &RunSettings,
) -> Result<PriceSeries> {
    let series = source
        .fetch(symbol)?
        .restrict(settings.start_date, settings.end_date);
    if series.is_empty() {
        return Err(SignalError::DataUnavailable {
            symbol: symbol.to_string(),
        }
        .into());
    }
    Ok(series)
}
