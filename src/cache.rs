use crate::data::PriceSource;
use crate::error::SignalError;
use crate::models::PriceSeries;
use anyhow::{anyhow, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
struct CachedSeries {
    fetched_at: Instant,
    series: PriceSeries,
}

/// Wraps a price source with a per-symbol TTL cache and retried fetches.
#[derive(Clone)]
pub struct CachedPriceSource<S> {
    inner: S,
    entries: Arc<DashMap<String, CachedSeries>>,
    ttl: Duration,
    max_retries: usize,
    base_delay: Duration,
}

impl<S: PriceSource> CachedPriceSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            entries: Arc::new(DashMap::new()),
            ttl,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_retry_policy(mut self, max_retries: usize, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    pub fn cached_symbols(&self) -> usize {
        self.entries.len()
    }

    pub fn invalidate(&self, symbol: &str) {
        self.entries.remove(symbol);
    }

    fn check_cache(&self, symbol: &str) -> Option<PriceSeries> {
        let entry = self.entries.get(symbol)?;
        if entry.fetched_at.elapsed() <= self.ttl {
            return Some(entry.series.clone());
        }
        drop(entry);
        log::debug!("Cached prices for {} are stale", symbol);
        self.entries.remove(symbol);
        None
    }

    fn retry_with_backoff<F, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        const MAX_DELAY_MS: u64 = 10_000;

        let base_delay_ms = self.base_delay.as_millis() as u64;
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match operation() {
                Ok(result) => return Ok(result),
                Err(e) if is_permanent(&e) => return Err(e),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        let factor = u32::try_from(attempt)
                            .ok()
                            .and_then(|exp| 2_u64.checked_pow(exp))
                            .unwrap_or(u64::MAX);
                        let delay_ms = base_delay_ms.saturating_mul(factor).min(MAX_DELAY_MS);
                        let jitter_range = (delay_ms as f64 * 0.25) as u64;
                        let jitter = fastrand::u64(0..=jitter_range * 2);
                        let final_delay =
                            delay_ms.saturating_sub(jitter_range).saturating_add(jitter);
                        log::debug!(
                            "Attempt {} failed, retrying in {}ms",
                            attempt + 1,
                            final_delay
                        );
                        thread::sleep(Duration::from_millis(final_delay));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("retry_with_backoff exhausted attempts")))
    }
}

/// Missing data will not appear on a retry.
fn is_permanent(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<SignalError>(),
        Some(SignalError::DataUnavailable { .. })
    )
}

impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    fn fetch(&self, symbol: &str) -> Result<PriceSeries> {
        if let Some(series) = self.check_cache(symbol) {
            log::debug!("Using cached prices for {}", symbol);
            return Ok(series);
        }

        let series = self.retry_with_backoff(|| self.inner.fetch(symbol))?;
        self.entries.insert(
            symbol.to_string(),
            CachedSeries {
                fetched_at: Instant::now(),
                series: series.clone(),
            },
        );
        Ok(series)
    }
}
