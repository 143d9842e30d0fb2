use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{SignalError, SignalResult};
use crate::param_utils::{
    finite_param, get_param_f64, get_param_usize_rounded, optional_positive_param,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_WINDOW: usize = 55;
pub const DEFAULT_EXP_SPAN: f64 = 50.0;
pub const DEFAULT_DIFF: f64 = 0.001;
pub const DEFAULT_ENSEMBLE_PARAM: usize = 2;
pub const DEFAULT_QUANTILE: f64 = 0.7;
pub const DEFAULT_VOLATILITY_WINDOW: usize = 10;
pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;
pub const DEFAULT_FIRST_SYMBOL: &str = "^GSPC";
pub const DEFAULT_SECOND_SYMBOL: &str = "DX-Y.NYB";
pub const DEFAULT_START_DATE: &str = "2008-01-11";
pub const DEFAULT_TAIL_ROWS: usize = 15;

/// Binary sub-signals that can take part in the ensemble vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSignalKind {
    Net,
    Momentum,
    Exp,
    Abs,
    Baseline,
    VolFilter,
    VolSignal,
}

impl SubSignalKind {
    /// Members of the vote when nothing else is configured. The baseline
    /// signal only contributes through `VolSignal`.
    pub const DEFAULT_VOTE: [SubSignalKind; 6] = [
        SubSignalKind::Net,
        SubSignalKind::Momentum,
        SubSignalKind::Exp,
        SubSignalKind::Abs,
        SubSignalKind::VolFilter,
        SubSignalKind::VolSignal,
    ];

    pub fn parse(raw: &str) -> SignalResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "net" | "net_signal" => Ok(Self::Net),
            "momentum" | "momentum_signal" => Ok(Self::Momentum),
            "exp" | "exp_signal" => Ok(Self::Exp),
            "abs" | "abs_signal" => Ok(Self::Abs),
            "baseline" | "baseline_signal" => Ok(Self::Baseline),
            "vol_filter" => Ok(Self::VolFilter),
            "vol_signal" => Ok(Self::VolSignal),
            other => Err(SignalError::InvalidConfig(format!(
                "unknown sub-signal '{}'",
                other
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Net => "net_signal",
            Self::Momentum => "momentum_signal",
            Self::Exp => "exp_signal",
            Self::Abs => "abs_signal",
            Self::Baseline => "baseline_signal",
            Self::VolFilter => "vol_filter",
            Self::VolSignal => "vol_signal",
        }
    }
}

/// Baseline signal multiplied into `vol_signal`.
///
/// `AlwaysOn` is constant 1. `PriorAbsAndMomentum` is 1 only when both
/// `abs_signal` and `momentum_signal` were 1 on the previous retained row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSignal {
    #[default]
    AlwaysOn,
    PriorAbsAndMomentum,
}

impl BaselineSignal {
    pub fn parse(raw: &str) -> SignalResult<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "always_on" | "constant" => Ok(Self::AlwaysOn),
            "prior_abs_momentum" | "prior_abs_and_momentum" => Ok(Self::PriorAbsAndMomentum),
            other => Err(SignalError::InvalidConfig(format!(
                "baseline must be always_on or prior_abs_momentum (value: {})",
                other
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AlwaysOn => "always_on",
            Self::PriorAbsAndMomentum => "prior_abs_momentum",
        }
    }
}

/// How the volatility threshold is derived from the retained volatility series.
///
/// `FullSample` uses every retained row, so early rows see a threshold informed by
/// later volatility. Callers evaluating point-in-time must use `Expanding` or `Rolling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    #[default]
    FullSample,
    Expanding,
    Rolling(usize),
}

impl ThresholdMode {
    pub fn parse(raw: &str) -> SignalResult<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        if let Some(window) = normalized.strip_prefix("rolling:") {
            let window = window.trim().parse::<usize>().map_err(|_| {
                SignalError::InvalidConfig(format!(
                    "rolling threshold window must be a positive integer (value: {})",
                    window
                ))
            })?;
            return Ok(Self::Rolling(window));
        }
        match normalized.as_str() {
            "full_sample" | "full" => Ok(Self::FullSample),
            "expanding" => Ok(Self::Expanding),
            other => Err(SignalError::InvalidConfig(format!(
                "threshold mode must be full_sample, expanding or rolling:<n> (value: {})",
                other
            ))),
        }
    }
}

/// Parameters of the signal ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub window: usize,
    pub exp_span: f64,
    pub diff: f64,
    pub ensemble_param: usize,
    pub quantile: f64,
    pub volatility_window: usize,
    pub baseline: BaselineSignal,
    pub threshold_mode: ThresholdMode,
    pub vote: Vec<SubSignalKind>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            exp_span: DEFAULT_EXP_SPAN,
            diff: DEFAULT_DIFF,
            ensemble_param: DEFAULT_ENSEMBLE_PARAM,
            quantile: DEFAULT_QUANTILE,
            volatility_window: DEFAULT_VOLATILITY_WINDOW,
            baseline: BaselineSignal::default(),
            threshold_mode: ThresholdMode::default(),
            vote: SubSignalKind::DEFAULT_VOTE.to_vec(),
        }
    }
}

impl SignalConfig {
    /// Create a SignalConfig from a parameter map; missing keys keep their defaults.
    /// Negative or non-finite counts are rejected rather than replaced.
    pub fn from_parameters(parameters: &HashMap<String, f64>) -> SignalResult<Self> {
        Ok(Self {
            window: count_param(parameters, "window", DEFAULT_WINDOW)?,
            exp_span: get_param_f64(parameters, "expSpan", DEFAULT_EXP_SPAN),
            diff: get_param_f64(parameters, "diff", DEFAULT_DIFF),
            ensemble_param: count_param(parameters, "ensembleParam", DEFAULT_ENSEMBLE_PARAM)?,
            quantile: get_param_f64(parameters, "quantile", DEFAULT_QUANTILE),
            volatility_window: count_param(
                parameters,
                "volatilityWindow",
                DEFAULT_VOLATILITY_WINDOW,
            )?,
            ..Self::default()
        })
    }

    /// Largest trailing window any column needs before it is defined.
    pub fn warmup_rows(&self) -> usize {
        self.window.max(self.volatility_window)
    }

    pub fn validate(&self) -> SignalResult<()> {
        if self.window < 2 {
            return Err(invalid(format!("window must be >= 2 (value: {})", self.window)));
        }
        if self.volatility_window < 2 {
            return Err(invalid(format!(
                "volatility window must be >= 2 (value: {})",
                self.volatility_window
            )));
        }
        if !self.exp_span.is_finite() || self.exp_span < 1.0 {
            return Err(invalid(format!(
                "exponential span must be >= 1 (value: {})",
                self.exp_span
            )));
        }
        if !self.diff.is_finite() || self.diff < 0.0 {
            return Err(invalid(format!(
                "divergence threshold must be finite and >= 0 (value: {})",
                self.diff
            )));
        }
        if !(0.0..=1.0).contains(&self.quantile) {
            return Err(invalid(format!(
                "quantile must be within [0, 1] (value: {})",
                self.quantile
            )));
        }
        if let ThresholdMode::Rolling(window) = self.threshold_mode {
            if window == 0 {
                return Err(invalid("rolling threshold window must be >= 1".to_string()));
            }
        }
        if self.vote.is_empty() {
            return Err(invalid("vote must contain at least one sub-signal".to_string()));
        }
        for (idx, kind) in self.vote.iter().enumerate() {
            if self.vote[..idx].contains(kind) {
                return Err(invalid(format!("{} listed twice in the vote", kind.label())));
            }
        }
        if self.ensemble_param == 0 || self.ensemble_param > self.vote.len() {
            return Err(invalid(format!(
                "ensemble threshold must be between 1 and {} (value: {})",
                self.vote.len(),
                self.ensemble_param
            )));
        }
        Ok(())
    }
}

/// Settings handed to the backtest simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub initial_cash: f64,
    pub frequency_days: i64,
    pub stop_loss: Option<f64>,
    pub annualization_days: f64,
    pub risk_free_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_cash: DEFAULT_INITIAL_CASH,
            frequency_days: 1,
            stop_loss: None,
            annualization_days: 365.0,
            risk_free_rate: 0.0,
        }
    }
}

impl SimulatorConfig {
    pub fn from_parameters(parameters: &HashMap<String, f64>) -> Self {
        let defaults = Self::default();
        Self {
            initial_cash: get_param_f64(parameters, "initialCash", defaults.initial_cash),
            frequency_days: finite_param(parameters, "frequencyDays")
                .map(|v| v.round() as i64)
                .unwrap_or(defaults.frequency_days),
            stop_loss: optional_positive_param(parameters, "stopLoss"),
            annualization_days: get_param_f64(
                parameters,
                "annualizationDays",
                defaults.annualization_days,
            ),
            risk_free_rate: get_param_f64(parameters, "riskFreeRate", defaults.risk_free_rate),
        }
    }

    pub fn frequency_label(&self) -> String {
        if self.frequency_days == 1 {
            "1 day".to_string()
        } else {
            format!("{} days", self.frequency_days)
        }
    }

    /// Number of bars per year used to annualize per-bar ratios.
    pub fn periods_per_year(&self) -> f64 {
        self.annualization_days / self.frequency_days as f64
    }

    pub fn validate(&self) -> SignalResult<()> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(invalid(format!(
                "initial cash must be positive (value: {})",
                self.initial_cash
            )));
        }
        if self.frequency_days < 1 {
            return Err(invalid(format!(
                "frequency must be at least one day (value: {})",
                self.frequency_days
            )));
        }
        if let Some(stop) = self.stop_loss {
            if !(stop > 0.0 && stop < 1.0) {
                return Err(invalid(format!(
                    "stop loss must be within (0, 1) (value: {})",
                    stop
                )));
            }
        }
        if !self.annualization_days.is_finite() || self.annualization_days <= 0.0 {
            return Err(invalid(format!(
                "annualization days must be positive (value: {})",
                self.annualization_days
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("risk free rate must be finite".to_string()));
        }
        Ok(())
    }
}

/// Which pair to load and over which date range.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub first_symbol: String,
    pub second_symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub cache_ttl: Duration,
    pub tail_rows: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            first_symbol: DEFAULT_FIRST_SYMBOL.to_string(),
            second_symbol: DEFAULT_SECOND_SYMBOL.to_string(),
            start_date: NaiveDate::parse_from_str(DEFAULT_START_DATE, "%Y-%m-%d").ok(),
            end_date: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            tail_rows: DEFAULT_TAIL_ROWS,
        }
    }
}

impl RunSettings {
    pub fn validate(&self) -> SignalResult<()> {
        if self.first_symbol.is_empty() || self.second_symbol.is_empty() {
            return Err(invalid("both symbols must be non-empty".to_string()));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(invalid(format!(
                    "start date {} is after end date {}",
                    start, end
                )));
            }
        }
        Ok(())
    }
}

fn count_param(parameters: &HashMap<String, f64>, key: &str, default: usize) -> SignalResult<usize> {
    get_param_usize_rounded(parameters, key, default).map_err(|value| {
        invalid(format!(
            "{} must be a non-negative whole number (value: {})",
            key, value
        ))
    })
}

fn invalid(message: String) -> SignalError {
    SignalError::InvalidConfig(message)
}
