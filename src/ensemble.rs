//! Pairwise sub-signals and the ensemble vote.

use crate::config::{BaselineSignal, SignalConfig, SubSignalKind};
use crate::error::{SignalError, SignalResult};
use crate::frame::{MarketRow, RetainedFrame};
use crate::measures::VolatilityThreshold;
use log::debug;

/// Binary sub-signals for one retained row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubSignals {
    pub net: u8,
    pub momentum: u8,
    pub exp: u8,
    pub abs: u8,
    pub baseline: u8,
    pub vol_filter: u8,
    pub vol_signal: u8,
}

impl SubSignals {
    /// Evaluates every sub-signal of a row given the baseline value for that row.
    pub fn evaluate(row: &MarketRow, threshold: f64, diff: f64, baseline: u8) -> Self {
        let vol_filter = flag(row.volatility < threshold);
        Self {
            net: flag(row.net_return1 > row.net_return2),
            momentum: flag(row.momentum1 > row.momentum2),
            exp: flag(row.exp_net1 > row.exp_net2),
            abs: flag((row.exp_net1 - row.exp_net2).abs() > diff),
            baseline,
            vol_filter,
            vol_signal: baseline * vol_filter,
        }
    }

    pub fn get(&self, kind: SubSignalKind) -> u8 {
        match kind {
            SubSignalKind::Net => self.net,
            SubSignalKind::Momentum => self.momentum,
            SubSignalKind::Exp => self.exp,
            SubSignalKind::Abs => self.abs,
            SubSignalKind::Baseline => self.baseline,
            SubSignalKind::VolFilter => self.vol_filter,
            SubSignalKind::VolSignal => self.vol_signal,
        }
    }

    /// Number of `members` equal to 1.
    pub fn votes(&self, members: &[SubSignalKind]) -> usize {
        members.iter().filter(|kind| self.get(**kind) == 1).count()
    }
}

/// 1 when at least `threshold` of the members vote 1.
pub fn vote(signals: &SubSignals, members: &[SubSignalKind], threshold: usize) -> u8 {
    flag(signals.votes(members) >= threshold)
}

fn flag(condition: bool) -> u8 {
    u8::from(condition)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleFrame {
    pub retained: RetainedFrame,
    pub threshold: VolatilityThreshold,
    pub signals: Vec<SubSignals>,
    pub ensemble: Vec<u8>,
}

impl EnsembleFrame {
    pub fn len(&self) -> usize {
        self.ensemble.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ensemble.is_empty()
    }
}

pub fn evaluate_ensemble(
    retained: RetainedFrame,
    threshold: VolatilityThreshold,
    config: &SignalConfig,
) -> SignalResult<EnsembleFrame> {
    if let VolatilityThreshold::PointInTime(values) = &threshold {
        if values.len() != retained.len() {
            return Err(SignalError::length_mismatch(
                "volatility threshold",
                retained.len(),
                values.len(),
            ));
        }
    }

    let mut signals: Vec<SubSignals> = Vec::with_capacity(retained.len());
    for (i, row) in retained.rows.iter().enumerate() {
        let baseline = match config.baseline {
            BaselineSignal::AlwaysOn => 1,
            BaselineSignal::PriorAbsAndMomentum => signals
                .last()
                .map(|prev| flag(prev.abs == 1 && prev.momentum == 1))
                .unwrap_or(0),
        };
        signals.push(SubSignals::evaluate(
            row,
            threshold.at(i),
            config.diff,
            baseline,
        ));
    }

    let ensemble: Vec<u8> = signals
        .iter()
        .map(|s| vote(s, &config.vote, config.ensemble_param))
        .collect();

    debug!(
        "Ensemble long on {} of {} rows (vote >= {} of {})",
        ensemble.iter().filter(|v| **v == 1).count(),
        ensemble.len(),
        config.ensemble_param,
        config.vote.len()
    );

    Ok(EnsembleFrame {
        retained,
        threshold,
        signals,
        ensemble,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(net: (f64, f64), momentum: (f64, f64), exp: (f64, f64), volatility: f64) -> MarketRow {
        MarketRow {
            date: NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
            close1: 10.0,
            close2: 20.0,
            return1: 0.01,
            return2: 0.0,
            net_return1: net.0,
            net_return2: net.1,
            exp_net1: exp.0,
            exp_net2: exp.1,
            momentum1: momentum.0,
            momentum2: momentum.1,
            volatility,
        }
    }

    fn retained(rows: Vec<MarketRow>) -> RetainedFrame {
        RetainedFrame {
            symbol1: "AAA".to_string(),
            symbol2: "BBB".to_string(),
            rows,
            dropped: 0,
        }
    }

    #[test]
    fn comparisons_are_strict() {
        let equal = row((0.5, 0.5), (0.1, 0.1), (0.2, 0.2), 0.01);
        let signals = SubSignals::evaluate(&equal, 0.02, 0.001, 1);
        assert_eq!(signals.net, 0);
        assert_eq!(signals.momentum, 0);
        assert_eq!(signals.exp, 0);
        assert_eq!(signals.abs, 0);
        assert_eq!(signals.vol_filter, 1);
        assert_eq!(signals.vol_signal, 1);

        let at_threshold = SubSignals::evaluate(&equal, 0.01, 0.001, 1);
        assert_eq!(at_threshold.vol_filter, 0);
        assert_eq!(at_threshold.vol_signal, 0);
    }

    #[test]
    fn abs_signal_requires_divergence_above_diff() {
        let above = row((0.0, 0.0), (0.0, 0.0), (0.0, 0.5), 1.0);
        assert_eq!(SubSignals::evaluate(&above, 0.5, 0.25, 1).abs, 1);
        let equal = row((0.0, 0.0), (0.0, 0.0), (0.0, 0.25), 1.0);
        assert_eq!(SubSignals::evaluate(&equal, 0.5, 0.25, 1).abs, 0);
    }

    #[test]
    fn vote_threshold_boundary() {
        let members = SubSignalKind::DEFAULT_VOTE;
        let two = SubSignals {
            net: 1,
            momentum: 1,
            ..SubSignals::default()
        };
        let one = SubSignals {
            net: 1,
            ..SubSignals::default()
        };
        assert_eq!(vote(&two, &members, 2), 1);
        assert_eq!(vote(&one, &members, 2), 0);
        assert_eq!(vote(&two, &members, 3), 0);
    }

    #[test]
    fn baseline_is_not_a_default_vote_member() {
        let only_baseline = SubSignals {
            baseline: 1,
            ..SubSignals::default()
        };
        assert_eq!(only_baseline.votes(&SubSignalKind::DEFAULT_VOTE), 0);
        assert_eq!(only_baseline.votes(&[SubSignalKind::Baseline]), 1);
    }

    #[test]
    fn always_on_baseline_lets_vol_filter_count_twice() {
        let config = SignalConfig::default();
        let frame = retained(vec![row((0.0, 1.0), (0.0, 1.0), (0.0, 0.0), 0.01)]);
        let result =
            evaluate_ensemble(frame, VolatilityThreshold::FullSample(0.02), &config).unwrap();
        assert_eq!(result.signals[0].vol_filter, 1);
        assert_eq!(result.signals[0].vol_signal, 1);
        assert_eq!(result.ensemble, vec![1]);
    }

    #[test]
    fn prior_abs_momentum_baseline_uses_previous_row() {
        let config = SignalConfig {
            baseline: BaselineSignal::PriorAbsAndMomentum,
            ..SignalConfig::default()
        };
        let rows = vec![
            row((0.0, 0.0), (2.0, 1.0), (1.0, 0.0), 0.01),
            row((0.0, 0.0), (0.0, 1.0), (0.0, 0.0), 0.01),
            row((0.0, 0.0), (0.0, 1.0), (0.0, 0.0), 0.01),
        ];
        let result = evaluate_ensemble(
            retained(rows),
            VolatilityThreshold::FullSample(0.02),
            &config,
        )
        .unwrap();
        let baselines: Vec<u8> = result.signals.iter().map(|s| s.baseline).collect();
        assert_eq!(baselines, vec![0, 1, 0]);
        let vol_signals: Vec<u8> = result.signals.iter().map(|s| s.vol_signal).collect();
        assert_eq!(vol_signals, vec![0, 1, 0]);
    }

    #[test]
    fn point_in_time_threshold_must_cover_every_row() {
        let frame = retained(vec![row((0.0, 0.0), (0.0, 0.0), (0.0, 0.0), 0.01)]);
        let result = evaluate_ensemble(
            frame,
            VolatilityThreshold::PointInTime(vec![0.1, 0.2]),
            &SignalConfig::default(),
        );
        assert!(matches!(result, Err(SignalError::InvariantViolation(_))));
    }
}
