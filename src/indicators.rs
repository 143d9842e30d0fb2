use std::cmp::Ordering;

/// Fractional change between consecutive prices. The first element has no prior
/// value and is defined as 0.
pub fn calculate_pct_change(prices: &[f64]) -> Vec<f64> {
    if prices.is_empty() {
        return Vec::new();
    }

    let mut returns = Vec::with_capacity(prices.len());
    returns.push(0.0);
    for pair in prices.windows(2) {
        returns.push(pair[1] / pair[0] - 1.0);
    }
    returns
}

/// Trailing mean over `period` values; NaN until a full window of finite values exists.
pub fn calculate_rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    rolling_apply(values, period, |window| {
        window.iter().sum::<f64>() / window.len() as f64
    })
}

/// Trailing sample standard deviation (n - 1 denominator) over `period` values.
pub fn calculate_rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    rolling_apply(values, period, |window| {
        if window.len() < 2 {
            return f64::NAN;
        }
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let variance = window
            .iter()
            .map(|&val| (val - mean).powi(2))
            .sum::<f64>()
            / (window.len() as f64 - 1.0);
        variance.max(0.0).sqrt()
    })
}

fn rolling_apply<F>(values: &[f64], period: usize, reducer: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut output = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return output;
    }

    for end in (period - 1)..values.len() {
        let window = &values[end + 1 - period..=end];
        if window.iter().all(|v| v.is_finite()) {
            output[end] = reducer(window);
        }
    }
    output
}

/// Exponentially weighted mean and standard deviation with span-based decay.
///
/// Weights are `(1 - alpha)^k` for an observation `k` periods old, with
/// `alpha = 2 / (span + 1)`, normalised by their sum. The standard deviation is
/// bias corrected by `(sum w)^2 / ((sum w)^2 - sum w^2)`, so it is NaN on the first
/// observation. Non-finite inputs are skipped but still decay older weights; the
/// pipeline only feeds returns of strictly positive closes, so none occur there.
pub fn calculate_ewm_mean_std(values: &[f64], span: f64) -> (Vec<f64>, Vec<f64>) {
    let mut means = vec![f64::NAN; values.len()];
    let mut stds = vec![f64::NAN; values.len()];
    if values.is_empty() || !span.is_finite() || span < 1.0 {
        return (means, stds);
    }

    let alpha = 2.0 / (span + 1.0);
    let decay = 1.0 - alpha;
    let mut mean = f64::NAN;
    let mut cov = 0.0f64;
    let mut sum_wt = 1.0f64;
    let mut sum_wt2 = 1.0f64;
    let mut old_wt = 1.0f64;

    for (i, &value) in values.iter().enumerate() {
        let is_observation = value.is_finite();
        if mean.is_nan() {
            if is_observation {
                mean = value;
                cov = 0.0;
                sum_wt = 1.0;
                sum_wt2 = 1.0;
                old_wt = 1.0;
            }
        } else {
            sum_wt *= decay;
            sum_wt2 *= decay * decay;
            old_wt *= decay;
            if is_observation {
                let old_mean = mean;
                if mean != value {
                    mean = (old_wt * old_mean + value) / (old_wt + 1.0);
                }
                cov = (old_wt * (cov + (old_mean - mean).powi(2))
                    + (value - mean).powi(2))
                    / (old_wt + 1.0);
                sum_wt += 1.0;
                sum_wt2 += 1.0;
                old_wt += 1.0;
            }
        }

        if mean.is_nan() {
            continue;
        }
        means[i] = mean;
        let numerator = sum_wt * sum_wt;
        let denominator = numerator - sum_wt2;
        if denominator > 0.0 {
            stds[i] = ((numerator / denominator) * cov).max(0.0).sqrt();
        }
    }

    (means, stds)
}

/// Quantile with linear interpolation between the closest ranks, ignoring
/// non-finite values. Returns None when no finite value exists.
pub fn calculate_quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Quantile of every prefix `values[..=i]`.
pub fn calculate_expanding_quantile(values: &[f64], q: f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| calculate_quantile(&values[..=i], q).unwrap_or(f64::NAN))
        .collect()
}

/// Quantile of the trailing `period` values ending at each index; shorter
/// prefixes use what is available.
pub fn calculate_rolling_quantile(values: &[f64], period: usize, q: f64) -> Vec<f64> {
    let period = period.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(period);
            calculate_quantile(&values[start..=i], q).unwrap_or(f64::NAN)
        })
        .collect()
}

/// Compounded running return expressed in percent.
pub fn calculate_cumulative_return_pct(returns: &[f64]) -> Vec<f64> {
    let mut growth = 1.0f64;
    returns
        .iter()
        .map(|r| {
            growth *= 1.0 + r;
            (growth - 1.0) * 100.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn pct_change_starts_at_zero() {
        let returns = calculate_pct_change(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 3);
        assert_eq!(returns[0], 0.0);
        assert_close(returns[1], 0.1);
        assert_close(returns[2], -0.1);
        assert!(calculate_pct_change(&[]).is_empty());
    }

    #[test]
    fn rolling_stats_are_undefined_during_warmup() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mean = calculate_rolling_mean(&values, 3);
        let std = calculate_rolling_std(&values, 3);
        assert!(mean[0].is_nan() && mean[1].is_nan());
        assert!(std[0].is_nan() && std[1].is_nan());
        assert_close(mean[2], 2.0);
        assert_close(mean[4], 4.0);
        assert_close(std[2], 1.0);
        assert_close(std[4], 1.0);
    }

    #[test]
    fn rolling_std_of_constant_window_is_exactly_zero() {
        let std = calculate_rolling_std(&[0.25; 6], 4);
        assert_eq!(std[5], 0.0);
    }

    #[test]
    fn rolling_window_with_nan_is_undefined() {
        let mean = calculate_rolling_mean(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(mean[1].is_nan());
        assert!(mean[2].is_nan());
        assert_close(mean[3], 3.5);
    }

    #[test]
    fn ewm_matches_weighted_definition() {
        let values = [1.0, 2.0, 4.0];
        let span = 3.0;
        let (means, stds) = calculate_ewm_mean_std(&values, span);

        assert_close(means[0], 1.0);
        assert!(stds[0].is_nan());

        // alpha = 0.5, weights for the last point: [0.25, 0.5, 1.0]
        let weights = [0.25, 0.5, 1.0];
        let sum_w: f64 = weights.iter().sum();
        let sum_w2: f64 = weights.iter().map(|w| w * w).sum();
        let mean: f64 = weights.iter().zip(values).map(|(w, x)| w * x).sum::<f64>() / sum_w;
        let biased: f64 = weights
            .iter()
            .zip(values)
            .map(|(w, x)| w * (x - mean).powi(2))
            .sum::<f64>()
            / sum_w;
        let unbiased = biased * sum_w * sum_w / (sum_w * sum_w - sum_w2);
        assert_close(means[2], mean);
        assert_close(stds[2], unbiased.sqrt());
    }

    #[test]
    fn ewm_std_of_constant_series_is_zero() {
        let (means, stds) = calculate_ewm_mean_std(&[0.0; 5], 50.0);
        assert_eq!(means[4], 0.0);
        assert_eq!(stds[4], 0.0);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let values = [4.0, 1.0, 3.0, 2.0, f64::NAN];
        assert_close(calculate_quantile(&values, 0.0).unwrap(), 1.0);
        assert_close(calculate_quantile(&values, 1.0).unwrap(), 4.0);
        assert_close(calculate_quantile(&values, 0.5).unwrap(), 2.5);
        assert_close(calculate_quantile(&values, 0.7).unwrap(), 3.1);
        assert!(calculate_quantile(&[f64::NAN], 0.5).is_none());
    }

    #[test]
    fn expanding_and_rolling_quantiles_only_look_back() {
        let values = [1.0, 3.0, 2.0, 10.0];
        let expanding = calculate_expanding_quantile(&values, 1.0);
        assert_eq!(expanding, vec![1.0, 3.0, 3.0, 10.0]);
        let rolling = calculate_rolling_quantile(&values, 2, 0.0);
        assert_eq!(rolling, vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn cumulative_return_compounds() {
        let cumulative = calculate_cumulative_return_pct(&[0.0, 0.1, -0.1]);
        assert_close(cumulative[0], 0.0);
        assert_close(cumulative[1], 10.0);
        assert_close(cumulative[2], -1.0);
    }
}
