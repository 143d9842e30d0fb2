use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// Extract a parameter as f64 with a default value
pub fn get_param_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Get a finite parameter value, returns None if not found or not finite
pub fn finite_param(params: &HashMap<String, f64>, key: &str) -> Option<f64> {
    params.get(key).copied().filter(|v| v.is_finite())
}

/// Extract a parameter as a rounded usize. Missing keys yield the default;
/// negative or non-finite values are returned as `Err` with the raw value.
pub fn get_param_usize_rounded(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
) -> std::result::Result<usize, f64> {
    match params.get(key).copied() {
        None => Ok(default),
        Some(value) if value.is_finite() && value >= 0.0 => Ok(value.round() as usize),
        Some(value) => Err(value),
    }
}

/// Optional ratio parameter; zero or negative values mean "disabled"
pub fn optional_positive_param(params: &HashMap<String, f64>, key: &str) -> Option<f64> {
    finite_param(params, key).filter(|v| *v > 0.0)
}

/// Parse `key=value` assignments (as given on the command line) into a parameter map.
/// Later assignments override earlier ones.
pub fn parse_param_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<HashMap<String, f64>> {
    let mut params = HashMap::new();
    for raw in assignments {
        let raw = raw.as_ref();
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("Parameter must be written as key=value (value: {})", raw))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("Parameter name is empty (value: {})", raw));
        }
        let parsed = value
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("Parameter {} must be a number (value: {})", key, value))?;
        if !parsed.is_finite() {
            return Err(anyhow!("Parameter {} must be finite (value: {})", key, value));
        }
        params.insert(key.to_string(), parsed);
    }
    Ok(params)
}
