use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub ci_by_year: BTreeMap<i32, f64>,
    pub winsor_bounds: (f64, f64),
    pub restated: BTreeMap<i32, bool>,
}

/// Percentile with linear interpolation between order statistics.
///
/// `sorted` must be ascending and non-empty; `pct` is in [0, 100].
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    if frac == 0.0 {
        return sorted[lo];
    }
    // stays finite for opposite-signed extremes
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Clip every value into the `[p_low, p_high]` percentile range of the series.
pub fn winsorize(values: &[f64], p_low: f64, p_high: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let lo = percentile(&sorted, p_low);
    let hi = percentile(&sorted, p_high);
    if lo.is_nan() || hi.is_nan() || lo > hi {
        tracing::warn!(lo, hi, "winsor bounds unusable, series left unclipped");
        return values.to_vec();
    }
    values.iter().map(|v| v.clamp(lo, hi)).collect()
}

/// Year-over-year stability of a disclosed series.
///
/// Values are winsorized first; each year after the first scores
/// `1 - |v_t - v_{t-1}| / max(|v_t|, |v_{t-1}|)`, clamped to [0, 1]. Two zero
/// values in a row are identical and score 1. Non-finite values are ignored.
pub fn ci_light(
    series_by_year: &BTreeMap<i32, f64>,
    winsor_pct: (f64, f64),
    restated: &BTreeMap<i32, bool>,
) -> ConsistencyResult {
    let (years, values): (Vec<i32>, Vec<f64>) = series_by_year
        .iter()
        .filter(|(_, value)| value.is_finite())
        .map(|(year, value)| (*year, *value))
        .unzip();
    let winsorized = winsorize(&values, winsor_pct.0, winsor_pct.1);

    let mut ci_by_year = BTreeMap::new();
    for i in 1..years.len() {
        let (current, previous) = (winsorized[i], winsorized[i - 1]);
        let scale = current.abs().max(previous.abs());
        let score = if scale == 0.0 {
            1.0
        } else {
            1.0 - (current / scale - previous / scale).abs()
        };
        ci_by_year.insert(years[i], score.clamp(0.0, 1.0));
    }

    let winsor_bounds = if winsorized.is_empty() {
        (0.0, 0.0)
    } else {
        let min = winsorized.iter().copied().fold(f64::INFINITY, f64::min);
        let max = winsorized.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    };

    ConsistencyResult {
        ci_by_year,
        winsor_bounds,
        restated: restated.clone(),
    }
}

/// Convert a value to the series base unit through `unit_map`.
pub fn normalize_units(
    value: f64,
    unit: &str,
    unit_map: &HashMap<String, f64>,
) -> Result<f64, ConfigError> {
    unit_map
        .get(&unit.to_lowercase())
        .map(|factor| value * factor)
        .ok_or_else(|| ConfigError::UnknownUnit {
            unit: unit.to_string(),
        })
}

/// Parse `"2021:2694,2022:2194,2023:2126"` into a year series.
///
/// Parsing is lenient: brackets and stray characters are stripped, and
/// entries that still do not parse are skipped. An optional third field
/// (`"2022:2.1:kt"`) is converted through `unit_map`; an unknown unit is an
/// error. Values that overflow to infinity are skipped.
pub fn parse_ci_values(
    raw: &str,
    unit_map: &HashMap<String, f64>,
) -> Result<BTreeMap<i32, f64>, ConfigError> {
    let mut series = BTreeMap::new();

    for entry in raw.split(',') {
        let entry = entry.trim().trim_matches(|c| c == '[' || c == ']');
        let mut parts = entry.splitn(3, ':');
        let (Some(year_part), Some(value_part)) = (parts.next(), parts.next()) else {
            continue;
        };

        let year_digits: String = year_part.chars().filter(char::is_ascii_digit).collect();
        let value_chars: String = value_part
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, 'e' | 'E' | '.' | '-' | '+'))
            .collect();

        let (Ok(year), Ok(mut value)) = (year_digits.parse::<i32>(), value_chars.parse::<f64>())
        else {
            continue;
        };

        if let Some(unit) = parts.next().map(str::trim).filter(|u| !u.is_empty()) {
            value = normalize_units(value, unit, unit_map)?;
        }

        if !value.is_finite() {
            tracing::warn!(entry, "CI value is not finite, skipped");
            continue;
        }
        series.insert(year, value);
    }

    Ok(series)
}

/// Parse `"2022,2023"` into restated-year flags.
pub fn parse_restated(raw: &str) -> BTreeMap<i32, bool> {
    raw.split(',')
        .filter_map(|y| y.trim().parse::<i32>().ok())
        .map(|year| (year, true))
        .collect()
}
