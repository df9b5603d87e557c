// src/data_analysis/robust_stats.rs
//
// NaN-skipping summary statistics on top of ndarray-stats.
// Missing samples are NaN throughout the crate, so every helper ignores them.

use ndarray::{ArrayView1, Axis};
use ndarray_stats::interpolate::Linear;
use ndarray_stats::QuantileExt;
use noisy_float::types::n64;

use crate::constants::MAD_NORMAL_CONSISTENCY;
use crate::error::CleaningError;

/// Linear-interpolated quantile (numpy default) over the non-NaN values.
/// Returns NaN when the input is empty or entirely NaN.
pub fn nan_quantile(values: ArrayView1<f64>, q: f64) -> Result<f64, CleaningError> {
    if !(0.0..=1.0).contains(&q) {
        return Err(CleaningError::InvalidConfig(format!(
            "quantile must lie in [0, 1], got {q}"
        )));
    }
    if values.is_empty() {
        return Ok(f64::NAN);
    }
    let mut owned = values.to_owned();
    let result = owned
        .quantile_axis_skipnan_mut(Axis(0), n64(q), &Linear)
        .map_err(|e| CleaningError::InvariantViolation(format!("quantile computation: {e}")))?;
    Ok(result.into_scalar())
}

pub fn nan_median(values: ArrayView1<f64>) -> Result<f64, CleaningError> {
    nan_quantile(values, 0.5)
}

/// Median absolute deviation scaled by 1.4826 so it estimates sigma for Gaussian data.
pub fn nan_scaled_mad(values: ArrayView1<f64>) -> Result<f64, CleaningError> {
    let median = nan_median(values)?;
    if median.is_nan() {
        return Ok(f64::NAN);
    }
    let deviations = values.mapv(|v| (v - median).abs());
    Ok(MAD_NORMAL_CONSISTENCY * nan_median(deviations.view())?)
}

/// Maximum over the non-NaN values, NaN when there are none
pub fn nan_max(values: ArrayView1<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    *values.max_skipnan()
}
