// src/data_analysis/quaternion.rs

use ndarray::{ArrayView2, Axis};

use crate::data_analysis::butterworth::lowpass_zero_lag;
use crate::data_analysis::derivative::normalized;
use crate::error::CleaningError;
use crate::types::FrameArray;

/// Flips quaternion signs so consecutive samples lie in the same hemisphere.
///
/// q and -q encode the same rotation; without this, a sign flip looks like a
/// full-amplitude step to a component-wise filter. Missing rows are skipped and
/// the comparison continues from the last finite sample.
pub fn enforce_hemisphere_continuity(quaternions: ArrayView2<f64>) -> FrameArray {
    let mut output = quaternions.to_owned();
    let mut previous: Option<Vec<f64>> = None;
    for mut row in output.axis_iter_mut(Axis(0)) {
        if row.iter().any(|v| !v.is_finite()) {
            continue;
        }
        if let Some(prev) = &previous {
            let dot: f64 = row.iter().zip(prev.iter()).map(|(a, b)| a * b).sum();
            if dot < 0.0 {
                row.mapv_inplace(|v| -v);
            }
        }
        previous = Some(row.to_vec());
    }
    output
}

/// Zero-lag low-pass of a frame x 4 (x, y, z, w) quaternion block.
///
/// Hemisphere continuity first, then each component is filtered with the same
/// cutoff and every row renormalised to unit length.
pub fn filter_quaternions(
    quaternions: ArrayView2<f64>,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> Result<FrameArray, CleaningError> {
    if quaternions.ncols() != 4 {
        return Err(CleaningError::shape(
            "filter_quaternions",
            "4 quaternion columns",
            quaternions.ncols(),
        ));
    }
    let mut continuous = enforce_hemisphere_continuity(quaternions);
    for mut column in continuous.axis_iter_mut(Axis(1)) {
        let filtered = lowpass_zero_lag(column.view(), cutoff_hz, sample_rate_hz)?;
        column.assign(&filtered);
    }
    for mut row in continuous.axis_iter_mut(Axis(0)) {
        match normalized(row.view()) {
            Some(unit) => row.iter_mut().zip(unit.iter()).for_each(|(v, u)| *v = *u),
            None => row.fill(f64::NAN),
        }
    }
    Ok(continuous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_sign_flip_is_undone() {
        let quats = array![
            [0.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, -0.1, -0.995],
            [f64::NAN, f64::NAN, f64::NAN, f64::NAN],
            [0.0, 0.0, 0.2, 0.98]
        ];
        let continuous = enforce_hemisphere_continuity(quats.view());
        assert!(continuous[[1, 3]] > 0.0);
        assert!((continuous[[1, 2]] - 0.1).abs() < 1e-12);
        assert!(continuous[[2, 0]].is_nan());
        assert!(continuous[[3, 3]] > 0.0);
    }

    #[test]
    fn test_filtered_quaternions_are_unit_length() {
        let n = 200;
        let quats = Array2::from_shape_fn((n, 4), |(i, c)| {
            let half_angle = 0.5 * (i as f64 * 0.02).sin();
            let jitter = 0.01 * ((i * 7 + c * 3) as f64).sin();
            match c {
                2 => half_angle.sin() + jitter,
                3 => half_angle.cos(),
                _ => jitter,
            }
        });
        let filtered = filter_quaternions(quats.view(), 6.0, 100.0).unwrap();
        for row in filtered.axis_iter(Axis(0)) {
            let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_rows_stay_missing() {
        let mut quats = Array2::from_elem((30, 4), 0.5);
        quats.row_mut(12).fill(f64::NAN);
        let filtered = filter_quaternions(quats.view(), 6.0, 100.0).unwrap();
        assert!(filtered.row(12).iter().all(|v| v.is_nan()));
        assert!((filtered[[0, 0]] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let quats = Array2::<f64>::zeros((5, 3));
        assert!(filter_quaternions(quats.view(), 6.0, 100.0).is_err());
    }
}
