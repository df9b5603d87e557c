// src/data_analysis/velocity_artifacts.rs
//
// Robust per-axis outlier test on velocity jumps, plus the masked-position helper
// that hands the result to the gap filler.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::debug;

use crate::axis_names::{axis_name, AXIS_COUNT};
use crate::config::ArtifactConfig;
use crate::constants::ZERO_MAD_EPSILON;
use crate::data_analysis::derivative::{calculate_true_velocity, has_measured_interval};
use crate::data_analysis::mask_expander::expand_mask;
use crate::data_analysis::robust_stats::nan_scaled_mad;
use crate::error::CleaningError;
use crate::types::{FrameArray, Mask};

/// Flags statistical outliers in a frame x 3 velocity array, per axis.
///
/// `dv[i] = v[i + 1] - v[i]` is attributed to frame `i`; the last frame has no
/// forward difference and is never flagged. Each axis gets its own robust scale
/// (`1.4826 * MAD` of its `dv`, NaN skipped) and `(i, j)` is flagged when
/// `|dv[i, j]| > mad_multiplier * scale[j]`. An axis with zero spread only flags
/// differences that are actually non-zero. Missing velocity is never flagged here.
pub fn detect_velocity_artifacts(
    velocity: ArrayView2<f64>,
    mad_multiplier: f64,
) -> Result<Mask, CleaningError> {
    if velocity.ncols() != AXIS_COUNT {
        return Err(CleaningError::shape(
            "detect_velocity_artifacts",
            format!("{AXIS_COUNT} velocity columns"),
            velocity.ncols(),
        ));
    }
    if !(mad_multiplier.is_finite() && mad_multiplier > 0.0) {
        return Err(CleaningError::InvalidConfig(format!(
            "mad_multiplier must be positive, got {mad_multiplier}"
        )));
    }

    let n_frames = velocity.nrows();
    let mut mask = Array2::from_elem((n_frames, AXIS_COUNT), false);
    if n_frames < 2 {
        return Ok(mask);
    }

    for (axis_idx, column) in velocity.axis_iter(Axis(1)).enumerate() {
        let jumps = forward_difference(column);
        let scale = nan_scaled_mad(jumps.view())?;
        if scale.is_nan() {
            continue; // Axis entirely missing
        }
        let threshold = if scale > ZERO_MAD_EPSILON {
            mad_multiplier * scale
        } else {
            ZERO_MAD_EPSILON
        };

        let mut flagged = 0usize;
        for (i, jump) in jumps.iter().enumerate() {
            if jump.abs() > threshold {
                mask[[i, axis_idx]] = true;
                flagged += 1;
            }
        }
        debug!(
            axis = axis_name(axis_idx),
            scale,
            threshold,
            flagged,
            "Velocity jump test"
        );
    }
    Ok(mask)
}

/// `v[i + 1] - v[i]` for `i in 0..n-1`
fn forward_difference(column: ArrayView1<f64>) -> Array1<f64> {
    let n = column.len();
    if n < 2 {
        return Array1::zeros(0);
    }
    Array1::from_shape_fn(n - 1, |i| column[i + 1] - column[i])
}

/// Outcome of running the detector on one position triple
#[derive(Debug, Clone)]
pub struct ArtifactScan {
    /// Dilated artifact mask (true = rejected)
    pub mask: Mask,
    /// Positions with rejected and originally missing cells set to NaN
    pub masked_positions: FrameArray,
    /// Flags before dilation
    pub raw_flag_count: usize,
}

/// True velocity, detection, dilation, then NaN-masking of the rejected cells.
///
/// Frame 0 and frames after a degenerate interval carry placeholder zero
/// velocity; they are treated as missing so a trajectory that starts in motion
/// is not flagged at its first frame. The input array is left untouched; the
/// caller receives a masked copy ready for gap filling.
pub fn scan_position_artifacts(
    positions: ArrayView2<f64>,
    times: ArrayView1<f64>,
    config: &ArtifactConfig,
) -> Result<ArtifactScan, CleaningError> {
    let mut velocity = calculate_true_velocity(positions, times)?;
    for (i, mut row) in velocity.axis_iter_mut(Axis(0)).enumerate() {
        if !has_measured_interval(times, i) {
            row.fill(f64::NAN);
        }
    }
    let raw_mask = detect_velocity_artifacts(velocity.view(), config.mad_multiplier)?;
    let raw_flag_count = raw_mask.iter().filter(|&&f| f).count();
    let mask = expand_mask(raw_mask.view(), config.dilation_frames);
    let masked_positions = apply_mask(positions, mask.view())?;
    Ok(ArtifactScan {
        mask,
        masked_positions,
        raw_flag_count,
    })
}

/// Copy of `values` with every masked cell replaced by NaN
pub fn apply_mask(values: ArrayView2<f64>, mask: ArrayView2<bool>) -> Result<FrameArray, CleaningError> {
    if values.dim() != mask.dim() {
        return Err(CleaningError::shape(
            "apply_mask",
            format!("{:?}", values.dim()),
            format!("{:?}", mask.dim()),
        ));
    }
    let mut masked = values.to_owned();
    masked.zip_mut_with(&mask, |value, &rejected| {
        if rejected {
            *value = f64::NAN;
        }
    });
    Ok(masked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GapFillConfig;
    use crate::data_analysis::gap_filler::fill_gaps;
    use ndarray::array;
    use std::f64::consts::PI;

    /// Slow deterministic wobble so every axis has a non-zero MAD
    fn smooth_velocity(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 3), |(i, j)| {
            0.1 * ((i as f64) * 0.3 + j as f64).sin()
        })
    }

    #[test]
    fn test_three_frame_example_leaves_x_and_z_clean() {
        let velocity = array![[0.1, 0.1, 0.1], [0.1, 5.0, 0.1], [0.1, 0.1, 0.1]];
        let mask = detect_velocity_artifacts(velocity.view(), 6.0).unwrap();
        assert_eq!(mask.dim(), (3, 3));
        assert!(mask.column(0).iter().all(|&f| !f));
        assert!(mask.column(2).iter().all(|&f| !f));
        assert!(!mask[[2, 1]], "last frame has no forward difference");
    }

    #[test]
    fn test_single_axis_spike_flags_only_that_axis() {
        let mut velocity = smooth_velocity(200);
        velocity[[100, 1]] += 50.0;
        let mask = detect_velocity_artifacts(velocity.view(), 6.0).unwrap();

        // dv[99] jumps up into the spike, dv[100] jumps back down
        assert!(mask[[99, 1]]);
        assert!(mask[[100, 1]]);
        assert_eq!(mask.column(1).iter().filter(|&&f| f).count(), 2);
        assert!(mask.column(0).iter().all(|&f| !f));
        assert!(mask.column(2).iter().all(|&f| !f));
    }

    #[test]
    fn test_constant_axis_with_zero_mad() {
        let mut velocity = Array2::from_elem((20, 3), 1.0);
        velocity[[10, 0]] = 1.5;
        let mask = detect_velocity_artifacts(velocity.view(), 6.0).unwrap();
        assert!(mask[[9, 0]] && mask[[10, 0]]);
        assert!(mask.column(1).iter().all(|&f| !f));
    }

    #[test]
    fn test_wrong_column_count_is_rejected() {
        let velocity = Array2::<f64>::zeros((5, 2));
        assert!(matches!(
            detect_velocity_artifacts(velocity.view(), 6.0),
            Err(CleaningError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_samples_are_not_flagged() {
        let mut velocity = smooth_velocity(50);
        velocity[[20, 2]] = f64::NAN;
        let mask = detect_velocity_artifacts(velocity.view(), 6.0).unwrap();
        assert!(!mask[[19, 2]] && !mask[[20, 2]]);
    }

    #[test]
    fn test_scan_masks_spike_and_its_ramp() {
        let n = 120;
        let times = Array1::from_shape_fn(n, |i| i as f64 * 0.01);
        let mut positions = Array2::from_shape_fn((n, 3), |(i, j)| {
            0.2 * (j as f64 + 1.0) * (1.0 - (i as f64 * 0.05).cos())
        });
        positions[[60, 0]] += 0.5; // one-frame marker jump on X

        let config = ArtifactConfig {
            mad_multiplier: 6.0,
            dilation_frames: 2,
        };
        let scan = scan_position_artifacts(positions.view(), times.view(), &config).unwrap();
        assert!(scan.raw_flag_count > 0);
        assert!(scan.masked_positions[[60, 0]].is_nan());
        assert!(scan.mask.column(1).iter().all(|&f| !f));
        assert!(scan.masked_positions.column(1).iter().all(|v| v.is_finite()));
        // Input is untouched
        assert!(positions[[60, 0]].is_finite());
    }

    #[test]
    fn test_scan_keeps_motion_already_under_way() {
        let n = 200;
        let times = Array1::from_shape_fn(n, |i| i as f64 * 0.01);
        // Walking forward at 1 m/s from the first frame, with sway on the other axes
        let positions = Array2::from_shape_fn((n, 3), |(i, j)| {
            let t = times[i];
            match j {
                0 => t + 0.05 * (2.0 * PI * t).sin(),
                1 => 0.1 * (2.0 * PI * 0.7 * t).sin(),
                _ => 1.0 + 0.05 * (2.0 * PI * 0.5 * t).cos(),
            }
        });
        let config = ArtifactConfig {
            mad_multiplier: 6.0,
            dilation_frames: 2,
        };
        let scan = scan_position_artifacts(positions.view(), times.view(), &config).unwrap();
        assert_eq!(scan.raw_flag_count, 0);
        assert!(scan.masked_positions.iter().all(|v| v.is_finite()));

        let filled = fill_gaps(times.view(), scan.masked_positions.view(), &GapFillConfig::default()).unwrap();
        assert_eq!(filled.filled, positions);
        assert_eq!(filled.stats.missing_cells_after, 0);
    }

    #[test]
    fn test_scan_ignores_duplicate_timestamp() {
        let n = 100;
        let mut times = Array1::from_shape_fn(n, |i| i as f64 * 0.01);
        times[50] = times[49];
        // Constant speed; the repeated sample sits at the same place
        let positions = Array2::from_shape_fn((n, 3), |(i, j)| 0.5 * (j as f64 + 1.0) * times[i]);
        let config = ArtifactConfig {
            mad_multiplier: 6.0,
            dilation_frames: 2,
        };
        let scan = scan_position_artifacts(positions.view(), times.view(), &config).unwrap();
        assert_eq!(scan.raw_flag_count, 0);
    }

    #[test]
    fn test_apply_mask_shape_check() {
        let values = Array2::<f64>::zeros((3, 3));
        let mask = Array2::from_elem((2, 3), false);
        assert!(apply_mask(values.view(), mask.view()).is_err());
    }
}
