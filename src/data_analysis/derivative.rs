// src/data_analysis/derivative.rs

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::constants::MIN_TIME_DELTA_S;
use crate::error::CleaningError;
use crate::types::FrameSeries;

/// Time-aware first derivative of a frame x channel block.
///
/// `v[i] = (p[i] - p[i-1]) / (t[i] - t[i-1])`. Frame 0 has no preceding interval
/// and gets zero velocity; so does any frame whose interval is degenerate
/// (duplicate timestamp), instead of dividing by ~0. Missing positions propagate
/// as NaN. This is the single velocity definition used by both the artifact
/// detector and the burst classifier.
pub fn calculate_true_velocity(
    positions: ArrayView2<f64>,
    times: ArrayView1<f64>,
) -> Result<Array2<f64>, CleaningError> {
    if positions.nrows() != times.len() {
        return Err(CleaningError::shape(
            "calculate_true_velocity",
            format!("{} frames", times.len()),
            format!("{} frames", positions.nrows()),
        ));
    }

    let mut velocity = Array2::<f64>::zeros(positions.raw_dim());
    for i in 1..positions.nrows() {
        if !has_measured_interval(times, i) {
            continue; // Degenerate interval: keep zero velocity
        }
        let dt = times[i] - times[i - 1];
        for j in 0..positions.ncols() {
            velocity[[i, j]] = (positions[[i, j]] - positions[[i - 1, j]]) / dt;
        }
    }
    Ok(velocity)
}

/// True when frame `i` has a usable interval to its predecessor. Frames
/// without one get placeholder zero velocity from `calculate_true_velocity`.
pub fn has_measured_interval(times: ArrayView1<f64>, i: usize) -> bool {
    i > 0 && i < times.len() && times[i] - times[i - 1] > MIN_TIME_DELTA_S
}

/// Euclidean norm of each frame (row); NaN if any component is NaN
pub fn velocity_magnitude(velocity: ArrayView2<f64>) -> FrameSeries {
    velocity.map_axis(Axis(1), |row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
}

/// Angular speed (deg/s) between consecutive unit quaternions (x, y, z, w columns).
///
/// Uses the shortest arc `2 * acos(|q[i] . q[i-1]|)` so sign flips of the
/// double cover are not mistaken for half turns. Frame 0 and degenerate
/// intervals are zero, missing quaternions give NaN.
pub fn angular_velocity_magnitude(
    quaternions: ArrayView2<f64>,
    times: ArrayView1<f64>,
) -> Result<FrameSeries, CleaningError> {
    if quaternions.ncols() != 4 {
        return Err(CleaningError::shape(
            "angular_velocity_magnitude",
            "4 quaternion columns",
            quaternions.ncols(),
        ));
    }
    if quaternions.nrows() != times.len() {
        return Err(CleaningError::shape(
            "angular_velocity_magnitude",
            format!("{} frames", times.len()),
            format!("{} frames", quaternions.nrows()),
        ));
    }

    let mut omega = Array1::<f64>::zeros(times.len());
    for i in 1..times.len() {
        let dt = times[i] - times[i - 1];
        if !(dt > MIN_TIME_DELTA_S) {
            continue;
        }
        let q0 = normalized(quaternions.row(i - 1));
        let q1 = normalized(quaternions.row(i));
        omega[i] = match (q0, q1) {
            (Some(a), Some(b)) => {
                let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let angle = 2.0 * dot.abs().min(1.0).acos();
                angle.to_degrees() / dt
            }
            _ => f64::NAN,
        };
    }
    Ok(omega)
}

/// Unit quaternion, or None if missing / zero-length
pub fn normalized(q: ArrayView1<f64>) -> Option<[f64; 4]> {
    if q.len() != 4 || q.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let norm = q.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm < 1e-12 {
        return None;
    }
    Some([q[0] / norm, q[1] / norm, q[2] / norm, q[3] / norm])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_true_velocity_uses_actual_intervals() {
        let positions = array![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [3.0, 0.0, 0.0]];
        let times = array![0.0, 0.1, 0.3]; // irregular spacing
        let v = calculate_true_velocity(positions.view(), times.view()).unwrap();
        assert_eq!(v[[0, 0]], 0.0);
        assert!((v[[1, 0]] - 10.0).abs() < 1e-9);
        assert!((v[[2, 0]] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_interval_gives_zero_velocity() {
        let positions = array![[0.0], [5.0], [6.0]];
        let times = array![0.0, 0.0, 0.01];
        let v = calculate_true_velocity(positions.view(), times.view()).unwrap();
        assert_eq!(v[[1, 0]], 0.0);
        assert!((v[[2, 0]] - 100.0).abs() < 1e-9);
        assert!(v.iter().all(|x| x.is_finite()));
        let measured: Vec<bool> = (0..3).map(|i| has_measured_interval(times.view(), i)).collect();
        assert_eq!(measured, vec![false, false, true]);
    }

    #[test]
    fn test_velocity_shape_mismatch_is_an_error() {
        let positions = array![[0.0], [1.0]];
        let times = array![0.0];
        assert!(calculate_true_velocity(positions.view(), times.view()).is_err());
    }

    #[test]
    fn test_missing_positions_propagate_nan() {
        let positions = array![[0.0], [f64::NAN], [1.0]];
        let times = array![0.0, 0.1, 0.2];
        let v = calculate_true_velocity(positions.view(), times.view()).unwrap();
        assert!(v[[1, 0]].is_nan());
        assert!(v[[2, 0]].is_nan());
        let mag = velocity_magnitude(v.view());
        assert!(mag[1].is_nan());
    }

    #[test]
    fn test_magnitude() {
        let v = array![[3.0, 4.0, 0.0]];
        assert_eq!(velocity_magnitude(v.view())[0], 5.0);
    }

    #[test]
    fn test_angular_velocity_quarter_turn() {
        // 90 degrees about Z in 0.5 s -> 180 deg/s
        let half = std::f64::consts::FRAC_PI_4;
        let quats = array![[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, half.sin(), half.cos()]];
        let times = array![0.0, 0.5];
        let omega = angular_velocity_magnitude(quats.view(), times.view()).unwrap();
        assert_eq!(omega[0], 0.0);
        assert!((omega[1] - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_angular_velocity_ignores_double_cover_flip() {
        let quats = array![[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, -1.0]];
        let times = array![0.0, 0.01];
        let omega = angular_velocity_magnitude(quats.view(), times.view()).unwrap();
        assert!(omega[1].abs() < 1e-9);
    }
}
