// src/types.rs
// Type aliases shared by the cleaning stages

use crate::axis_names::AXIS_COUNT;
use ndarray::{Array1, Array2};

// Compile-time assertion: the detector, expander and velocity code assume XYZ triples.
const _: () = assert!(AXIS_COUNT == 3, "AXIS_COUNT must be 3 for XYZ position triples");

/// Frame x channel numeric block (positions, velocities or quaternion components)
pub type FrameArray = Array2<f64>;

/// Per-frame, per-axis mask. `true` = missing or rejected.
pub type Mask = Array2<bool>;

/// Per-frame scalar series (timestamps, velocity magnitudes)
pub type FrameSeries = Array1<f64>;

/// Residual analysis curve: (cutoff_hz, rms_residual)
pub type ResidualCurve = Vec<(f64, f64)>;

// src/types.rs
