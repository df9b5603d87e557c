// src/constants.rs

// --- Velocity / artifact detection ---
pub const MAD_NORMAL_CONSISTENCY: f64 = 1.4826; // MAD -> sigma for Gaussian noise
pub const DEFAULT_MAD_MULTIPLIER: f64 = 6.0;
pub const DEFAULT_DILATION_FRAMES: usize = 2; // Covers the ramp-in/ramp-out around a spike
pub const MIN_TIME_DELTA_S: f64 = 1e-9; // Below this an interval is treated as degenerate
pub const ZERO_MAD_EPSILON: f64 = 1e-12;

// --- Gap filling ---
pub const DEFAULT_MAX_GAP_S: f64 = 0.1; // Longest gap interpolated by the spline
pub const DEFAULT_MIN_RUN_FRAMES: usize = 5; // Shorter valid runs are not trusted as anchors

// --- Winter residual analysis ---
pub const WINTER_FMIN_HZ: f64 = 1.0;
pub const WINTER_FMAX_HZ: f64 = 12.0;
pub const WINTER_STEP_HZ: f64 = 0.5;
pub const TRUNK_MIN_CUTOFF_HZ: f64 = 6.0; // Core segments move slowly
pub const DISTAL_MIN_CUTOFF_HZ: f64 = 8.0; // Hands/feet must not be oversmoothed
pub const ABSOLUTE_MAX_CUTOFF_HZ: f64 = 12.0;
pub const KNEE_MIN_DIFFERENCE: f64 = 0.05; // Normalised distance below which the curve counts as straight
pub const BAND_EDGE_MARGIN_HZ: f64 = 1.0; // Knees this close to fmax are suspicious
pub const MIN_WINTER_SAMPLES: usize = 32;

// --- Zero-lag Butterworth ---
pub const FILTFILT_PADLEN: usize = 9; // 3 * max(len(a), len(b)) for a 2nd-order section
pub const MAX_CUTOFF_NYQUIST_FRACTION: f64 = 0.98; // Cutoffs must stay below this share of fs / 2

// --- Burst / artifact tiers (linear velocity, m/s) ---
pub const VELOCITY_TRIGGER_M_S: f64 = 4.0;
pub const VELOCITY_EXTREME_M_S: f64 = 10.0;
// --- Burst / artifact tiers (angular velocity, deg/s) ---
pub const ANGULAR_VELOCITY_TRIGGER_DEG_S: f64 = 800.0;
pub const ANGULAR_VELOCITY_EXTREME_DEG_S: f64 = 1500.0;
// Durations in frames
pub const TIER_ARTIFACT_MAX_FRAMES: usize = 3;
pub const TIER_BURST_MAX_FRAMES: usize = 7;
pub const CLEAN_STATS_PERCENTILE: f64 = 0.95;

// --- Quality grading ---
pub const GRADE_MISSING_FRACTION_BRONZE: f64 = 0.05;
pub const GRADE_MISSING_FRACTION_REJECT: f64 = 0.20;

// src/constants.rs
