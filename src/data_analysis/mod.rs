// src/data_analysis/mod.rs

pub mod burst_classifier;
pub mod butterworth;
pub mod contiguous_runs;
pub mod cubic_spline;
pub mod derivative;
pub mod fft_utils;
pub mod gap_filler;
pub mod mask_expander;
pub mod quaternion;
pub mod robust_stats;
pub mod velocity_artifacts;
pub mod winter_cutoff;

// src/data_analysis/mod.rs
