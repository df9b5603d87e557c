// src/config.rs

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::data_input::trial_data::BodyRegion;
use crate::error::CleaningError;

/// How Winter cutoffs are assigned to joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffMode {
    /// Every joint gets its own cutoff with its own regional floor
    PerSignal,
    /// One cutoff from the pooled trunk joints is applied to the whole body
    TrunkGlobal,
}

impl CutoffMode {
    pub fn name(&self) -> &'static str {
        match self {
            CutoffMode::PerSignal => "per-signal",
            CutoffMode::TrunkGlobal => "trunk-global",
        }
    }
}

/// Statistical spike detection on velocity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub mad_multiplier: f64,
    pub dilation_frames: usize,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            mad_multiplier: DEFAULT_MAD_MULTIPLIER,
            dilation_frames: DEFAULT_DILATION_FRAMES,
        }
    }
}

/// Bounded spline gap filling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillConfig {
    /// Longest gap (seconds, measured between the valid frames bracketing it) that is filled
    pub max_gap_s: f64,
    /// Valid runs shorter than this are not used as spline anchors
    pub min_run_frames: usize,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            max_gap_s: DEFAULT_MAX_GAP_S,
            min_run_frames: DEFAULT_MIN_RUN_FRAMES,
        }
    }
}

/// Residual analysis band and biomechanical guardrails
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WinterConfig {
    pub fmin_hz: f64,
    pub fmax_hz: f64,
    pub step_hz: f64,
    pub trunk_min_hz: f64,
    pub distal_min_hz: f64,
    pub absolute_max_hz: f64,
    pub mode: CutoffMode,
}

impl Default for WinterConfig {
    fn default() -> Self {
        Self {
            fmin_hz: WINTER_FMIN_HZ,
            fmax_hz: WINTER_FMAX_HZ,
            step_hz: WINTER_STEP_HZ,
            trunk_min_hz: TRUNK_MIN_CUTOFF_HZ,
            distal_min_hz: DISTAL_MIN_CUTOFF_HZ,
            absolute_max_hz: ABSOLUTE_MAX_CUTOFF_HZ,
            mode: CutoffMode::PerSignal,
        }
    }
}

impl WinterConfig {
    /// Candidate cutoffs fmin, fmin + step, ... up to and including fmax
    pub fn candidates(&self) -> Vec<f64> {
        let count = ((self.fmax_hz - self.fmin_hz) / self.step_hz + 1e-9).floor() as usize + 1;
        (0..count)
            .map(|i| self.fmin_hz + i as f64 * self.step_hz)
            .collect()
    }

    /// Regional floor applied after knee detection
    pub fn min_cutoff_for(&self, region: BodyRegion) -> f64 {
        match region {
            BodyRegion::Trunk => self.trunk_min_hz,
            BodyRegion::Distal => self.distal_min_hz,
        }
    }
}

/// Thresholds for the clean / burst / artifact tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstThresholds {
    pub velocity_trigger: f64,
    pub velocity_extreme: f64,
    /// Extreme excursions up to this many frames are isolated spikes
    pub tier_artifact_max: usize,
    /// Trigger-level excursions longer than this are not physiologically plausible
    pub tier_burst_max: usize,
}

impl BurstThresholds {
    pub fn linear() -> Self {
        Self {
            velocity_trigger: VELOCITY_TRIGGER_M_S,
            velocity_extreme: VELOCITY_EXTREME_M_S,
            tier_artifact_max: TIER_ARTIFACT_MAX_FRAMES,
            tier_burst_max: TIER_BURST_MAX_FRAMES,
        }
    }

    pub fn angular() -> Self {
        Self {
            velocity_trigger: ANGULAR_VELOCITY_TRIGGER_DEG_S,
            velocity_extreme: ANGULAR_VELOCITY_EXTREME_DEG_S,
            tier_artifact_max: TIER_ARTIFACT_MAX_FRAMES,
            tier_burst_max: TIER_BURST_MAX_FRAMES,
        }
    }

    pub fn validate(&self, label: &str) -> Result<(), CleaningError> {
        if !(self.velocity_trigger > 0.0 && self.velocity_trigger < self.velocity_extreme) {
            return Err(CleaningError::InvalidConfig(format!(
                "{label}: velocity_trigger ({}) must be positive and below velocity_extreme ({})",
                self.velocity_trigger, self.velocity_extreme
            )));
        }
        if self.tier_artifact_max >= self.tier_burst_max {
            return Err(CleaningError::InvalidConfig(format!(
                "{label}: tier_artifact_max ({}) must be below tier_burst_max ({})",
                self.tier_artifact_max, self.tier_burst_max
            )));
        }
        Ok(())
    }
}

/// Immutable configuration handed to every stage of a run.
/// Runs with different profiles can execute side by side without sharing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub artifact: ArtifactConfig,
    pub gap_fill: GapFillConfig,
    pub winter: WinterConfig,
    pub linear_burst: BurstThresholds,
    pub angular_burst: BurstThresholds,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            artifact: ArtifactConfig::default(),
            gap_fill: GapFillConfig::default(),
            winter: WinterConfig::default(),
            linear_burst: BurstThresholds::linear(),
            angular_burst: BurstThresholds::angular(),
        }
    }
}

impl CleaningConfig {
    /// Parse a (possibly partial) JSON override on top of the defaults
    pub fn from_json_str(json: &str) -> Result<Self, CleaningError> {
        let config: CleaningConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CleaningError> {
        if !(self.artifact.mad_multiplier.is_finite() && self.artifact.mad_multiplier > 0.0) {
            return Err(CleaningError::InvalidConfig(format!(
                "mad_multiplier must be a positive number, got {}",
                self.artifact.mad_multiplier
            )));
        }
        if !(self.gap_fill.max_gap_s.is_finite() && self.gap_fill.max_gap_s >= 0.0) {
            return Err(CleaningError::InvalidConfig(format!(
                "max_gap_s must be non-negative, got {}",
                self.gap_fill.max_gap_s
            )));
        }
        if self.gap_fill.min_run_frames < 2 {
            return Err(CleaningError::InvalidConfig(
                "min_run_frames must be at least 2 (a spline needs two anchors)".to_string(),
            ));
        }

        let w = &self.winter;
        if !(w.fmin_hz > 0.0 && w.fmax_hz > w.fmin_hz && w.step_hz > 0.0) {
            return Err(CleaningError::InvalidConfig(format!(
                "Winter band must satisfy 0 < fmin < fmax with a positive step (got {}..{} step {})",
                w.fmin_hz, w.fmax_hz, w.step_hz
            )));
        }
        if w.candidates().len() < 3 {
            return Err(CleaningError::InvalidConfig(
                "Winter band must contain at least three candidate cutoffs".to_string(),
            ));
        }
        if w.trunk_min_hz > w.absolute_max_hz || w.distal_min_hz > w.absolute_max_hz {
            return Err(CleaningError::InvalidConfig(format!(
                "Regional minimums ({} / {} Hz) exceed the absolute ceiling ({} Hz)",
                w.trunk_min_hz, w.distal_min_hz, w.absolute_max_hz
            )));
        }

        self.linear_burst.validate("linear_burst")?;
        self.angular_burst.validate("angular_burst")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CleaningConfig::default().validate().is_ok());
    }

    #[test]
    fn test_candidates_cover_band_inclusive() {
        let winter = WinterConfig::default();
        let candidates = winter.candidates();
        assert_eq!(candidates.len(), 23); // 1.0, 1.5, ..., 12.0
        assert_eq!(candidates[0], 1.0);
        assert!((candidates[22] - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_regional_minimums() {
        let winter = WinterConfig::default();
        assert_eq!(winter.min_cutoff_for(BodyRegion::Trunk), 6.0);
        assert_eq!(winter.min_cutoff_for(BodyRegion::Distal), 8.0);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = CleaningConfig::default();
        config.linear_burst.velocity_trigger = 20.0;
        assert!(matches!(
            config.validate(),
            Err(CleaningError::InvalidConfig(_))
        ));

        let mut config = CleaningConfig::default();
        config.angular_burst.tier_artifact_max = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_override_keeps_defaults() {
        let config = CleaningConfig::from_json_str(
            r#"{ "artifact": { "mad_multiplier": 4.5 }, "winter": { "mode": "trunk_global" } }"#,
        )
        .unwrap();
        assert_eq!(config.artifact.mad_multiplier, 4.5);
        assert_eq!(config.artifact.dilation_frames, DEFAULT_DILATION_FRAMES);
        assert_eq!(config.winter.mode, CutoffMode::TrunkGlobal);
        assert_eq!(config.winter.fmax_hz, WINTER_FMAX_HZ);
    }
}
