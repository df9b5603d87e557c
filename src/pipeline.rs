// src/pipeline.rs
//
// Runs the cleaning stages over every joint of one trial and assembles the report.

use ndarray::{Array2, ArrayView2, Axis};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CleaningConfig, CutoffMode};
use crate::data_analysis::burst_classifier::{classify_velocity, combine_tiers, ClassificationRecord, Tier};
use crate::data_analysis::butterworth::{check_cutoff, lowpass_zero_lag};
use crate::data_analysis::derivative::{angular_velocity_magnitude, calculate_true_velocity, velocity_magnitude};
use crate::data_analysis::gap_filler::{fill_gaps, GapStatistics};
use crate::data_analysis::quaternion::filter_quaternions;
use crate::data_analysis::velocity_artifacts::scan_position_artifacts;
use crate::data_analysis::winter_cutoff::{has_finite_samples, select_cutoffs, JointSignal, WinterSelection};
use crate::data_input::trial_data::{BodyRegion, JointChannels, TrialData};
use crate::error::CleaningError;
use crate::quality::{combine_status, grade_trial, run_status, GradeInputs, QualityGrade, RecordingContext, RunStatus};
use crate::types::FrameArray;

/// Per-joint outcome of the cleaning run
#[derive(Debug, Clone, Serialize)]
pub struct JointReport {
    pub joint: String,
    pub region: BodyRegion,
    /// Outlier cells before dilation
    pub artifact_flags: usize,
    /// Cells rejected after dilation
    pub masked_cells: usize,
    pub gap_fill: Option<GapStatistics>,
    /// Cutoff the joint was filtered with
    pub cutoff_hz: Option<f64>,
    pub winter_analysis_failed: bool,
    /// Position channels present but never finite; left out of cutoff
    /// selection, velocity classification and the missing fraction
    pub skipped: bool,
    pub linear_velocity: Option<ClassificationRecord>,
    pub angular_velocity: Option<ClassificationRecord>,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub clean: usize,
    pub burst: usize,
    pub artifact: usize,
}

impl TierCounts {
    fn from_tiers(tiers: &[Tier]) -> Self {
        let mut counts = TierCounts::default();
        for tier in tiers {
            match tier {
                Tier::Clean => counts.clean += 1,
                Tier::Burst => counts.burst += 1,
                Tier::Artifact => counts.artifact += 1,
            }
        }
        counts
    }
}

/// Serializable summary of one cleaned trial
#[derive(Debug, Clone, Serialize)]
pub struct TrialReport {
    pub crate_version: String,
    pub frames: usize,
    pub sample_rate_hz: Option<f64>,
    pub context: RecordingContext,
    pub config: CleaningConfig,
    pub winter: WinterSelection,
    pub joints: Vec<JointReport>,
    pub frame_tiers: TierCounts,
    pub status: RunStatus,
    pub grade_inputs: GradeInputs,
    pub grade: QualityGrade,
}

/// Cleaned table plus everything downstream consumers need
#[derive(Debug, Clone)]
pub struct CleanedTrial {
    /// Same channels and timestamps as the input, cleaned values
    pub trial: TrialData,
    /// Worst tier across joints, per frame
    pub frame_tiers: Vec<Tier>,
    /// (joint, worst tier of its linear and angular records) per frame
    pub joint_tiers: Vec<(String, Vec<Tier>)>,
    pub report: TrialReport,
}

/// Intermediate per-joint state between the masking and filtering passes
struct PositionStage {
    joint_index: usize,
    columns: [usize; 3],
    raw: FrameArray,
    filled: FrameArray,
    artifact_flags: usize,
    masked_cells: usize,
    gap_stats: GapStatistics,
    skipped: bool,
}

/// Cleans one trial.
///
/// Per joint: true velocity, artifact detection and dilation, masking and gap
/// filling. Then cutoff selection, zero-lag filtering of positions and
/// quaternions, velocity tier classification and grading. The input is not
/// modified.
pub fn clean_trial(
    trial: &TrialData,
    config: &CleaningConfig,
    context: RecordingContext,
) -> Result<CleanedTrial, CleaningError> {
    config.validate()?;
    let n_frames = trial.frame_count();
    let times = trial.times.view();
    let sample_rate_hz = trial.sample_rate();
    let joints = trial.joints();
    if joints.is_empty() {
        return Err(CleaningError::EmptyInput("trial has no joint channels"));
    }
    if sample_rate_hz.is_none() {
        warn!("Sample rate could not be estimated; positions will not be filtered");
    }

    // --- Mask and fill positions ---
    let mut stages: Vec<PositionStage> = Vec::new();
    for (joint_index, joint) in joints.iter().enumerate() {
        let Some(columns) = joint.position else {
            continue;
        };
        let raw = trial.select_columns(&columns);
        let scan = scan_position_artifacts(raw.view(), times, &config.artifact)
            .map_err(|e| e.in_joint(&joint.name))?;
        let gap = fill_gaps(times, scan.masked_positions.view(), &config.gap_fill)
            .map_err(|e| e.in_joint(&joint.name))?;
        let skipped = !has_finite_samples(raw.view());
        if skipped {
            warn!(joint = %joint.name, "No finite position samples; joint skipped");
        }
        debug!(
            joint = %joint.name,
            artifact_flags = scan.raw_flag_count,
            filled_cells = gap.stats.filled_cells,
            "Masked and filled positions"
        );
        stages.push(PositionStage {
            joint_index,
            columns,
            raw,
            filled: gap.filled,
            artifact_flags: scan.raw_flag_count,
            masked_cells: scan.mask.iter().filter(|&&m| m).count(),
            gap_stats: gap.stats,
            skipped,
        });
    }

    // --- Cutoff selection on the filled signals ---
    let signals: Vec<JointSignal> = stages
        .iter()
        .map(|stage| JointSignal {
            name: &joints[stage.joint_index].name,
            region: joints[stage.joint_index].region,
            positions: stage.filled.view(),
        })
        .collect();
    let winter = select_cutoffs(&signals, sample_rate_hz, &config.winter)?;

    // --- Filter and classify ---
    let mut values = trial.values.clone();
    let mut joint_reports = Vec::with_capacity(joints.len());
    let mut joint_tiers = Vec::with_capacity(joints.len());
    let mut records: Vec<ClassificationRecord> = Vec::new();

    for (joint_index, joint) in joints.iter().enumerate() {
        let stage_index = stages.iter().position(|s| s.joint_index == joint_index);
        let stage = stage_index.map(|idx| &stages[idx]);
        let cutoff_metadata = stage_index.and_then(|idx| winter.metadata_for(idx));
        let cutoff_hz = match cutoff_metadata {
            Some(metadata) => Some(metadata.cutoff_hz()),
            None => quaternion_only_cutoff(joint, &winter, config),
        };

        let mut linear = None;
        if let Some(stage) = stage.filter(|s| !s.skipped) {
            let filtered = filter_block(stage.filled.view(), cutoff_hz, sample_rate_hz, &joint.name)?;
            for (slot, &col) in stage.columns.iter().enumerate() {
                values.column_mut(col).assign(&filtered.column(slot));
            }
            let raw_speed = velocity_magnitude(calculate_true_velocity(stage.raw.view(), times)?.view());
            let filtered_speed = velocity_magnitude(calculate_true_velocity(filtered.view(), times)?.view());
            linear = Some(classify_velocity(
                raw_speed.view(),
                filtered_speed.view(),
                &config.linear_burst,
            )?);
        }

        let mut angular = None;
        if let Some(columns) = joint.quaternion {
            let raw_quats = trial.select_columns(&columns);
            let filtered_quats = match (cutoff_hz, sample_rate_hz) {
                (Some(cutoff), Some(fs)) if check_cutoff(cutoff, fs).is_ok() => {
                    filter_quaternions(raw_quats.view(), cutoff, fs)?
                }
                _ => raw_quats.clone(),
            };
            for (slot, &col) in columns.iter().enumerate() {
                values.column_mut(col).assign(&filtered_quats.column(slot));
            }
            let raw_omega = angular_velocity_magnitude(raw_quats.view(), times)?;
            let filtered_omega = angular_velocity_magnitude(filtered_quats.view(), times)?;
            angular = Some(classify_velocity(
                raw_omega.view(),
                filtered_omega.view(),
                &config.angular_burst,
            )?);
        }

        let status = combine_status(
            linear
                .iter()
                .chain(angular.iter())
                .map(|record| run_status(record, context)),
        );
        let tiers = combine_tiers(n_frames, linear.iter().chain(angular.iter()));
        joint_tiers.push((joint.name.clone(), tiers));
        records.extend(linear.iter().cloned());
        records.extend(angular.iter().cloned());

        joint_reports.push(JointReport {
            joint: joint.name.clone(),
            region: joint.region,
            artifact_flags: stage.map_or(0, |s| s.artifact_flags),
            masked_cells: stage.map_or(0, |s| s.masked_cells),
            gap_fill: stage.map(|s| s.gap_stats.clone()),
            cutoff_hz,
            winter_analysis_failed: cutoff_metadata.is_some_and(|m| m.winter_analysis_failed()),
            skipped: stage.is_some_and(|s| s.skipped),
            linear_velocity: linear,
            angular_velocity: angular,
            status,
        });
    }

    // --- Trial-level verdict ---
    let frame_tiers = combine_tiers(n_frames, records.iter());
    let status = combine_status(joint_reports.iter().map(|j| j.status));
    let (missing, total) = stages
        .iter()
        .filter(|s| !s.skipped)
        .fold((0usize, 0usize), |(m, t), s| {
            (m + s.gap_stats.missing_cells_after, t + s.gap_stats.total_cells)
        });
    let grade_inputs = GradeInputs {
        status,
        missing_fraction: if total == 0 { 0.0 } else { missing as f64 / total as f64 },
        winter_analysis_failed: winter.any_failed(),
    };
    let grade = grade_trial(&grade_inputs);

    info!(
        frames = n_frames,
        joints = joints.len(),
        status = ?status,
        grade = grade.name(),
        "Trial cleaned"
    );

    let report = TrialReport {
        crate_version: crate::crate_version().to_string(),
        frames: n_frames,
        sample_rate_hz,
        context,
        config: config.clone(),
        winter,
        joints: joint_reports,
        frame_tiers: TierCounts::from_tiers(&frame_tiers),
        status,
        grade_inputs,
        grade,
    };
    let cleaned = TrialData::new(trial.times.clone(), values, trial.channels.clone())?;

    Ok(CleanedTrial {
        trial: cleaned,
        frame_tiers,
        joint_tiers,
        report,
    })
}

/// Cutoff for a joint that only carries orientation: the global cutoff in
/// trunk-global mode, otherwise the floor of the joint's region.
fn quaternion_only_cutoff(joint: &JointChannels, winter: &WinterSelection, config: &CleaningConfig) -> Option<f64> {
    if joint.quaternion.is_none() {
        return None;
    }
    match winter.mode {
        CutoffMode::TrunkGlobal => winter.analyses.first().map(|m| m.cutoff_hz()),
        CutoffMode::PerSignal => Some(config.winter.min_cutoff_for(joint.region)),
    }
}

/// Zero-lag low-pass of every column, or an unfiltered copy when no usable cutoff exists
fn filter_block(
    block: ArrayView2<f64>,
    cutoff_hz: Option<f64>,
    sample_rate_hz: Option<f64>,
    joint: &str,
) -> Result<FrameArray, CleaningError> {
    let (Some(cutoff), Some(fs)) = (cutoff_hz, sample_rate_hz) else {
        return Ok(block.to_owned());
    };
    if let Err(e) = check_cutoff(cutoff, fs) {
        warn!(joint, "Leaving positions unfiltered: {}", e);
        return Ok(block.to_owned());
    }
    let mut filtered = Array2::<f64>::zeros(block.raw_dim());
    for (axis, column) in block.axis_iter(Axis(1)).enumerate() {
        let smoothed = lowpass_zero_lag(column, cutoff, fs)?;
        filtered.column_mut(axis).assign(&smoothed);
    }
    Ok(filtered)
}
