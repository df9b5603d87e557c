// src/data_analysis/winter_cutoff.rs
//
// Winter residual analysis: sweep candidate low-pass cutoffs, find the knee of the
// residual curve, then clamp it to the biomechanical floor of the body region.

use ndarray::{s, ArrayView1, ArrayView2};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{CutoffMode, WinterConfig};
use crate::constants::{BAND_EDGE_MARGIN_HZ, FILTFILT_PADLEN, KNEE_MIN_DIFFERENCE, MIN_WINTER_SAMPLES};
use crate::data_analysis::butterworth::{check_cutoff, filtfilt, Biquad};
use crate::data_analysis::contiguous_runs::finite_runs;
use crate::data_analysis::fft_utils::power_retained_below;
use crate::data_input::trial_data::{BodyRegion, ChannelKind, ChannelName};
use crate::error::CleaningError;
use crate::types::ResidualCurve;

/// Residual spans below this are treated as a flat curve (nothing to smooth)
const FLAT_RESIDUAL_RANGE: f64 = 1e-12;

const POSITION_KINDS: [ChannelKind; 3] = [
    ChannelKind::PositionX,
    ChannelKind::PositionY,
    ChannelKind::PositionZ,
];

/// Why the residual analysis could not produce a trustworthy cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WinterFailure {
    /// Curve flat, monotone without a bend, or bend too weak
    NoInteriorKnee,
    /// A knee exists but sits within the margin below the band top
    KneeAtBandEdge { knee_hz: f64 },
    /// Representative signal missing, too short, or no usable candidates
    InsufficientData,
    /// Trunk-global mode without any trunk joint
    NoTrunkSignal,
}

impl WinterFailure {
    pub fn describe(&self) -> String {
        match self {
            WinterFailure::NoInteriorKnee => "no interior knee in the residual curve".to_string(),
            WinterFailure::KneeAtBandEdge { knee_hz } => {
                format!("knee at {knee_hz:.1} Hz is at the top of the search band")
            }
            WinterFailure::InsufficientData => "not enough finite samples to analyse".to_string(),
            WinterFailure::NoTrunkSignal => "no trunk joint available for a global cutoff".to_string(),
        }
    }
}

/// Knee detection plus guardrails, as one inspectable outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CutoffDecision {
    Selected {
        cutoff_hz: f64,
        /// Knee before clamping
        raw_knee_hz: f64,
        region: BodyRegion,
        /// True when the regional floor or the ceiling moved the knee
        guardrail_applied: bool,
    },
    Failed {
        reason: WinterFailure,
        fallback_cutoff_hz: f64,
    },
}

impl CutoffDecision {
    /// Cutoff to filter with, whether selected or fallback
    pub fn cutoff_hz(&self) -> f64 {
        match self {
            CutoffDecision::Selected { cutoff_hz, .. } => *cutoff_hz,
            CutoffDecision::Failed {
                fallback_cutoff_hz, ..
            } => *fallback_cutoff_hz,
        }
    }

    pub fn winter_analysis_failed(&self) -> bool {
        matches!(self, CutoffDecision::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchBand {
    pub fmin_hz: f64,
    pub fmax_hz: f64,
    pub step_hz: f64,
}

impl SearchBand {
    fn from_config(config: &WinterConfig) -> Self {
        Self {
            fmin_hz: config.fmin_hz,
            fmax_hz: config.fmax_hz,
            step_hz: config.step_hz,
        }
    }
}

/// Audit record of one Winter analysis
#[derive(Debug, Clone, Serialize)]
pub struct CutoffMetadata {
    /// Joint name, or "trunk_global"
    pub signal: String,
    pub region: BodyRegion,
    pub representative_channels: Vec<String>,
    pub band: SearchBand,
    pub sample_rate_hz: Option<f64>,
    pub decision: CutoffDecision,
    pub residual_curve: ResidualCurve,
    /// Share of the representative signal's power at or below the cutoff
    pub power_retained: Option<f64>,
}

impl CutoffMetadata {
    pub fn cutoff_hz(&self) -> f64 {
        self.decision.cutoff_hz()
    }

    pub fn winter_analysis_failed(&self) -> bool {
        self.decision.winter_analysis_failed()
    }
}

/// Position block of one joint handed to the selector
#[derive(Debug, Clone, Copy)]
pub struct JointSignal<'a> {
    pub name: &'a str,
    pub region: BodyRegion,
    /// Frame x 3 gap-filled positions
    pub positions: ArrayView2<'a, f64>,
}

/// Cutoffs for a whole trial. `joint_analysis[i]` indexes `analyses` for joint `i`,
/// None when the joint had no finite position to analyse.
#[derive(Debug, Clone, Serialize)]
pub struct WinterSelection {
    pub mode: CutoffMode,
    pub analyses: Vec<CutoffMetadata>,
    pub joint_analysis: Vec<Option<usize>>,
}

impl WinterSelection {
    pub fn metadata_for(&self, joint_index: usize) -> Option<&CutoffMetadata> {
        self.joint_analysis
            .get(joint_index)
            .copied()
            .flatten()
            .and_then(|idx| self.analyses.get(idx))
    }

    pub fn cutoff_for(&self, joint_index: usize) -> Option<f64> {
        self.metadata_for(joint_index).map(CutoffMetadata::cutoff_hz)
    }

    pub fn any_failed(&self) -> bool {
        self.analyses.iter().any(CutoffMetadata::winter_analysis_failed)
    }
}

/// False for an empty or entirely missing block
pub fn has_finite_samples(positions: ArrayView2<f64>) -> bool {
    positions.iter().any(|v| v.is_finite())
}

/// Position axis with the largest variance over its finite samples
pub fn representative_axis(positions: ArrayView2<f64>) -> Option<usize> {
    (0..positions.ncols())
        .filter_map(|axis| finite_variance(positions.column(axis)).map(|var| (axis, var)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(axis, _)| axis)
}

fn finite_variance(values: ArrayView1<f64>) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    Some(finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64)
}

/// Finite segments long enough for zero-lag filtering, across all channels
fn filterable_segments(channels: &[ArrayView1<f64>]) -> Vec<Vec<f64>> {
    let mut segments = Vec::new();
    for channel in channels {
        for run in finite_runs(channel.iter(), FILTFILT_PADLEN + 1) {
            segments.push(channel.slice(s![run.start..run.end]).to_vec());
        }
    }
    segments
}

/// RMS of (filtered - raw) for each candidate, pooled over every filterable
/// segment of every channel. Empty when nothing can be filtered.
pub fn residual_curve(
    channels: &[ArrayView1<f64>],
    sample_rate_hz: f64,
    candidates: &[f64],
) -> Result<ResidualCurve, CleaningError> {
    let segments = filterable_segments(channels);
    let sample_count: usize = segments.iter().map(Vec::len).sum();
    if sample_count == 0 {
        return Ok(Vec::new());
    }

    let mut curve = Vec::with_capacity(candidates.len());
    for &cutoff_hz in candidates {
        let section = Biquad::butterworth_lowpass(cutoff_hz, sample_rate_hz)?;
        let mut sum_sq = 0.0;
        for segment in &segments {
            let filtered = filtfilt(&section, segment)?;
            sum_sq += filtered
                .iter()
                .zip(segment.iter())
                .map(|(f, r)| (f - r).powi(2))
                .sum::<f64>();
        }
        curve.push((cutoff_hz, (sum_sq / sample_count as f64).sqrt()));
    }
    Ok(curve)
}

/// Knee of a decreasing residual curve.
///
/// Kneedle decides whether there is a knee at all: with both axes normalised to
/// [0, 1], the bend `(1 - y) - x` above the chord must peak at an interior
/// candidate and exceed a minimum. The knee itself is the breakpoint of the
/// best two-segment line fit (least total squared error, at least three
/// candidates per segment), which tracks the cutoff more closely than the
/// Kneedle maximum on smoothly rolling-off curves.
pub fn find_knee(curve: &[(f64, f64)]) -> Option<f64> {
    if curve.len() < 3 {
        return None;
    }
    let x_first = curve[0].0;
    let x_last = curve[curve.len() - 1].0;
    let (y_min, y_max) = curve
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    if !(x_last > x_first) || !(y_max - y_min > FLAT_RESIDUAL_RANGE) {
        return None;
    }

    let (best_idx, best_diff) = curve
        .iter()
        .map(|&(x, y)| {
            let x_norm = (x - x_first) / (x_last - x_first);
            let y_norm = (y - y_min) / (y_max - y_min);
            (1.0 - y_norm) - x_norm
        })
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bd), (i, d)| {
            if d > bd {
                (i, d)
            } else {
                (bi, bd)
            }
        });

    if best_idx == 0 || best_idx == curve.len() - 1 || best_diff <= KNEE_MIN_DIFFERENCE {
        return None;
    }
    let knee_idx = two_segment_breakpoint(curve).unwrap_or(best_idx);
    Some(curve[knee_idx].0)
}

/// Index splitting the curve into the two straight lines that fit it best.
/// The breakpoint belongs to both segments. None below five points.
fn two_segment_breakpoint(curve: &[(f64, f64)]) -> Option<usize> {
    if curve.len() < 5 {
        return None;
    }
    (2..curve.len() - 2)
        .map(|k| (k, line_fit_sse(&curve[..=k]) + line_fit_sse(&curve[k..])))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(k, _)| k)
}

/// Sum of squared residuals of the least-squares line through `points`
fn line_fit_sse(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - mean_x) * (p.1 - mean_y)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    points
        .iter()
        .map(|p| (p.1 - mean_y - slope * (p.0 - mean_x)).powi(2))
        .sum()
}

/// Applies the band-edge check and the regional guardrails to a knee.
///
/// `band_top_hz` is the highest candidate actually analysed.
/// Selected cutoffs are `min(max(knee, region_min), absolute_max)`.
pub fn apply_guardrails(
    knee_hz: Option<f64>,
    region: BodyRegion,
    band_top_hz: f64,
    config: &WinterConfig,
) -> CutoffDecision {
    let clamp = |f: f64| f.max(config.min_cutoff_for(region)).min(config.absolute_max_hz);
    let fallback = band_top_hz.min(config.absolute_max_hz);

    match knee_hz {
        None => CutoffDecision::Failed {
            reason: WinterFailure::NoInteriorKnee,
            fallback_cutoff_hz: fallback,
        },
        Some(knee) if knee >= band_top_hz - BAND_EDGE_MARGIN_HZ => CutoffDecision::Failed {
            reason: WinterFailure::KneeAtBandEdge { knee_hz: knee },
            fallback_cutoff_hz: clamp(knee).min(fallback),
        },
        Some(knee) => {
            let cutoff_hz = clamp(knee);
            CutoffDecision::Selected {
                cutoff_hz,
                raw_knee_hz: knee,
                region,
                guardrail_applied: cutoff_hz != knee,
            }
        }
    }
}

/// Candidates usable at this sample rate
fn usable_candidates(config: &WinterConfig, sample_rate_hz: f64) -> Vec<f64> {
    config
        .candidates()
        .into_iter()
        .filter(|&f| check_cutoff(f, sample_rate_hz).is_ok())
        .collect()
}

fn failed_metadata(
    signal: &str,
    region: BodyRegion,
    representative_channels: Vec<String>,
    sample_rate_hz: Option<f64>,
    config: &WinterConfig,
    reason: WinterFailure,
) -> CutoffMetadata {
    let metadata = CutoffMetadata {
        signal: signal.to_string(),
        region,
        representative_channels,
        band: SearchBand::from_config(config),
        sample_rate_hz,
        decision: CutoffDecision::Failed {
            reason,
            fallback_cutoff_hz: config.fmax_hz.min(config.absolute_max_hz),
        },
        residual_curve: Vec::new(),
        power_retained: None,
    };
    log_failure(&metadata);
    metadata
}

fn log_failure(metadata: &CutoffMetadata) {
    if let CutoffDecision::Failed {
        reason,
        fallback_cutoff_hz,
    } = metadata.decision
    {
        warn!(
            signal = %metadata.signal,
            fallback_hz = fallback_cutoff_hz,
            "Winter analysis failed ({}); falling back to {:.1} Hz",
            reason.describe(),
            fallback_cutoff_hz
        );
    }
}

/// Residual sweep, knee and guardrails over a set of representative channels
fn analyze_channels(
    signal: &str,
    region: BodyRegion,
    channels: &[ArrayView1<f64>],
    channel_names: Vec<String>,
    sample_rate_hz: Option<f64>,
    config: &WinterConfig,
) -> Result<CutoffMetadata, CleaningError> {
    let Some(fs) = sample_rate_hz else {
        return Ok(failed_metadata(
            signal,
            region,
            channel_names,
            sample_rate_hz,
            config,
            WinterFailure::InsufficientData,
        ));
    };
    let candidates = usable_candidates(config, fs);
    let sample_count: usize = filterable_segments(channels).iter().map(Vec::len).sum();
    if candidates.len() < 3 || sample_count < MIN_WINTER_SAMPLES {
        return Ok(failed_metadata(
            signal,
            region,
            channel_names,
            sample_rate_hz,
            config,
            WinterFailure::InsufficientData,
        ));
    }

    let curve = residual_curve(channels, fs, &candidates)?;
    let band_top_hz = candidates[candidates.len() - 1];
    let knee = find_knee(&curve);
    let decision = apply_guardrails(knee, region, band_top_hz, config);

    let power_retained = match channels.first() {
        Some(channel) => longest_finite_segment(*channel)
            .map(|segment| power_retained_below(segment, fs, decision.cutoff_hz()))
            .transpose()?
            .flatten(),
        None => None,
    };

    let metadata = CutoffMetadata {
        signal: signal.to_string(),
        region,
        representative_channels: channel_names,
        band: SearchBand::from_config(config),
        sample_rate_hz: Some(fs),
        decision,
        residual_curve: curve,
        power_retained,
    };
    if metadata.winter_analysis_failed() {
        log_failure(&metadata);
    } else {
        debug!(
            signal = %metadata.signal,
            knee_hz = ?knee,
            cutoff_hz = metadata.cutoff_hz(),
            "Winter cutoff selected"
        );
    }
    Ok(metadata)
}

fn longest_finite_segment(channel: ArrayView1<f64>) -> Option<ArrayView1<f64>> {
    finite_runs(channel.iter(), 1)
        .into_iter()
        .max_by_key(|run| run.len())
        .map(|run| channel.slice_move(s![run.start..run.end]))
}

/// Per-signal analysis of one joint's position triple
pub fn analyze_signal(
    joint: &JointSignal,
    sample_rate_hz: Option<f64>,
    config: &WinterConfig,
) -> Result<CutoffMetadata, CleaningError> {
    let Some(axis) = representative_axis(joint.positions) else {
        return Ok(failed_metadata(
            joint.name,
            joint.region,
            Vec::new(),
            sample_rate_hz,
            config,
            WinterFailure::InsufficientData,
        ));
    };
    let channel_name = ChannelName::new(joint.name, POSITION_KINDS[axis]).header();
    analyze_channels(
        joint.name,
        joint.region,
        &[joint.positions.column(axis)],
        vec![channel_name],
        sample_rate_hz,
        config,
    )
}

/// One cutoff from the pooled trunk joints, under the trunk guardrail
pub fn analyze_trunk_global(
    joints: &[JointSignal],
    sample_rate_hz: Option<f64>,
    config: &WinterConfig,
) -> Result<CutoffMetadata, CleaningError> {
    let mut channels = Vec::new();
    let mut names = Vec::new();
    for joint in joints.iter().filter(|j| j.region == BodyRegion::Trunk) {
        if let Some(axis) = representative_axis(joint.positions) {
            channels.push(joint.positions.column(axis));
            names.push(ChannelName::new(joint.name, POSITION_KINDS[axis]).header());
        }
    }
    if channels.is_empty() {
        return Ok(failed_metadata(
            "trunk_global",
            BodyRegion::Trunk,
            names,
            sample_rate_hz,
            config,
            WinterFailure::NoTrunkSignal,
        ));
    }
    analyze_channels(
        "trunk_global",
        BodyRegion::Trunk,
        &channels,
        names,
        sample_rate_hz,
        config,
    )
}

/// Cutoff for every joint according to the configured mode.
///
/// Joints without a single finite position are skipped: they get no analysis
/// and cannot mark the selection as failed.
pub fn select_cutoffs(
    joints: &[JointSignal],
    sample_rate_hz: Option<f64>,
    config: &WinterConfig,
) -> Result<WinterSelection, CleaningError> {
    for joint in joints.iter().filter(|j| !has_finite_samples(j.positions)) {
        debug!(joint = joint.name, "No finite positions; skipped by cutoff selection");
    }
    match config.mode {
        CutoffMode::PerSignal => {
            let mut analyses = Vec::new();
            let mut joint_analysis = Vec::with_capacity(joints.len());
            for joint in joints {
                if has_finite_samples(joint.positions) {
                    joint_analysis.push(Some(analyses.len()));
                    analyses.push(analyze_signal(joint, sample_rate_hz, config)?);
                } else {
                    joint_analysis.push(None);
                }
            }
            Ok(WinterSelection {
                mode: config.mode,
                analyses,
                joint_analysis,
            })
        }
        CutoffMode::TrunkGlobal => {
            let global = analyze_trunk_global(joints, sample_rate_hz, config)?;
            Ok(WinterSelection {
                mode: config.mode,
                analyses: vec![global],
                joint_analysis: joints
                    .iter()
                    .map(|j| has_finite_samples(j.positions).then_some(0))
                    .collect(),
            })
        }
    }
}


// src/data_analysis/winter_cutoff.rs
