// src/data_analysis/burst_classifier.rs

use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use tracing::debug;

use crate::config::BurstThresholds;
use crate::constants::CLEAN_STATS_PERCENTILE;
use crate::data_analysis::contiguous_runs::find_runs;
use crate::data_analysis::robust_stats::{nan_max, nan_quantile};
use crate::error::CleaningError;

/// Severity of a frame, ordered from harmless to implausible
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Clean,
    /// Fast but plausible real movement
    Burst,
    /// Implausible; excluded from clean statistics
    Artifact,
}

impl Tier {
    pub fn name(&self) -> &'static str {
        match self {
            Tier::Clean => "clean",
            Tier::Burst => "burst",
            Tier::Artifact => "artifact",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactReason {
    /// Above the extreme threshold for only a few frames
    ExtremeSpike,
    /// Above the extreme threshold for longer than a spike
    SustainedExtreme,
    /// Above the trigger for longer than any real burst
    SustainedHighVelocity,
}

/// One contiguous excursion above the trigger threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityEvent {
    pub start_frame: usize,
    /// Exclusive
    pub end_frame: usize,
    pub duration_frames: usize,
    pub peak_velocity: f64,
    pub tier: Tier,
    pub reason: Option<ArtifactReason>,
}

/// Max and high percentile over a subset of frames (NaN when the subset is empty)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocitySummary {
    pub frames: usize,
    pub max: f64,
    pub percentile: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CleanStatistics {
    /// Quantile reported in `percentile`
    pub quantile: f64,
    /// Raw velocity over non-artifact frames
    pub raw_clean: VelocitySummary,
    /// Filtered velocity over non-artifact frames
    pub filtered_clean: VelocitySummary,
    /// Raw velocity over every frame
    pub raw_all: VelocitySummary,
    pub filtered_all: VelocitySummary,
    pub artifact_frames: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRecord {
    /// Per-frame tier; exported as a table rather than in the report
    #[serde(skip)]
    pub tiers: Vec<Tier>,
    pub events: Vec<VelocityEvent>,
    pub clean_stats: CleanStatistics,
    pub worst_tier: Tier,
}

impl ClassificationRecord {
    pub fn count(&self, tier: Tier) -> usize {
        self.tiers.iter().filter(|&&t| t == tier).count()
    }

    pub fn has_reason(&self, reason: ArtifactReason) -> bool {
        self.events.iter().any(|e| e.reason == Some(reason))
    }
}

/// Tier and reason for one excursion of `duration` frames peaking at `peak`
pub fn classify_excursion(
    peak: f64,
    duration: usize,
    thresholds: &BurstThresholds,
) -> (Tier, Option<ArtifactReason>) {
    if peak > thresholds.velocity_extreme {
        if duration <= thresholds.tier_artifact_max {
            (Tier::Artifact, Some(ArtifactReason::ExtremeSpike))
        } else {
            (Tier::Artifact, Some(ArtifactReason::SustainedExtreme))
        }
    } else if duration > thresholds.tier_burst_max {
        (Tier::Artifact, Some(ArtifactReason::SustainedHighVelocity))
    } else {
        (Tier::Burst, None)
    }
}

/// Partitions frames into clean / burst / artifact from the raw velocity
/// magnitude and summarises both raw and filtered magnitude.
///
/// Excursions are maximal runs with raw magnitude above the trigger (missing
/// samples never exceed it). Works for linear (m/s) and angular (deg/s)
/// magnitudes alike; only the thresholds differ.
pub fn classify_velocity(
    raw: ArrayView1<f64>,
    filtered: ArrayView1<f64>,
    thresholds: &BurstThresholds,
) -> Result<ClassificationRecord, CleaningError> {
    if raw.len() != filtered.len() {
        return Err(CleaningError::shape(
            "classify_velocity",
            format!("{} filtered frames", raw.len()),
            filtered.len(),
        ));
    }
    thresholds.validate("classify_velocity")?;

    let n_frames = raw.len();
    let mut tiers = vec![Tier::Clean; n_frames];
    let mut events = Vec::new();

    let above_trigger = raw.iter().map(|&v| v > thresholds.velocity_trigger);
    for run in find_runs(above_trigger, 1) {
        let peak = nan_max(raw.slice(ndarray::s![run.start..run.end]));
        let (tier, reason) = classify_excursion(peak, run.len(), thresholds);
        tiers[run.start..run.end].fill(tier);
        events.push(VelocityEvent {
            start_frame: run.start,
            end_frame: run.end,
            duration_frames: run.len(),
            peak_velocity: peak,
            tier,
            reason,
        });
    }

    let keep: Vec<bool> = tiers.iter().map(|&t| t != Tier::Artifact).collect();
    let clean_stats = CleanStatistics {
        quantile: CLEAN_STATS_PERCENTILE,
        raw_clean: summarize(raw, Some(keep.as_slice()))?,
        filtered_clean: summarize(filtered, Some(keep.as_slice()))?,
        raw_all: summarize(raw, None)?,
        filtered_all: summarize(filtered, None)?,
        artifact_frames: keep.iter().filter(|&&k| !k).count(),
    };
    let worst_tier = tiers.iter().copied().max().unwrap_or(Tier::Clean);

    debug!(
        events = events.len(),
        artifact_frames = clean_stats.artifact_frames,
        worst = worst_tier.name(),
        "Velocity classification"
    );

    Ok(ClassificationRecord {
        tiers,
        events,
        clean_stats,
        worst_tier,
    })
}

fn summarize(values: ArrayView1<f64>, keep: Option<&[bool]>) -> Result<VelocitySummary, CleaningError> {
    let selected: Array1<f64> = values
        .iter()
        .enumerate()
        .filter(|(i, v)| v.is_finite() && keep.map_or(true, |k| k[*i]))
        .map(|(_, &v)| v)
        .collect();
    Ok(VelocitySummary {
        frames: selected.len(),
        max: nan_max(selected.view()),
        percentile: nan_quantile(selected.view(), CLEAN_STATS_PERCENTILE)?,
    })
}

/// Worst tier per frame across several records of equal length
pub fn combine_tiers<'a, I>(n_frames: usize, records: I) -> Vec<Tier>
where
    I: IntoIterator<Item = &'a ClassificationRecord>,
{
    let mut combined = vec![Tier::Clean; n_frames];
    for record in records {
        for (slot, &tier) in combined.iter_mut().zip(record.tiers.iter()) {
            *slot = (*slot).max(tier);
        }
    }
    combined
}
