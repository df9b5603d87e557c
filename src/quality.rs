// src/quality.rs
//
// Pass/review/fail policy and the trial grade. The classifier only reports tiers;
// every policy decision lives here.

use serde::{Deserialize, Serialize};

use crate::constants::{GRADE_MISSING_FRACTION_BRONZE, GRADE_MISSING_FRACTION_REJECT};
use crate::data_analysis::burst_classifier::{ArtifactReason, ClassificationRecord, Tier};

/// What the session was expected to contain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingContext {
    /// Sprinting, jumping, striking... bursts are expected
    pub expected_high_intensity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pass,
    Review,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    Gold,
    Silver,
    Bronze,
    Reject,
}

impl QualityGrade {
    pub fn name(&self) -> &'static str {
        match self {
            QualityGrade::Gold => "GOLD",
            QualityGrade::Silver => "SILVER",
            QualityGrade::Bronze => "BRONZE",
            QualityGrade::Reject => "REJECT",
        }
    }
}

/// Status of one classification record in its recording context
pub fn run_status(record: &ClassificationRecord, context: RecordingContext) -> RunStatus {
    match record.worst_tier {
        Tier::Clean => RunStatus::Pass,
        Tier::Burst => {
            if context.expected_high_intensity {
                RunStatus::Pass
            } else {
                RunStatus::Review
            }
        }
        Tier::Artifact => {
            if record.has_reason(ArtifactReason::SustainedExtreme) && !context.expected_high_intensity {
                RunStatus::Fail
            } else {
                RunStatus::Review
            }
        }
    }
}

/// Worst status over several records (Pass when there are none)
pub fn combine_status<I: IntoIterator<Item = RunStatus>>(statuses: I) -> RunStatus {
    statuses.into_iter().max().unwrap_or(RunStatus::Pass)
}

/// Everything the grade depends on
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradeInputs {
    pub status: RunStatus,
    /// Share of position cells still missing after gap filling
    pub missing_fraction: f64,
    pub winter_analysis_failed: bool,
}

pub fn grade_trial(inputs: &GradeInputs) -> QualityGrade {
    if inputs.status == RunStatus::Fail || inputs.missing_fraction > GRADE_MISSING_FRACTION_REJECT {
        QualityGrade::Reject
    } else if inputs.winter_analysis_failed || inputs.missing_fraction > GRADE_MISSING_FRACTION_BRONZE {
        QualityGrade::Bronze
    } else if inputs.status == RunStatus::Review {
        QualityGrade::Silver
    } else {
        QualityGrade::Gold
    }
}
