// src/data_input/trial_data.rs

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::MIN_TIME_DELTA_S;
use crate::error::CleaningError;

/// Separator between joint name and component suffix in column headers
pub const CHANNEL_SEPARATOR: &str = "__";

/// Component encoded by a column suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    PositionX,
    PositionY,
    PositionZ,
    QuatX,
    QuatY,
    QuatZ,
    QuatW,
}

impl ChannelKind {
    /// Parse a column suffix (case-insensitive). Bare x/y/z are position aliases.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim().to_ascii_lowercase().as_str() {
            "px" | "x" => Some(ChannelKind::PositionX),
            "py" | "y" => Some(ChannelKind::PositionY),
            "pz" | "z" => Some(ChannelKind::PositionZ),
            "qx" => Some(ChannelKind::QuatX),
            "qy" => Some(ChannelKind::QuatY),
            "qz" => Some(ChannelKind::QuatZ),
            "qw" => Some(ChannelKind::QuatW),
            _ => None,
        }
    }

    /// Canonical suffix used when writing tables
    pub fn suffix(&self) -> &'static str {
        match self {
            ChannelKind::PositionX => "px",
            ChannelKind::PositionY => "py",
            ChannelKind::PositionZ => "pz",
            ChannelKind::QuatX => "qx",
            ChannelKind::QuatY => "qy",
            ChannelKind::QuatZ => "qz",
            ChannelKind::QuatW => "qw",
        }
    }

    /// Slot within the position triple, if this is a position component
    pub fn position_slot(&self) -> Option<usize> {
        match self {
            ChannelKind::PositionX => Some(0),
            ChannelKind::PositionY => Some(1),
            ChannelKind::PositionZ => Some(2),
            _ => None,
        }
    }

    /// Slot within the (x, y, z, w) quaternion, if this is a quaternion component
    pub fn quat_slot(&self) -> Option<usize> {
        match self {
            ChannelKind::QuatX => Some(0),
            ChannelKind::QuatY => Some(1),
            ChannelKind::QuatZ => Some(2),
            ChannelKind::QuatW => Some(3),
            _ => None,
        }
    }
}

/// A `<joint>__<suffix>` column name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName {
    pub joint: String,
    pub kind: ChannelKind,
}

impl ChannelName {
    pub fn new(joint: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            joint: joint.into(),
            kind,
        }
    }

    /// Parse a header such as `LeftHand__px`. Splits on the last separator so joint
    /// names may themselves contain double underscores.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (joint, suffix) = header.rsplit_once(CHANNEL_SEPARATOR)?;
        if joint.is_empty() {
            return None;
        }
        ChannelKind::from_suffix(suffix).map(|kind| ChannelName::new(joint, kind))
    }

    pub fn header(&self) -> String {
        format!("{}{}{}", self.joint, CHANNEL_SEPARATOR, self.kind.suffix())
    }
}

/// Anatomical grouping used for the Winter guardrails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRegion {
    /// Core / torso points: slower motion, lower cutoff floor
    Trunk,
    /// Everything else, extremities in particular: higher cutoff floor
    Distal,
}

const TRUNK_KEYWORDS: [&str; 12] = [
    "pelvis", "hips", "spine", "chest", "torso", "abdomen", "thorax", "neck", "sternum", "root",
    "waist", "hipcenter",
];

impl BodyRegion {
    /// Classify a joint by name. Unknown joints fall into `Distal` so that the
    /// higher floor protects them from oversmoothing.
    pub fn from_joint_name(joint: &str) -> Self {
        let normalized: String = joint
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if TRUNK_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
            BodyRegion::Trunk
        } else {
            BodyRegion::Distal
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BodyRegion::Trunk => "trunk",
            BodyRegion::Distal => "distal",
        }
    }
}

/// Column indices belonging to one tracked joint
#[derive(Debug, Clone, PartialEq)]
pub struct JointChannels {
    pub name: String,
    pub region: BodyRegion,
    /// X, Y, Z position columns (present only when all three exist)
    pub position: Option<[usize; 3]>,
    /// X, Y, Z, W quaternion columns (present only when all four exist)
    pub quaternion: Option<[usize; 4]>,
}

/// One recorded trial: timestamps plus a frame x channel table.
#[derive(Debug, Clone)]
pub struct TrialData {
    pub times: Array1<f64>,
    pub values: Array2<f64>,
    pub channels: Vec<ChannelName>,
}

impl TrialData {
    /// Build a trial, enforcing the shape invariants and non-decreasing time.
    pub fn new(
        times: Array1<f64>,
        values: Array2<f64>,
        channels: Vec<ChannelName>,
    ) -> Result<Self, CleaningError> {
        if times.len() != values.nrows() {
            return Err(CleaningError::shape(
                "TrialData rows",
                times.len(),
                values.nrows(),
            ));
        }
        if channels.len() != values.ncols() {
            return Err(CleaningError::shape(
                "TrialData channels",
                channels.len(),
                values.ncols(),
            ));
        }
        for i in 1..times.len() {
            if !(times[i] >= times[i - 1]) {
                return Err(CleaningError::NonMonotonicTime {
                    index: i,
                    previous: times[i - 1],
                    current: times[i],
                });
            }
        }
        Ok(Self {
            times,
            values,
            channels,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.times.len()
    }

    /// Group columns by joint in first-appearance order
    pub fn joints(&self) -> Vec<JointChannels> {
        let mut order: Vec<String> = Vec::new();
        let mut positions: Vec<[Option<usize>; 3]> = Vec::new();
        let mut quats: Vec<[Option<usize>; 4]> = Vec::new();

        for (col, channel) in self.channels.iter().enumerate() {
            let idx = match order.iter().position(|j| j == &channel.joint) {
                Some(idx) => idx,
                None => {
                    order.push(channel.joint.clone());
                    positions.push([None; 3]);
                    quats.push([None; 4]);
                    order.len() - 1
                }
            };
            if let Some(slot) = channel.kind.position_slot() {
                positions[idx][slot] = Some(col);
            }
            if let Some(slot) = channel.kind.quat_slot() {
                quats[idx][slot] = Some(col);
            }
        }

        order
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let position = match positions[idx] {
                    [Some(x), Some(y), Some(z)] => Some([x, y, z]),
                    _ => None,
                };
                let quaternion = match quats[idx] {
                    [Some(x), Some(y), Some(z), Some(w)] => Some([x, y, z, w]),
                    _ => None,
                };
                JointChannels {
                    region: BodyRegion::from_joint_name(&name),
                    name,
                    position,
                    quaternion,
                }
            })
            .collect()
    }

    /// Copy of the selected columns as a frame x k block
    pub fn select_columns(&self, columns: &[usize]) -> Array2<f64> {
        self.values.select(Axis(1), columns)
    }

    /// Average sampling rate from the positive timestamp deltas
    pub fn sample_rate(&self) -> Option<f64> {
        estimate_sample_rate(self.times.view())
    }
}

/// Estimates the sampling rate (Hz) as 1 / mean of the non-degenerate time deltas.
/// Returns None when fewer than two distinct timestamps are available.
pub fn estimate_sample_rate(times: ArrayView1<f64>) -> Option<f64> {
    let mut total_delta = 0.0;
    let mut count = 0usize;
    for i in 1..times.len() {
        let delta = times[i] - times[i - 1];
        if delta.is_finite() && delta > MIN_TIME_DELTA_S {
            total_delta += delta;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(1.0 / (total_delta / count as f64))
}
