// src/error.rs

/// Errors raised by the cleaning core.
///
/// Degenerate input (zero time deltas, empty channels) never reaches this type:
/// it is handled locally with a safe default. What ends up here is either a
/// broken precondition/postcondition or a numeric failure the caller must see.
#[derive(Debug, thiserror::Error)]
pub enum CleaningError {
    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timestamps decrease at frame {index} ({previous} s -> {current} s)")]
    NonMonotonicTime {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Cubic spline fit failed: {0}")]
    SplineFit(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Joint {joint}: {source}")]
    InJoint {
        joint: String,
        #[source]
        source: Box<CleaningError>,
    },

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CleaningError {
    pub(crate) fn shape(context: &'static str, expected: impl ToString, found: impl ToString) -> Self {
        CleaningError::ShapeMismatch {
            context,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Attaches the joint being processed
    pub(crate) fn in_joint(self, joint: &str) -> Self {
        CleaningError::InJoint {
            joint: joint.to_string(),
            source: Box::new(self),
        }
    }
}
