// src/data_analysis/gap_filler.rs
//
// Bounded gap filling: short dropouts between trusted valid runs are bridged by
// a cubic spline, everything else stays missing.

use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use tracing::debug;

use crate::config::GapFillConfig;
use crate::data_analysis::contiguous_runs::{find_runs, FrameRun};
use crate::data_analysis::cubic_spline::NaturalCubicSpline;
use crate::error::CleaningError;
use crate::types::FrameArray;

/// Bookkeeping for one gap-fill pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapStatistics {
    pub total_cells: usize,
    /// Cells missing in the input
    pub missing_cells_before: usize,
    /// Cells written by the spline
    pub filled_cells: usize,
    /// Cells still missing after filling
    pub missing_cells_after: usize,
    /// Gaps between anchors that were bridged
    pub filled_gaps: usize,
    /// Gaps between anchors longer than the ceiling
    pub long_gaps: usize,
    /// Longest stretch of incomplete frames left in the output
    pub longest_missing_run_frames: usize,
}

impl GapStatistics {
    /// Fraction of cells still missing after filling (0 for an empty block)
    pub fn missing_fraction(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.missing_cells_after as f64 / self.total_cells as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct GapFillResult {
    /// Same shape as the input
    pub filled: FrameArray,
    pub stats: GapStatistics,
}

/// Fills short gaps in a frame x channel block.
///
/// 1. A frame is valid when every channel is finite.
/// 2. Valid runs shorter than `min_run_frames` are not trusted as anchors.
/// 3. The gap between consecutive anchor runs lasts from the last valid frame
///    before it to the first valid frame after it. Gaps up to `max_gap_s` chain
///    their anchors into one span; a longer gap ends the span.
/// 4. Each span gets one spline per channel through all of its anchor samples,
///    evaluated only at the missing cells of its short gaps.
///
/// Data before the first anchor, after the last anchor, and inside long gaps is
/// left missing. Finite cells are never modified.
pub fn fill_gaps(
    times: ArrayView1<f64>,
    positions: ArrayView2<f64>,
    config: &GapFillConfig,
) -> Result<GapFillResult, CleaningError> {
    let n_frames = positions.nrows();
    let n_channels = positions.ncols();
    if times.len() != n_frames {
        return Err(CleaningError::shape(
            "fill_gaps",
            format!("{} frames", times.len()),
            format!("{} frames", n_frames),
        ));
    }

    let mut filled = positions.to_owned();
    let mut stats = GapStatistics {
        total_cells: n_frames * n_channels,
        missing_cells_before: positions.iter().filter(|v| !v.is_finite()).count(),
        ..GapStatistics::default()
    };

    let valid_rows = positions
        .axis_iter(Axis(0))
        .map(|row| row.iter().all(|v| v.is_finite()));
    let anchors = find_runs(valid_rows, config.min_run_frames);

    // --- Chain anchors across short gaps ---
    let mut spans: Vec<Vec<FrameRun>> = Vec::new();
    for run in anchors {
        let previous = spans.last().and_then(|span| span.last().copied());
        match previous {
            Some(previous) if times[run.start] - times[previous.last()] <= config.max_gap_s => {
                if let Some(span) = spans.last_mut() {
                    span.push(run);
                }
            }
            Some(_) => {
                stats.long_gaps += 1;
                spans.push(vec![run]);
            }
            None => spans.push(vec![run]),
        }
    }

    // --- Spline per span and channel ---
    for span in spans.iter().filter(|span| span.len() >= 2) {
        let knot_frames: Vec<usize> = span.iter().flat_map(|run| run.start..run.end).collect();
        let (first_frame, last_frame) = (span[0].start, span[span.len() - 1].last());
        let knot_times: Vec<f64> = knot_frames.iter().map(|&i| times[i]).collect();
        let gaps: Vec<FrameRun> = span
            .windows(2)
            .map(|pair| FrameRun::new(pair[0].end, pair[1].start))
            .collect();
        stats.filled_gaps += gaps.len();

        for channel in 0..n_channels {
            let knot_values: Vec<f64> = knot_frames
                .iter()
                .map(|&i| positions[[i, channel]])
                .collect();
            let spline = NaturalCubicSpline::fit(&knot_times, &knot_values).map_err(|e| match e {
                CleaningError::SplineFit(detail) => CleaningError::SplineFit(format!(
                    "frames {first_frame}..={last_frame}, channel {channel}: {detail}"
                )),
                other => other,
            })?;

            for gap in &gaps {
                for frame in gap.start..gap.end {
                    if filled[[frame, channel]].is_finite() {
                        continue;
                    }
                    if let Some(value) = spline.evaluate(times[frame]) {
                        filled[[frame, channel]] = value;
                        stats.filled_cells += 1;
                    }
                }
            }
        }
    }

    if filled.dim() != positions.dim() {
        return Err(CleaningError::InvariantViolation(format!(
            "gap filler changed the array shape from {:?} to {:?}",
            positions.dim(),
            filled.dim()
        )));
    }

    stats.missing_cells_after = filled.iter().filter(|v| !v.is_finite()).count();
    let incomplete_rows = filled
        .axis_iter(Axis(0))
        .map(|row| row.iter().any(|v| !v.is_finite()));
    stats.longest_missing_run_frames = find_runs(incomplete_rows, 1)
        .iter()
        .map(|run| run.len())
        .max()
        .unwrap_or(0);

    debug!(
        filled_cells = stats.filled_cells,
        missing_before = stats.missing_cells_before,
        missing_after = stats.missing_cells_after,
        long_gaps = stats.long_gaps,
        "Gap fill complete"
    );

    Ok(GapFillResult { filled, stats })
}


// src/data_analysis/gap_filler.rs
