// src/data_analysis/mask_expander.rs

use ndarray::{s, ArrayView2, Axis};

use crate::types::Mask;

/// Dilates a frame x axis mask by `dilation_frames` in both temporal directions.
///
/// Each flagged cell `(i, j)` marks `[i - r, i + r]` (clipped to the array) on
/// axis `j` only, so the ramp into and out of a spike is rejected along with the
/// outlier sample itself. A radius of 0 returns a copy of the input.
pub fn expand_mask(mask: ArrayView2<bool>, dilation_frames: usize) -> Mask {
    let mut expanded = mask.to_owned();
    if dilation_frames == 0 {
        return expanded;
    }
    let n_frames = mask.nrows();

    for (axis_idx, column) in mask.axis_iter(Axis(1)).enumerate() {
        let mut target = expanded.column_mut(axis_idx);
        for (i, &flagged) in column.iter().enumerate() {
            if !flagged {
                continue;
            }
            let lo = i.saturating_sub(dilation_frames);
            let hi = (i + dilation_frames + 1).min(n_frames);
            target.slice_mut(s![lo..hi]).fill(true);
        }
    }
    expanded
}


// src/data_analysis/mask_expander.rs
