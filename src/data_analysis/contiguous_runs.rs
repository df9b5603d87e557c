// src/data_analysis/contiguous_runs.rs

use serde::Serialize;

/// Half-open frame interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameRun {
    pub start: usize,
    pub end: usize,
}

impl FrameRun {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Last frame inside the run
    pub fn last(&self) -> usize {
        self.end - 1
    }
}

/// Finds maximal runs of `true` of at least `min_len` frames.
///
/// Shared by the gap filler (valid rows), the zero-lag filter (finite samples)
/// and the burst classifier (frames above trigger) so that all three agree on
/// where a run starts and ends.
pub fn find_runs<I>(flags: I, min_len: usize) -> Vec<FrameRun>
where
    I: IntoIterator<Item = bool>,
{
    let mut runs = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut n = 0usize;

    for (i, flag) in flags.into_iter().enumerate() {
        match (flag, current_start) {
            (true, None) => current_start = Some(i),
            (false, Some(start)) => {
                if i - start >= min_len.max(1) {
                    runs.push(FrameRun::new(start, i));
                }
                current_start = None;
            }
            _ => {}
        }
        n = i + 1;
    }
    if let Some(start) = current_start {
        if n - start >= min_len.max(1) {
            runs.push(FrameRun::new(start, n));
        }
    }
    runs
}

/// Runs of finite values in a slice-like sequence
pub fn finite_runs<'a, I>(values: I, min_len: usize) -> Vec<FrameRun>
where
    I: IntoIterator<Item = &'a f64>,
{
    find_runs(values.into_iter().map(|v| v.is_finite()), min_len)
}
