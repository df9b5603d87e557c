// src/data_analysis/fft_utils.rs

use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;
use realfft::RealFftPlanner;

use crate::error::CleaningError;

/// Forward real FFT of a finite signal. Returns the n/2 + 1 complex bins.
pub fn fft_forward(data: ArrayView1<f64>) -> Result<Array1<Complex64>, CleaningError> {
    if data.is_empty() {
        return Ok(Array1::zeros(0));
    }
    let n = data.len();
    let mut input = data.to_vec();
    let planner = RealFftPlanner::<f64>::new().plan_fft_forward(n);
    let mut output = planner.make_output_vec();
    planner
        .process(&mut input, &mut output)
        .map_err(|e| CleaningError::InvariantViolation(format!("FFT forward processing failed: {e}")))?;
    Ok(Array1::from(output))
}

/// Bin frequencies for a real FFT of length `n` sampled every `d` seconds
pub fn fft_rfftfreq(n: usize, d: f64) -> Array1<f64> {
    if n == 0 || d <= 0.0 {
        return Array1::zeros(0);
    }
    let num_freqs = n / 2 + 1;
    Array1::from_shape_fn(num_freqs, |i| i as f64 / (n as f64 * d))
}

/// Fraction of the signal's (mean-removed) power at or below `cutoff_hz`.
///
/// Returns None for signals that are too short or carry no power at all.
pub fn power_retained_below(
    data: ArrayView1<f64>,
    sample_rate_hz: f64,
    cutoff_hz: f64,
) -> Result<Option<f64>, CleaningError> {
    if data.len() < 4 || sample_rate_hz <= 0.0 {
        return Ok(None);
    }
    let mean = data.mean().unwrap_or(0.0);
    let centered = data.mapv(|v| v - mean);
    let spectrum = fft_forward(centered.view())?;
    let freqs = fft_rfftfreq(data.len(), 1.0 / sample_rate_hz);

    let mut total = 0.0;
    let mut retained = 0.0;
    for (bin, freq) in spectrum.iter().zip(freqs.iter()) {
        let power = bin.norm_sqr();
        total += power;
        if *freq <= cutoff_hz {
            retained += power;
        }
    }
    if total <= f64::EPSILON {
        return Ok(None);
    }
    Ok(Some(retained / total))
}


// src/data_analysis/fft_utils.rs
