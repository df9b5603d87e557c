// src/data_analysis/butterworth.rs

use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use std::f64::consts::{PI, SQRT_2};

use crate::constants::{FILTFILT_PADLEN, MAX_CUTOFF_NYQUIST_FRACTION};
use crate::data_analysis::contiguous_runs::finite_runs;
use crate::error::CleaningError;

/// Second-order IIR section, `a[0]` normalised to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// 2nd-order Butterworth low-pass via the bilinear transform with prewarping,
    /// so the digital -3 dB point lands exactly on `cutoff_hz`.
    pub fn butterworth_lowpass(cutoff_hz: f64, sample_rate_hz: f64) -> Result<Self, CleaningError> {
        check_cutoff(cutoff_hz, sample_rate_hz)?;

        let k = (PI * cutoff_hz / sample_rate_hz).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + SQRT_2 * k + k2);
        let b0 = k2 * norm;
        Ok(Self {
            b: [b0, 2.0 * b0, b0],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - SQRT_2 * k + k2) * norm],
        })
    }

    /// Transposed direct form II state for a unit-step steady state
    fn steady_state(&self) -> [f64; 2] {
        let z2 = self.b[2] - self.a[2];
        let z1 = self.b[1] + self.b[2] - self.a[1] - self.a[2];
        [z1, z2]
    }

    /// Runs the section over `data` starting from state `zi`
    pub fn filter(&self, data: &[f64], zi: [f64; 2]) -> Vec<f64> {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let [mut z1, mut z2] = zi;
        data.iter()
            .map(|&x| {
                let y = b0 * x + z1;
                z1 = b1 * x - a1 * y + z2;
                z2 = b2 * x - a2 * y;
                y
            })
            .collect()
    }
}

/// Cutoff must be positive and below the Nyquist limit
pub fn check_cutoff(cutoff_hz: f64, sample_rate_hz: f64) -> Result<(), CleaningError> {
    if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
        return Err(CleaningError::InvalidConfig(format!(
            "sample rate must be positive, got {sample_rate_hz}"
        )));
    }
    let limit = MAX_CUTOFF_NYQUIST_FRACTION * sample_rate_hz / 2.0;
    if !(cutoff_hz > 0.0 && cutoff_hz < limit) {
        return Err(CleaningError::InvalidConfig(format!(
            "cutoff {cutoff_hz} Hz outside (0, {limit:.2}) Hz for fs = {sample_rate_hz} Hz"
        )));
    }
    Ok(())
}

/// Forward-backward filtering with odd-extension padding and steady-state
/// initial conditions. Zero phase lag, squared magnitude response.
/// Requires more than `FILTFILT_PADLEN` samples.
pub fn filtfilt(section: &Biquad, data: &[f64]) -> Result<Vec<f64>, CleaningError> {
    let n = data.len();
    let padlen = FILTFILT_PADLEN;
    if n <= padlen {
        return Err(CleaningError::InvalidConfig(format!(
            "zero-lag filtering needs more than {padlen} samples, got {n}"
        )));
    }

    // Odd extension: 2*x[0] - x[padlen..=1], x, 2*x[n-1] - x[n-2..=n-1-padlen]
    let mut extended = Vec::with_capacity(n + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * data[0] - data[i]));
    extended.extend_from_slice(data);
    extended.extend((1..=padlen).map(|i| 2.0 * data[n - 1] - data[n - 1 - i]));

    let zi = section.steady_state();
    let x0 = extended[0];
    let forward = section.filter(&extended, [zi[0] * x0, zi[1] * x0]);

    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let y0 = reversed[0];
    let mut backward = section.filter(&reversed, [zi[0] * y0, zi[1] * y0]);
    backward.reverse();

    Ok(backward[padlen..padlen + n].to_vec())
}

/// Zero-lag low-pass of a channel that may contain missing samples.
///
/// Each finite segment longer than the padding is filtered on its own; shorter
/// segments are copied through unfiltered and NaN samples stay NaN.
pub fn lowpass_zero_lag(
    values: ArrayView1<f64>,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> Result<Array1<f64>, CleaningError> {
    let section = Biquad::butterworth_lowpass(cutoff_hz, sample_rate_hz)?;
    let mut output = values.to_owned();
    for run in finite_runs(values.iter(), FILTFILT_PADLEN + 1) {
        let segment: Vec<f64> = (run.start..run.end).map(|i| values[i]).collect();
        let filtered = filtfilt(&section, &segment)?;
        for (offset, value) in filtered.into_iter().enumerate() {
            output[run.start + offset] = value;
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 100.0;

    /// |H(e^jw)| of one pass of `section` at `frequency_hz`
    fn magnitude_response(section: &Biquad, frequency_hz: f64) -> f64 {
        let w = 2.0 * PI * frequency_hz / FS;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());
        let num_re = section.b[0] + section.b[1] * c1 + section.b[2] * c2;
        let num_im = section.b[1] * s1 + section.b[2] * s2;
        let den_re = section.a[0] + section.a[1] * c1 + section.a[2] * c2;
        let den_im = section.a[1] * s1 + section.a[2] * s2;
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }

    fn sine(freq: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    #[test]
    fn test_design_has_unity_dc_gain_and_cutoff_at_minus_3db() {
        let section = Biquad::butterworth_lowpass(6.0, FS).unwrap();
        let dc_gain = section.b.iter().sum::<f64>() / section.a.iter().sum::<f64>();
        assert!((dc_gain - 1.0).abs() < 1e-12);
        let at_cutoff = magnitude_response(&section, 6.0);
        assert!((at_cutoff - 1.0 / SQRT_2).abs() < 1e-9);
        assert!(magnitude_response(&section, 30.0) < 0.05);
    }

    #[test]
    fn test_matches_reference_coefficients() {
        // butter(2, 10 Hz, fs = 100 Hz)
        let section = Biquad::butterworth_lowpass(10.0, FS).unwrap();
        assert!((section.b[0] - 0.067455273889).abs() < 1e-9);
        assert!((section.a[1] + 1.142980502540).abs() < 1e-9);
        assert!((section.a[2] - 0.412801598096).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_cutoffs() {
        assert!(Biquad::butterworth_lowpass(0.0, FS).is_err());
        assert!(Biquad::butterworth_lowpass(50.0, FS).is_err());
        assert!(Biquad::butterworth_lowpass(5.0, 0.0).is_err());
    }

    #[test]
    fn test_filtfilt_preserves_constant_signal() {
        let section = Biquad::butterworth_lowpass(5.0, FS).unwrap();
        let data = vec![3.5; 40];
        let out = filtfilt(&section, &data).unwrap();
        assert_eq!(out.len(), 40);
        assert!(out.iter().all(|v| (v - 3.5).abs() < 1e-9));
    }

    #[test]
    fn test_filtfilt_has_no_phase_lag() {
        // 2 Hz passband tone through a 10 Hz filter keeps its zero crossings
        let section = Biquad::butterworth_lowpass(10.0, FS).unwrap();
        let data = sine(2.0, 400);
        let out = filtfilt(&section, &data).unwrap();
        for i in 50..350 {
            assert!((out[i] - data[i]).abs() < 0.01, "sample {i}");
        }
    }

    #[test]
    fn test_filtfilt_attenuates_stopband() {
        let section = Biquad::butterworth_lowpass(4.0, FS).unwrap();
        let out = filtfilt(&section, &sine(30.0, 400)).unwrap();
        let peak = out[50..350].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak < 0.01);
    }

    #[test]
    fn test_short_input_is_rejected() {
        let section = Biquad::butterworth_lowpass(4.0, FS).unwrap();
        assert!(filtfilt(&section, &[1.0; FILTFILT_PADLEN]).is_err());
    }

    #[test]
    fn test_lowpass_keeps_gaps_and_short_segments() {
        let mut data = Array1::from(sine(1.0, 60));
        data[20] = f64::NAN;
        data[25] = f64::NAN; // 21..25 is a 4-sample segment
        let out = lowpass_zero_lag(data.view(), 6.0, FS).unwrap();
        assert!(out[20].is_nan() && out[25].is_nan());
        for i in 21..25 {
            assert_eq!(out[i], data[i]);
        }
        assert!(out.iter().enumerate().all(|(i, v)| v.is_finite() || i == 20 || i == 25));
    }
}
