// src/data_analysis/cubic_spline.rs

use crate::error::CleaningError;

/// Natural cubic spline through non-uniformly spaced knots.
///
/// Second derivatives are zero at both ends. Evaluation is restricted to
/// `[x_first, x_last]`; the spline never extrapolates.
#[derive(Debug, Clone)]
pub struct NaturalCubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivative at each knot
    m: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Fits the spline. Knots must be finite and strictly increasing.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self, CleaningError> {
        let n = x.len();
        if n != y.len() {
            return Err(CleaningError::SplineFit(format!(
                "{} knots but {} values",
                n,
                y.len()
            )));
        }
        if n < 2 {
            return Err(CleaningError::SplineFit(format!(
                "need at least 2 knots, got {n}"
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(CleaningError::SplineFit("non-finite knot data".to_string()));
        }
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        if let Some(i) = h.iter().position(|&d| d <= 0.0) {
            return Err(CleaningError::SplineFit(format!(
                "knots not strictly increasing at index {} ({} -> {})",
                i + 1,
                x[i],
                x[i + 1]
            )));
        }

        let mut m = vec![0.0; n];
        if n > 2 {
            // Tridiagonal system for the interior second derivatives (Thomas algorithm)
            let interior = n - 2;
            let mut diag = vec![0.0; interior];
            let mut upper = vec![0.0; interior];
            let mut rhs = vec![0.0; interior];
            for k in 0..interior {
                let i = k + 1;
                diag[k] = 2.0 * (h[i - 1] + h[i]);
                upper[k] = h[i];
                rhs[k] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
            }
            // Forward sweep; lower[k] = h[k]
            for k in 1..interior {
                let w = h[k] / diag[k - 1];
                diag[k] -= w * upper[k - 1];
                rhs[k] -= w * rhs[k - 1];
            }
            // Back substitution
            m[interior] = rhs[interior - 1] / diag[interior - 1];
            for k in (0..interior - 1).rev() {
                m[k + 1] = (rhs[k] - upper[k] * m[k + 2]) / diag[k];
            }
            if m.iter().any(|v| !v.is_finite()) {
                return Err(CleaningError::SplineFit(
                    "singular system while solving for curvature".to_string(),
                ));
            }
        }

        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Value at `t`, or None outside the knot range
    pub fn evaluate(&self, t: f64) -> Option<f64> {
        let n = self.x.len();
        if !(t >= self.x[0] && t <= self.x[n - 1]) {
            return None;
        }
        // Segment j with x[j] <= t <= x[j + 1]
        let j = match self.x.partition_point(|&xi| xi <= t) {
            0 => 0,
            p if p >= n => n - 2,
            p => p - 1,
        };
        let h = self.x[j + 1] - self.x[j];
        let a = self.x[j + 1] - t;
        let b = t - self.x[j];
        let value = self.m[j] * a.powi(3) / (6.0 * h)
            + self.m[j + 1] * b.powi(3) / (6.0 * h)
            + (self.y[j] / h - self.m[j] * h / 6.0) * a
            + (self.y[j + 1] / h - self.m[j + 1] * h / 6.0) * b;
        Some(value)
    }
}
