//! Linear stability of a fixed point from its Jacobian spectrum.

use anyhow::{bail, Context, Result};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    /// Every eigenvalue has real part below `-tolerance`.
    Stable,
    /// Some eigenvalue has real part above `tolerance`.
    Unstable,
    /// The leading real part lies within the tolerance band.
    Marginal,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stability::Stable => "stable",
            Stability::Unstable => "unstable",
            Stability::Marginal => "marginal",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex<f64>> for ComplexNumber {
    fn from(value: Complex<f64>) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityReport {
    /// Sorted by descending real part.
    pub eigenvalues: Vec<ComplexNumber>,
    pub max_real_part: f64,
    pub stability: Stability,
}

/// Eigenvalues of a square Jacobian, sorted by descending real part.
pub fn eigenvalues(jacobian: &DMatrix<f64>) -> Result<Vec<Complex<f64>>> {
    if !jacobian.is_square() {
        bail!(
            "Jacobian must be square, got {}x{}.",
            jacobian.nrows(),
            jacobian.ncols()
        );
    }
    if jacobian.is_empty() {
        bail!("Jacobian has zero dimension.");
    }
    if jacobian.iter().any(|v| !v.is_finite()) {
        bail!("Jacobian contains non-finite entries.");
    }

    let mut values: Vec<Complex<f64>> = jacobian.complex_eigenvalues().iter().copied().collect();
    values.sort_by(|a, b| b.re.total_cmp(&a.re).then(b.im.total_cmp(&a.im)));
    Ok(values)
}

pub fn classify(max_real_part: f64, tolerance: f64) -> Stability {
    if max_real_part > tolerance {
        Stability::Unstable
    } else if max_real_part < -tolerance {
        Stability::Stable
    } else {
        Stability::Marginal
    }
}

pub fn analyze(jacobian: &DMatrix<f64>, tolerance: f64) -> Result<StabilityReport> {
    if tolerance.is_nan() || tolerance < 0.0 {
        bail!("tolerance must be non-negative.");
    }
    let values = eigenvalues(jacobian).context("Failed to compute eigenvalues of Jacobian.")?;
    let max_real_part = values.iter().map(|l| l.re).fold(f64::NEG_INFINITY, f64::max);

    Ok(StabilityReport {
        stability: classify(max_real_part, tolerance),
        max_real_part,
        eigenvalues: values.into_iter().map(ComplexNumber::from).collect(),
    })
}
