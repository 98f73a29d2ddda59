//! Single-input pole placement by Ackermann's formula.
//!
//! ```text
//! K = [0 … 0 1] · 𝒞⁻¹ · φ(A)
//! ```
//!
//! where `𝒞` is the controllability matrix and `φ` the desired
//! characteristic polynomial.

use balance_core::error::ControlError;
use balance_core::traits::PolePlacer;
use nalgebra::{Complex, DMatrix, DVector};

use crate::analysis::{controllability_matrix, rank};

/// Imaginary residue of the characteristic polynomial tolerated before the
/// pole set is rejected as not conjugate-closed.
const CONJUGATE_TOLERANCE: f64 = 1e-9;

/// Ackermann pole placement. Single input only.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ackermann;

impl PolePlacer for Ackermann {
    fn place(
        &self,
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        poles: &[Complex<f64>],
    ) -> Result<DMatrix<f64>, ControlError> {
        let n = a.nrows();
        if b.ncols() != 1 {
            return Err(ControlError::InvalidConfig(format!(
                "Ackermann placement needs a single input, got {}",
                b.ncols()
            )));
        }
        if poles.len() != n {
            return Err(ControlError::InvalidPoles(format!(
                "expected {n} poles, got {}",
                poles.len()
            )));
        }

        let coeffs = characteristic_polynomial(poles)?;

        let ctrb = controllability_matrix(a, b);
        let r = rank(&ctrb);
        if r < n {
            return Err(ControlError::Uncontrollable { rank: r, expected: n });
        }

        // Row vector eₙᵀ 𝒞⁻¹, computed as the solution of 𝒞ᵀ w = eₙ.
        let mut e_n = DVector::zeros(n);
        e_n[n - 1] = 1.0;
        let w = ctrb
            .transpose()
            .lu()
            .solve(&e_n)
            .ok_or(ControlError::Singular("controllability matrix"))?;

        let k = w.transpose() * polynomial_at(a, &coeffs);
        Ok(DMatrix::from_row_slice(1, n, k.as_slice()))
    }
}

/// Real coefficients of `∏(s − pᵢ)`, highest degree first (monic).
pub fn characteristic_polynomial(poles: &[Complex<f64>]) -> Result<Vec<f64>, ControlError> {
    let mut coeffs = vec![Complex::new(1.0, 0.0)];
    for &p in poles {
        let mut next = vec![Complex::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * p;
        }
        coeffs = next;
    }

    let scale = coeffs.iter().map(|c| c.norm()).fold(1.0, f64::max);
    if coeffs
        .iter()
        .any(|c| c.im.abs() > CONJUGATE_TOLERANCE * scale)
    {
        return Err(ControlError::InvalidPoles(
            "complex poles must come in conjugate pairs".into(),
        ));
    }
    Ok(coeffs.iter().map(|c| c.re).collect())
}

/// Evaluate a matrix polynomial by Horner's rule.
fn polynomial_at(a: &DMatrix<f64>, coeffs: &[f64]) -> DMatrix<f64> {
    let n = a.nrows();
    let identity = DMatrix::<f64>::identity(n, n);
    coeffs
        .iter()
        .fold(DMatrix::zeros(n, n), |acc, &c| acc * a + &identity * c)
}

/// Real poles as complex numbers.
pub fn real_poles(poles: &[f64]) -> Vec<Complex<f64>> {
    poles.iter().map(|&p| Complex::new(p, 0.0)).collect()
}
