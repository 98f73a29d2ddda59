//! Algebraic Riccati equation solvers.
//!
//! - [`SignFunctionCare`]: continuous equation via the matrix sign function
//!   of the Hamiltonian.
//! - [`solve_dare`]: discrete equation by fixed-point (value) iteration.

use balance_core::error::{ControlError, DimensionError};
use balance_core::traits::RiccatiSolver;
use nalgebra::DMatrix;
use tracing::debug;

// ---------------------------------------------------------------------------
// Continuous: matrix sign function
// ---------------------------------------------------------------------------

/// Continuous algebraic Riccati solver using the Newton iteration for the
/// sign of the Hamiltonian matrix
///
/// ```text
/// H = [  A   −B R⁻¹ Bᵀ ]
///     [ −Q   −Aᵀ       ]
/// ```
///
/// with determinant scaling. The stabilizing solution is recovered from
/// `W = sign(H)` as the least-squares solution of
/// `[W₁₂; W₂₂ + I] X = −[W₁₁ + I; W₂₁]`.
#[derive(Clone, Debug)]
pub struct SignFunctionCare {
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for SignFunctionCare {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-12,
        }
    }
}

impl SignFunctionCare {
    fn matrix_sign(&self, h: DMatrix<f64>) -> Result<DMatrix<f64>, ControlError> {
        let dim = h.nrows();
        let mut z = h;
        for iter in 0..self.max_iter {
            let det = z.determinant();
            if !det.is_finite() || det == 0.0 {
                return Err(ControlError::RiccatiFailed(format!(
                    "Hamiltonian iterate singular at iteration {iter}; \
                     the pair may have eigenvalues on the imaginary axis"
                )));
            }
            #[allow(clippy::cast_precision_loss)]
            let c = det.abs().powf(1.0 / dim as f64);
            let z_inv = z.clone().try_inverse().ok_or_else(|| {
                ControlError::RiccatiFailed(format!("inverse failed at iteration {iter}"))
            })?;
            let next = (&z / c + z_inv * c) * 0.5;
            let delta = (&next - &z).norm();
            let scale = next.norm();
            z = next;
            if delta <= self.tolerance * scale {
                debug!(iterations = iter + 1, "matrix sign iteration converged");
                return Ok(z);
            }
        }
        Err(ControlError::RiccatiFailed(format!(
            "matrix sign iteration did not converge in {} iterations",
            self.max_iter
        )))
    }
}

impl RiccatiSolver for SignFunctionCare {
    fn solve_care(
        &self,
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        q: &DMatrix<f64>,
        r: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, ControlError> {
        let n = a.nrows();
        check_weights(n, b.ncols(), q, r)?;

        let r_inv = r.clone().try_inverse().ok_or(ControlError::Singular("R"))?;
        let g = b * r_inv * b.transpose();

        let mut h = DMatrix::zeros(2 * n, 2 * n);
        h.view_mut((0, 0), (n, n)).copy_from(a);
        h.view_mut((0, n), (n, n)).copy_from(&(-g));
        h.view_mut((n, 0), (n, n)).copy_from(&(-q));
        h.view_mut((n, n), (n, n)).copy_from(&(-a.transpose()));

        let w = self.matrix_sign(h)?;

        let identity = DMatrix::<f64>::identity(n, n);
        let mut lhs = DMatrix::zeros(2 * n, n);
        lhs.view_mut((0, 0), (n, n)).copy_from(&w.view((0, n), (n, n)));
        lhs.view_mut((n, 0), (n, n))
            .copy_from(&(w.view((n, n), (n, n)) + &identity));
        let mut rhs = DMatrix::zeros(2 * n, n);
        rhs.view_mut((0, 0), (n, n))
            .copy_from(&(-(w.view((0, 0), (n, n)) + &identity)));
        rhs.view_mut((n, 0), (n, n)).copy_from(&(-w.view((n, 0), (n, n))));

        let x = lhs
            .svd(true, true)
            .solve(&rhs, 1e-12)
            .map_err(|e| ControlError::RiccatiFailed(e.to_owned()))?;
        let x = (&x + x.transpose()) * 0.5;

        if x.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::RiccatiFailed("non-finite solution".into()));
        }
        Ok(x)
    }
}

/// `AᵀX + XA − XBR⁻¹BᵀX + Q`.
pub fn care_residual(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    x: &DMatrix<f64>,
) -> Option<DMatrix<f64>> {
    let r_inv = r.clone().try_inverse()?;
    Some(a.transpose() * x + x * a - x * b * r_inv * b.transpose() * x + q)
}

/// Continuous LQR gain `K = R⁻¹BᵀX`.
pub fn lqr(
    solver: &dyn RiccatiSolver,
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<DMatrix<f64>, ControlError> {
    let x = solver.solve_care(a, b, q, r)?;
    let r_inv = r.clone().try_inverse().ok_or(ControlError::Singular("R"))?;
    Ok(r_inv * b.transpose() * x)
}

// ---------------------------------------------------------------------------
// Discrete: value iteration
// ---------------------------------------------------------------------------

const DARE_MAX_ITER: usize = 200_000;
const DARE_TOLERANCE: f64 = 1e-10;

/// Solve `P = Q + AᵀPA − AᵀPB (R + BᵀPB)⁻¹ BᵀPA` by iterating the Riccati
/// difference equation from `P = Q` until it stops changing.
pub fn solve_dare(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<DMatrix<f64>, ControlError> {
    check_weights(a.nrows(), b.ncols(), q, r)?;

    let at = a.transpose();
    let bt = b.transpose();
    let mut p = q.clone();
    for iter in 0..DARE_MAX_ITER {
        let s = r + &bt * &p * b;
        let s_inv = s
            .try_inverse()
            .ok_or(ControlError::Singular("R + BᵀPB"))?;
        let atpb = &at * &p * b;
        let next = &at * &p * a - &atpb * s_inv * atpb.transpose() + q;
        // Rounding leaves an antisymmetric part that grows if kept.
        let next = (&next + next.transpose()) * 0.5;
        let delta = (&next - &p).amax();
        let scale = next.amax().max(1.0);
        p = next;
        if !delta.is_finite() {
            return Err(ControlError::RiccatiFailed("discrete iteration diverged".into()));
        }
        if delta <= DARE_TOLERANCE * scale {
            debug!(iterations = iter + 1, "discrete Riccati iteration converged");
            return Ok(p);
        }
    }
    Err(ControlError::RiccatiFailed(format!(
        "discrete Riccati iteration did not converge in {DARE_MAX_ITER} iterations"
    )))
}

/// Discrete LQR gain `K = (R + BᵀPB)⁻¹ BᵀPA` (control law `u = −K x`).
pub fn dlqr(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<DMatrix<f64>, ControlError> {
    let p = solve_dare(a, b, q, r)?;
    let s = r + b.transpose() * &p * b;
    let s_inv = s.try_inverse().ok_or(ControlError::Singular("R + BᵀPB"))?;
    Ok(s_inv * b.transpose() * p * a)
}

fn check_weights(
    n: usize,
    m: usize,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<(), ControlError> {
    if q.shape() != (n, n) {
        return Err(DimensionError {
            expected: n,
            got: q.nrows(),
        }
        .into());
    }
    if r.shape() != (m, m) {
        return Err(DimensionError {
            expected: m,
            got: r.nrows(),
        }
        .into());
    }
    Ok(())
}
