//! Batch prediction matrices for horizon controllers.
//!
//! Stacking the predicted states `X = [x₁; …; x_N]` and inputs
//! `U = [u₀; …; u_{N−1}]` of `x⁺ = A x + B u` gives
//!
//! ```text
//! X = Â x₀ + C̄ U
//! ```
//!
//! with `Â` block `i` equal to `Aⁱ⁺¹` and `C̄` block `(i, j)` equal to
//! `Aⁱ⁻ʲ B` for `j ≤ i`.

use balance_core::error::ControlError;
use nalgebra::{DMatrix, DVector};

/// `Â` (N·n × n) and `C̄` (N·n × N·m).
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub a_hat: DMatrix<f64>,
    pub c_bar: DMatrix<f64>,
    pub horizon: usize,
}

impl Prediction {
    /// Fill `Â` and `C̄` block by block from powers of `A`.
    pub fn direct(a: &DMatrix<f64>, b: &DMatrix<f64>, horizon: usize) -> Self {
        let n = a.nrows();
        let m = b.ncols();
        let mut a_hat = DMatrix::zeros(horizon * n, n);
        let mut c_bar = DMatrix::zeros(horizon * n, horizon * m);

        // powers_b[k] = Aᵏ B
        let mut powers_b = Vec::with_capacity(horizon);
        let mut ab = b.clone();
        let mut a_pow = a.clone();
        for i in 0..horizon {
            a_hat.view_mut((i * n, 0), (n, n)).copy_from(&a_pow);
            a_pow = a * &a_pow;
            powers_b.push(ab.clone());
            ab = a * &ab;
        }
        for i in 0..horizon {
            for j in 0..=i {
                c_bar
                    .view_mut((i * n, j * m), (n, m))
                    .copy_from(&powers_b[i - j]);
            }
        }

        Self {
            a_hat,
            c_bar,
            horizon,
        }
    }

    /// Same matrices from the implicit form `(I − Ā) X = E x₀ + B̄ U`, where
    /// `Ā` carries `A` on the first block sub-diagonal, `E = [A; 0; …]` and
    /// `B̄ = I_N ⊗ B`. `I − Ā` is unit lower triangular.
    pub fn recursive(
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        horizon: usize,
    ) -> Result<Self, ControlError> {
        let n = a.nrows();
        let size = horizon * n;

        let mut lower = DMatrix::<f64>::identity(size, size);
        for i in 1..horizon {
            lower
                .view_mut((i * n, (i - 1) * n), (n, n))
                .copy_from(&(-a));
        }

        let a_block = DMatrix::<f64>::identity(horizon, horizon).kronecker(a);
        let e = a_block.columns(0, n).into_owned();
        let b_bar = DMatrix::<f64>::identity(horizon, horizon).kronecker(b);

        let a_hat = lower
            .solve_lower_triangular(&e)
            .ok_or(ControlError::Singular("I − Ā"))?;
        let c_bar = lower
            .solve_lower_triangular(&b_bar)
            .ok_or(ControlError::Singular("I − Ā"))?;

        Ok(Self {
            a_hat,
            c_bar,
            horizon,
        })
    }

    /// Predicted stacked states for `x0` and the stacked input `u`.
    pub fn predict(&self, x0: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        &self.a_hat * x0 + &self.c_bar * u
    }
}

/// `blockdiag(Q, …, Q, P)` with `N − 1` copies of `Q`.
pub fn stage_weights(q: &DMatrix<f64>, p: &DMatrix<f64>, horizon: usize) -> DMatrix<f64> {
    let n = q.nrows();
    let mut q_bar = DMatrix::zeros(horizon * n, horizon * n);
    for i in 0..horizon {
        let block = if i + 1 == horizon { p } else { q };
        q_bar.view_mut((i * n, i * n), (n, n)).copy_from(block);
    }
    q_bar
}

/// `I_N ⊗ R`.
pub fn input_weights(r: &DMatrix<f64>, horizon: usize) -> DMatrix<f64> {
    DMatrix::<f64>::identity(horizon, horizon).kronecker(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plant() -> (DMatrix<f64>, DMatrix<f64>) {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.01, 0.1962, 1.0]);
        let b = DMatrix::from_column_slice(2, 1, &[0.0, -0.02]);
        (a, b)
    }

    #[test]
    fn direct_and_recursive_agree() {
        let (a, b) = plant();
        for horizon in [1, 2, 7, 40] {
            let direct = Prediction::direct(&a, &b, horizon);
            let recursive = Prediction::recursive(&a, &b, horizon).unwrap();
            assert_relative_eq!(direct.a_hat, recursive.a_hat, epsilon = 1e-9);
            assert_relative_eq!(direct.c_bar, recursive.c_bar, epsilon = 1e-9);
        }
    }

    #[test]
    fn direct_and_recursive_agree_on_four_states() {
        let (m, big_m, l, g, bt, bx) = (0.5, 1.0, 0.5, 9.81, 0.5, 1.0);
        #[rustfmt::skip]
        let a_c = DMatrix::from_row_slice(4, 4, &[
            0.0, 1.0, 0.0, 0.0,
            0.0, -bt, -g * m / big_m, 0.0,
            0.0, 0.0, 0.0, 1.0,
            0.0, bt / l, (m + big_m) * g / (big_m * l), -bx,
        ]);
        let a = DMatrix::<f64>::identity(4, 4) + a_c * 0.01;
        let b = DMatrix::from_column_slice(4, 1, &[0.0, 0.01 / big_m, 0.0, -0.01 / (big_m * l)]);
        for horizon in [1, 3, 25, 100] {
            let direct = Prediction::direct(&a, &b, horizon);
            let recursive = Prediction::recursive(&a, &b, horizon).unwrap();
            assert_eq!(recursive.c_bar.shape(), (4 * horizon, horizon));
            assert_relative_eq!(direct.a_hat, recursive.a_hat, epsilon = 1e-9, max_relative = 1e-9);
            assert_relative_eq!(direct.c_bar, recursive.c_bar, epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn prediction_matches_rollout() {
        let (a, b) = plant();
        let horizon = 5;
        let pred = Prediction::direct(&a, &b, horizon);
        let x0 = DVector::from_vec(vec![0.1, -0.2]);
        let u = DVector::from_vec(vec![1.0, -0.5, 0.25, 0.0, 2.0]);

        let stacked = pred.predict(&x0, &u);
        let mut x = x0;
        for k in 0..horizon {
            x = &a * &x + b.column(0) * u[k];
            assert_relative_eq!(stacked[2 * k], x[0], epsilon = 1e-12);
            assert_relative_eq!(stacked[2 * k + 1], x[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn c_bar_is_block_lower_triangular() {
        let (a, b) = plant();
        let pred = Prediction::direct(&a, &b, 4);
        assert_eq!(pred.c_bar.shape(), (8, 4));
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert!(pred.c_bar.view((2 * i, j), (2, 1)).iter().all(|v| *v == 0.0));
            }
        }
    }

    #[test]
    fn terminal_block_uses_p() {
        let q = DMatrix::identity(2, 2);
        let p = DMatrix::identity(2, 2) * 5.0;
        let q_bar = stage_weights(&q, &p, 3);
        assert_relative_eq!(q_bar[(0, 0)], 1.0);
        assert_relative_eq!(q_bar[(3, 3)], 1.0);
        assert_relative_eq!(q_bar[(4, 4)], 5.0);
        assert_relative_eq!(q_bar[(5, 5)], 5.0);
        assert_relative_eq!(q_bar[(0, 2)], 0.0);
    }

    #[test]
    fn input_weights_kronecker() {
        let r = DMatrix::from_element(1, 1, 2.0);
        assert_eq!(input_weights(&r, 3), DMatrix::identity(3, 3) * 2.0);
    }
}
