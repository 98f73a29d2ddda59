//! Open- and closed-loop diagnostics for linear models.

use std::fmt;

use balance_core::error::ControlError;
use balance_core::model::LinearModel;
use balance_core::traits::{PolePlacer, RiccatiSolver};
use nalgebra::{Complex, DMatrix};

use crate::riccati::lqr;

/// Singular values below this (relative to the largest) count as zero.
const RANK_TOLERANCE: f64 = 1e-10;

/// Controllability matrix `[B, AB, …, Aⁿ⁻¹B]`.
pub fn controllability_matrix(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    let n = a.nrows();
    let m = b.ncols();
    let mut ctrb = DMatrix::zeros(n, n * m);
    let mut block = b.clone();
    for k in 0..n {
        ctrb.view_mut((0, k * m), (n, m)).copy_from(&block);
        block = a * &block;
    }
    ctrb
}

/// Numerical rank via SVD.
pub fn rank(m: &DMatrix<f64>) -> usize {
    let sv = m.clone().singular_values();
    let largest = sv.max();
    if largest <= 0.0 {
        return 0;
    }
    sv.iter().filter(|&&s| s > RANK_TOLERANCE * largest).count()
}

pub fn controllability_rank(a: &DMatrix<f64>, b: &DMatrix<f64>) -> usize {
    rank(&controllability_matrix(a, b))
}

/// Eigenvalues sorted by real part, then imaginary part.
pub fn eigenvalues(a: &DMatrix<f64>) -> Vec<Complex<f64>> {
    let mut eigs: Vec<Complex<f64>> = a.complex_eigenvalues().iter().copied().collect();
    eigs.sort_by(|x, y| x.re.total_cmp(&y.re).then(x.im.total_cmp(&y.im)));
    eigs
}

/// Continuous-time (Hurwitz) stability.
pub fn is_hurwitz(a: &DMatrix<f64>) -> bool {
    eigenvalues(a).iter().all(|e| e.re < 0.0)
}

/// Discrete-time (Schur) stability.
pub fn is_schur(a: &DMatrix<f64>) -> bool {
    eigenvalues(a).iter().all(|e| e.norm() < 1.0)
}

/// `A − B K`.
pub fn closed_loop(a: &DMatrix<f64>, b: &DMatrix<f64>, k: &DMatrix<f64>) -> DMatrix<f64> {
    a - b * k
}

/// Diagnostics printed by the `analyze` command.
#[derive(Clone, Debug)]
pub struct AnalysisReport {
    pub plant: String,
    pub open_loop: Vec<Complex<f64>>,
    pub controllability_rank: usize,
    pub state_dim: usize,
    /// Closed-loop eigenvalues under the pole-placement gain, if it exists.
    pub pole_placement: Result<Vec<Complex<f64>>, ControlError>,
    /// Closed-loop eigenvalues under the LQR gain, if it exists.
    pub lqr: Result<Vec<Complex<f64>>, ControlError>,
}

impl AnalysisReport {
    /// Analyze `model` with the given pole-placement and LQR gain sources.
    pub fn build(
        plant: &str,
        model: &LinearModel,
        poles: &[Complex<f64>],
        placer: &dyn PolePlacer,
        q: &DMatrix<f64>,
        r: &DMatrix<f64>,
        riccati: &dyn RiccatiSolver,
    ) -> Self {
        let (a, b) = (model.a_cont(), model.b_cont());

        let pole_placement = placer
            .place(a, b, poles)
            .map(|k| eigenvalues(&closed_loop(a, b, &k)));

        let lqr = lqr(riccati, a, b, q, r).map(|k| eigenvalues(&closed_loop(a, b, &k)));

        Self {
            plant: plant.to_owned(),
            open_loop: eigenvalues(a),
            controllability_rank: controllability_rank(a, b),
            state_dim: model.state_dim(),
            pole_placement,
            lqr,
        }
    }

    pub const fn is_controllable(&self) -> bool {
        self.controllability_rank == self.state_dim
    }
}

fn fmt_eigs(f: &mut fmt::Formatter<'_>, eigs: &[Complex<f64>]) -> fmt::Result {
    for (i, e) in eigs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if e.im.abs() < 1e-12 {
            write!(f, "{:.4}", e.re)?;
        } else {
            write!(f, "{:.4}{:+.4}i", e.re, e.im)?;
        }
    }
    Ok(())
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plant: {}", self.plant)?;
        write!(f, "open-loop eigenvalues: ")?;
        fmt_eigs(f, &self.open_loop)?;
        writeln!(f)?;
        writeln!(
            f,
            "controllability rank: {}/{}{}",
            self.controllability_rank,
            self.state_dim,
            if self.is_controllable() { "" } else { " (uncontrollable)" }
        )?;
        for (label, result) in [("pole placement", &self.pole_placement), ("lqr", &self.lqr)] {
            write!(f, "{label} closed-loop eigenvalues: ")?;
            match result {
                Ok(eigs) => fmt_eigs(f, eigs)?,
                Err(err) => write!(f, "unavailable ({err})")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
