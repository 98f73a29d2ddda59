//! Clarabel-backed quadratic program solver.
//!
//! [`QpProblem`] stores dense nalgebra matrices; they are converted to
//! Clarabel's compressed-sparse-column format on every solve. Equality rows
//! map to a zero cone, inequality rows to a nonnegative cone:
//!
//! ```text
//! A z + s = b,   s ∈ {0}^n_eq × R+^n_ineq
//! ```

use balance_core::error::SolverError;
use balance_core::traits::QpSolver;
use balance_core::types::QpProblem;
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const fn default_max_iter() -> u32 {
    200
}
const fn default_tolerance() -> f64 {
    1e-8
}

/// Interior-point QP solver with an iteration cap and optional time limit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClarabelQp {
    /// Maximum interior-point iterations.
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,
    /// Absolute/relative gap and feasibility tolerance.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Wall-clock limit per solve in seconds. `None` is unlimited.
    #[serde(default)]
    pub time_limit: Option<f64>,
}

impl Default for ClarabelQp {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
            time_limit: None,
        }
    }
}

impl ClarabelQp {
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    fn check_shapes(problem: &QpProblem) -> Result<(), SolverError> {
        let n = problem.n_vars();
        let m = problem.n_eq + problem.n_ineq;
        if problem.p_matrix.nrows() != n
            || problem.q_vector.len() != n
            || problem.a_matrix.ncols() != n
            || problem.a_matrix.nrows() != m
            || problem.b_vector.len() != m
        {
            return Err(SolverError::Setup(format!(
                "inconsistent QP shapes: P {:?}, q {}, A {:?}, b {}, {} eq + {} ineq",
                problem.p_matrix.shape(),
                problem.q_vector.len(),
                problem.a_matrix.shape(),
                problem.b_vector.len(),
                problem.n_eq,
                problem.n_ineq,
            )));
        }
        Ok(())
    }
}

impl QpSolver for ClarabelQp {
    fn solve(&self, problem: &QpProblem) -> Result<DVector<f64>, SolverError> {
        Self::check_shapes(problem)?;

        let p_csc = dmatrix_to_csc_upper_tri(&problem.p_matrix);
        let a_csc = dmatrix_to_csc(&problem.a_matrix);

        let mut cones = Vec::with_capacity(2);
        if problem.n_eq > 0 {
            cones.push(ZeroConeT(problem.n_eq));
        }
        if problem.n_ineq > 0 {
            cones.push(NonnegativeConeT(problem.n_ineq));
        }

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.max_iter)
            .verbose(false)
            .tol_gap_abs(self.tolerance)
            .tol_gap_rel(self.tolerance)
            .tol_feas(self.tolerance)
            .time_limit(self.time_limit.unwrap_or(f64::INFINITY))
            .build()
            .map_err(|e| SolverError::Setup(e.to_string()))?;

        let q_slice: Vec<f64> = problem.q_vector.iter().copied().collect();
        let b_slice: Vec<f64> = problem.b_vector.iter().copied().collect();

        let mut solver =
            DefaultSolver::new(&p_csc, &q_slice, &a_csc, &b_slice, &cones, settings)
                .map_err(|e| SolverError::Setup(format!("{e:?}")))?;
        solver.solve();

        let sol = &solver.solution;
        match &sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                Ok(DVector::from_column_slice(&sol.x))
            }
            SolverStatus::PrimalInfeasible
            | SolverStatus::DualInfeasible
            | SolverStatus::AlmostPrimalInfeasible
            | SolverStatus::AlmostDualInfeasible => {
                Err(SolverError::Infeasible(format!("{:?}", sol.status)))
            }
            status => Err(SolverError::NotConverged(format!("{status:?}"))),
        }
    }
}

/// Convert a nalgebra `DMatrix<f64>` to a Clarabel `CscMatrix<f64>` (full matrix).
pub(crate) fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Convert a symmetric nalgebra `DMatrix<f64>` to upper-triangular `CscMatrix<f64>`.
pub(crate) fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}
