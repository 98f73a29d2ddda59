//! Input-constrained receding-horizon MPC.
//!
//! # QP Formulation
//!
//! Decision variables: `z = [x₁, …, x_N, u₀, …, u_{N−1}]`.
//!
//! Cost: `½ Xᵀ Q̄ X + ½ Uᵀ R̄ U`
//!
//! Subject to:
//! - Dynamics: `X − C̄ U = Â x₀` (equality)
//! - Input bound: `|u_k| ≤ u_max` (inequality)
//! - Optional state bound: `|x_i| ≤ x_max` (inequality)
//!
//! Everything except the equality right-hand side is assembled once at
//! construction.

use std::cell::RefCell;
use std::fmt;

use balance_core::error::{ControlError, SolverError};
use balance_core::model::LinearModel;
use balance_core::traits::{Controller, QpSolver};
use balance_core::types::{Command, QpProblem};
use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::config::MpcConfig;
use crate::finite_horizon::HorizonWeights;
use crate::prediction::Prediction;

/// Receding-horizon controller solving one QP per call.
pub struct RecedingHorizonMpc {
    config: MpcConfig,
    state_dim: usize,
    prediction: Prediction,
    problem: RefCell<QpProblem>,
    solver: Box<dyn QpSolver>,
    desired_position: f64,
}

impl RecedingHorizonMpc {
    /// Build with the solver configured in `config.solver`.
    pub fn new(model: &LinearModel, config: MpcConfig) -> Result<Self, ControlError> {
        let solver = Box::new(config.solver.clone());
        Self::with_solver(model, config, solver)
    }

    /// Build with an explicit QP solver.
    pub fn with_solver(
        model: &LinearModel,
        config: MpcConfig,
        solver: Box<dyn QpSolver>,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        let weights = HorizonWeights::build(model, &config.weights)?;
        let prediction =
            Prediction::recursive(model.a_disc(), model.b_disc(), config.weights.horizon)?;
        let problem = assemble(&prediction, &weights, &config);

        Ok(Self {
            state_dim: model.state_dim(),
            config,
            prediction,
            problem: RefCell::new(problem),
            solver,
            desired_position: 0.0,
        })
    }

    pub const fn config(&self) -> &MpcConfig {
        &self.config
    }

    pub const fn prediction(&self) -> &Prediction {
        &self.prediction
    }

    /// Solve the QP for `x0` and return the full decision vector.
    pub fn solve(&self, x0: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
        let rhs = &self.prediction.a_hat * x0;
        let mut problem = self.problem.borrow_mut();
        problem.b_vector.rows_mut(0, rhs.len()).copy_from(&rhs);
        self.solver.solve(&problem)
    }

    /// Index of `u₀` in the decision vector.
    fn first_input(&self) -> usize {
        self.config.weights.horizon * self.state_dim
    }
}

/// Assemble the constant part of the QP; the equality bounds start at zero.
fn assemble(prediction: &Prediction, weights: &HorizonWeights, config: &MpcConfig) -> QpProblem {
    let horizon = config.weights.horizon;
    let n_x = prediction.a_hat.nrows();
    let n_u = horizon;
    let n_z = n_x + n_u;

    let mut p_matrix = DMatrix::zeros(n_z, n_z);
    p_matrix.view_mut((0, 0), (n_x, n_x)).copy_from(&weights.q_bar);
    p_matrix.view_mut((n_x, n_x), (n_u, n_u)).copy_from(&weights.r_bar);

    let n_eq = n_x;
    let n_state_bounds = if config.x_max.is_some() { 2 * n_x } else { 0 };
    let n_ineq = 2 * n_u + n_state_bounds;

    let mut a_matrix = DMatrix::zeros(n_eq + n_ineq, n_z);
    let mut b_vector = DVector::zeros(n_eq + n_ineq);

    // Dynamics: [I, −C̄] z = Â x₀
    a_matrix.view_mut((0, 0), (n_x, n_x)).fill_with_identity();
    a_matrix
        .view_mut((0, n_x), (n_x, n_u))
        .copy_from(&(-&prediction.c_bar));

    // ±u ≤ u_max
    let mut row = n_eq;
    for k in 0..n_u {
        a_matrix[(row + k, n_x + k)] = 1.0;
        a_matrix[(row + n_u + k, n_x + k)] = -1.0;
    }
    b_vector.rows_mut(row, 2 * n_u).fill(config.u_max);
    row += 2 * n_u;

    // ±x ≤ x_max
    if let Some(x_max) = config.x_max {
        for i in 0..n_x {
            a_matrix[(row + i, i)] = 1.0;
            a_matrix[(row + n_x + i, i)] = -1.0;
        }
        b_vector.rows_mut(row, 2 * n_x).fill(x_max);
    }

    QpProblem {
        p_matrix,
        q_vector: DVector::zeros(n_z),
        a_matrix,
        b_vector,
        n_eq,
        n_ineq,
    }
}

impl fmt::Debug for RecedingHorizonMpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecedingHorizonMpc")
            .field("horizon", &self.config.weights.horizon)
            .field("u_max", &self.config.u_max)
            .field("x_max", &self.config.x_max)
            .field("desired_position", &self.desired_position)
            .finish_non_exhaustive()
    }
}

impl Controller for RecedingHorizonMpc {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "MPC"
    }

    /// Stored only; the cost regulates to the origin.
    fn set_desired_position(&mut self, position: f64) {
        self.desired_position = position;
    }

    fn desired_position(&self) -> f64 {
        self.desired_position
    }

    fn control(&self, state: &DVector<f64>) -> Command {
        match self.solve(state) {
            Ok(z) => Command::new(z[self.first_input()]),
            Err(err) => {
                warn!(error = %err, "MPC solve failed; applying zero input");
                Command::fallback(err)
            }
        }
    }
}
