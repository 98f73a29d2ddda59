use nalgebra::{Complex, DMatrix, DVector};

use crate::error::{ControlError, DimensionError, SolverError};
use crate::model::{LinearModel, StateLayout};
use crate::types::{Command, QpProblem, StepOutcome};

// ---------------------------------------------------------------------------
// Plant
// ---------------------------------------------------------------------------

/// A simulated mechanical plant driven by one scalar input.
pub trait Plant {
    /// Human-readable name for this plant.
    fn name(&self) -> &str;

    /// Current state vector.
    fn state(&self) -> &DVector<f64>;

    /// Replace the state. Fails if the dimension does not match.
    fn set_state(&mut self, state: DVector<f64>) -> Result<(), DimensionError>;

    /// Linearized model, including the fixed sampling period.
    fn model(&self) -> &LinearModel;

    /// Nonlinear state derivative for `state` under input `u`.
    fn dynamics(&self, state: &DVector<f64>, u: f64) -> DVector<f64>;

    /// Advance one semi-implicit Euler step of the nonlinear dynamics.
    fn step_continuous(&mut self, u: f64);

    /// Advance one step of the discrete linear model.
    fn step_discrete(&mut self, u: f64);

    /// Advance the nonlinear dynamics and evaluate the episode bounds.
    fn step_with_termination(&mut self, u: f64) -> StepOutcome;

    /// Start a new episode without touching the state.
    fn reset_episode(&mut self);

    /// Simulated time since construction, in seconds.
    fn time_elapsed(&self) -> f64;

    /// Sampling period in seconds.
    fn dt(&self) -> f64 {
        self.model().dt()
    }

    fn state_dim(&self) -> usize {
        self.model().state_dim()
    }

    fn layout(&self) -> StateLayout {
        self.model().layout()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// A state-feedback control law.
///
/// `control` is a pure function of the state, the setpoint and whatever the
/// controller precomputed at construction.
pub trait Controller {
    /// Human-readable name for this controller.
    fn name(&self) -> &str;

    /// Set the desired cart position. Never triggers a recompute.
    fn set_desired_position(&mut self, position: f64);

    /// Current desired cart position.
    fn desired_position(&self) -> f64;

    /// Compute the command for `state`.
    fn control(&self, state: &DVector<f64>) -> Command;
}

// ---------------------------------------------------------------------------
// Solver services
// ---------------------------------------------------------------------------

/// Eigenvalue assignment for single-input systems.
pub trait PolePlacer {
    /// Return `K` (1×n) such that `eig(A - B K)` equals `poles`.
    fn place(
        &self,
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        poles: &[Complex<f64>],
    ) -> Result<DMatrix<f64>, ControlError>;
}

/// Continuous algebraic Riccati equation solver.
pub trait RiccatiSolver {
    /// Return the stabilizing `X` with `AᵀX + XA − XBR⁻¹BᵀX + Q = 0`.
    fn solve_care(
        &self,
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        q: &DMatrix<f64>,
        r: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, ControlError>;
}

/// Convex quadratic program solver.
pub trait QpSolver {
    /// Return the optimal decision vector.
    fn solve(&self, problem: &QpProblem) -> Result<DVector<f64>, SolverError>;
}

impl<T: QpSolver + ?Sized> QpSolver for std::rc::Rc<T> {
    fn solve(&self, problem: &QpProblem) -> Result<DVector<f64>, SolverError> {
        (**self).solve(problem)
    }
}
