//! Stub implementations of the solver and controller traits.
//!
//! Each stub returns a fixed value or a fixed failure, so tests can drive
//! controllers and the simulator down their error paths without a numeric
//! solver.

use std::cell::Cell;

use balance_core::error::{ControlError, SolverError};
use balance_core::traits::{Controller, PolePlacer, QpSolver, RiccatiSolver};
use balance_core::types::{Command, QpProblem};
use nalgebra::{Complex, DMatrix, DVector};

// ---------------------------------------------------------------------------
// PolePlacer stubs
// ---------------------------------------------------------------------------

/// Returns the same gain regardless of the requested poles.
pub struct FixedGainPlacer {
    gain: DMatrix<f64>,
}

impl FixedGainPlacer {
    pub fn new(gain: &[f64]) -> Self {
        Self {
            gain: DMatrix::from_row_slice(1, gain.len(), gain),
        }
    }
}

impl PolePlacer for FixedGainPlacer {
    fn place(
        &self,
        _a: &DMatrix<f64>,
        _b: &DMatrix<f64>,
        _poles: &[Complex<f64>],
    ) -> Result<DMatrix<f64>, ControlError> {
        Ok(self.gain.clone())
    }
}

/// Always reports an uncontrollable pair.
pub struct UncontrollablePlacer;

impl PolePlacer for UncontrollablePlacer {
    fn place(
        &self,
        a: &DMatrix<f64>,
        _b: &DMatrix<f64>,
        _poles: &[Complex<f64>],
    ) -> Result<DMatrix<f64>, ControlError> {
        Err(ControlError::Uncontrollable {
            rank: 0,
            expected: a.nrows(),
        })
    }
}

// ---------------------------------------------------------------------------
// RiccatiSolver stubs
// ---------------------------------------------------------------------------

/// Returns a fixed Riccati solution.
pub struct FixedRiccati {
    solution: DMatrix<f64>,
}

impl FixedRiccati {
    pub const fn new(solution: DMatrix<f64>) -> Self {
        Self { solution }
    }
}

impl RiccatiSolver for FixedRiccati {
    fn solve_care(
        &self,
        _a: &DMatrix<f64>,
        _b: &DMatrix<f64>,
        _q: &DMatrix<f64>,
        _r: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, ControlError> {
        Ok(self.solution.clone())
    }
}

/// Always fails.
pub struct FailingRiccati;

impl RiccatiSolver for FailingRiccati {
    fn solve_care(
        &self,
        _a: &DMatrix<f64>,
        _b: &DMatrix<f64>,
        _q: &DMatrix<f64>,
        _r: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, ControlError> {
        Err(ControlError::RiccatiFailed("stub".into()))
    }
}

// ---------------------------------------------------------------------------
// QpSolver stubs
// ---------------------------------------------------------------------------

/// Reports every problem infeasible and counts the calls.
#[derive(Default)]
pub struct InfeasibleQp {
    calls: Cell<usize>,
}

impl InfeasibleQp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl QpSolver for InfeasibleQp {
    fn solve(&self, _problem: &QpProblem) -> Result<DVector<f64>, SolverError> {
        self.calls.set(self.calls.get() + 1);
        Err(SolverError::Infeasible("PrimalInfeasible".into()))
    }
}

/// Returns a decision vector filled with one value.
pub struct ConstantQp {
    value: f64,
}

impl ConstantQp {
    pub const fn new(value: f64) -> Self {
        Self { value }
    }
}

impl QpSolver for ConstantQp {
    fn solve(&self, problem: &QpProblem) -> Result<DVector<f64>, SolverError> {
        Ok(DVector::from_element(problem.n_vars(), self.value))
    }
}

// ---------------------------------------------------------------------------
// Controller stubs
// ---------------------------------------------------------------------------

/// Controller that always commands the same input.
pub struct ConstantController {
    value: f64,
    desired_position: f64,
}

impl ConstantController {
    pub const fn new(value: f64) -> Self {
        Self {
            value,
            desired_position: 0.0,
        }
    }
}

impl Controller for ConstantController {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ConstantController"
    }

    fn set_desired_position(&mut self, position: f64) {
        self.desired_position = position;
    }

    fn desired_position(&self) -> f64 {
        self.desired_position
    }

    fn control(&self, _state: &DVector<f64>) -> Command {
        Command::new(self.value)
    }
}

/// Controller whose every command is a solver fallback.
pub struct FallbackController;

impl Controller for FallbackController {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "FallbackController"
    }

    fn set_desired_position(&mut self, _position: f64) {}

    fn desired_position(&self) -> f64 {
        0.0
    }

    fn control(&self, _state: &DVector<f64>) -> Command {
        Command::fallback(SolverError::NotConverged("MaxIterations".into()))
    }
}

/// Controller that sleeps before answering, for overrun accounting.
pub struct SlowController {
    delay: std::time::Duration,
}

impl SlowController {
    pub const fn new(delay: std::time::Duration) -> Self {
        Self { delay }
    }
}

impl Controller for SlowController {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "SlowController"
    }

    fn set_desired_position(&mut self, _position: f64) {}

    fn desired_position(&self) -> f64 {
        0.0
    }

    fn control(&self, _state: &DVector<f64>) -> Command {
        std::thread::sleep(self.delay);
        Command::new(0.0)
    }
}
