use nalgebra::{DMatrix, DVector};

use crate::error::SolverError;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Scalar control command produced by one controller call.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// Input applied to the plant (N for the cart, normalized torque for the robot).
    pub value: f64,
    /// Set when the controller could not compute its law this tick and
    /// fell back to a zero command.
    pub fallback: Option<SolverError>,
}

impl Command {
    /// A nominal command.
    pub const fn new(value: f64) -> Self {
        Self {
            value,
            fallback: None,
        }
    }

    /// A zero command carrying the reason for the fallback.
    pub const fn fallback(reason: SolverError) -> Self {
        Self {
            value: 0.0,
            fallback: Some(reason),
        }
    }

    /// Whether this tick fell back.
    pub const fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

// ---------------------------------------------------------------------------
// EpisodeSignal / StepOutcome
// ---------------------------------------------------------------------------

/// Episode status reported by a terminating step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EpisodeSignal {
    /// State within bounds.
    #[default]
    Alive,
    /// This step left the bounds.
    JustTerminated,
    /// The episode ended on an earlier step.
    AlreadyTerminated,
}

impl EpisodeSignal {
    /// Returns `true` once the bounds have been left.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::JustTerminated | Self::AlreadyTerminated)
    }
}

/// Result of a terminating step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub signal: EpisodeSignal,
    /// 1.0 while alive and on the terminating step, 0.0 afterwards.
    pub reward: f64,
}

// ---------------------------------------------------------------------------
// QpProblem
// ---------------------------------------------------------------------------

/// Quadratic program in conic form.
///
/// ```text
/// minimize    ½ zᵀ P z + qᵀ z
/// subject to  A_eq z  = b_eq      (first `n_eq` rows of A, b)
///             A_in z <= b_in      (remaining `n_ineq` rows)
/// ```
#[derive(Clone, Debug)]
pub struct QpProblem {
    /// Cost Hessian (symmetric; solvers read the upper triangle).
    pub p_matrix: DMatrix<f64>,
    /// Cost linear term.
    pub q_vector: DVector<f64>,
    /// Constraint matrix (equalities stacked on top of inequalities).
    pub a_matrix: DMatrix<f64>,
    /// Constraint bounds.
    pub b_vector: DVector<f64>,
    /// Number of equality constraints.
    pub n_eq: usize,
    /// Number of inequality constraints.
    pub n_ineq: usize,
}

impl QpProblem {
    /// Number of decision variables.
    pub fn n_vars(&self) -> usize {
        self.p_matrix.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_command_is_zero() {
        let cmd = Command::fallback(SolverError::Infeasible("PrimalInfeasible".into()));
        assert!(cmd.is_fallback());
        assert!(cmd.value.abs() < f64::EPSILON);
    }

    #[test]
    fn nominal_command() {
        let cmd = Command::new(2.5);
        assert!(!cmd.is_fallback());
        assert!((cmd.value - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn episode_signal_terminal() {
        assert!(!EpisodeSignal::Alive.is_terminal());
        assert!(EpisodeSignal::JustTerminated.is_terminal());
        assert!(EpisodeSignal::AlreadyTerminated.is_terminal());
        assert_eq!(EpisodeSignal::default(), EpisodeSignal::Alive);
    }
}
