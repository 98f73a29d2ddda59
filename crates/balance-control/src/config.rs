//! Controller tuning parameters.
//!
//! Weight matrices are given as diagonals. Defaults depend on whether the
//! plant has a cart (position channel) or only an angle.

use balance_core::error::{ControlError, DimensionError};
use balance_core::model::{StateLayout, diagonal};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::qp::ClarabelQp;

// ---------------------------------------------------------------------------
// PID
// ---------------------------------------------------------------------------

const fn default_kp_angle() -> f64 {
    50.0
}
const fn default_kd_angle() -> f64 {
    15.0
}
const fn default_kp_position() -> f64 {
    5.0
}
const fn default_kd_position() -> f64 {
    4.8
}

/// Gains of the two summed PD loops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    #[serde(default = "default_kp_angle")]
    pub kp_angle: f64,
    #[serde(default = "default_kd_angle")]
    pub kd_angle: f64,
    #[serde(default = "default_kp_position")]
    pub kp_position: f64,
    #[serde(default = "default_kd_position")]
    pub kd_position: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp_angle: default_kp_angle(),
            kd_angle: default_kd_angle(),
            kp_position: default_kp_position(),
            kd_position: default_kd_position(),
        }
    }
}

// ---------------------------------------------------------------------------
// Infinite-horizon state feedback
// ---------------------------------------------------------------------------

/// Default closed-loop poles (all real).
pub fn default_poles(layout: StateLayout) -> Vec<f64> {
    if layout.has_position() {
        vec![-2.0, -8.0, -9.0, -10.0]
    } else {
        vec![-4.0, -5.0]
    }
}

/// Continuous LQR weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LqrConfig {
    /// Diagonal of `Q`.
    pub q: Vec<f64>,
    /// Scalar `R`.
    pub r: f64,
}

impl LqrConfig {
    pub fn for_layout(layout: StateLayout) -> Self {
        let q = if layout.has_position() {
            vec![100.0, 1.0, 10.0, 100.0]
        } else {
            vec![1.0, 1.0]
        };
        Self { q, r: 1.0 }
    }

    pub fn q_matrix(&self, state_dim: usize) -> Result<DMatrix<f64>, ControlError> {
        weight_matrix(&self.q, state_dim)
    }

    pub fn r_matrix(&self) -> Result<DMatrix<f64>, ControlError> {
        scalar_weight(self.r, "r")
    }
}

// ---------------------------------------------------------------------------
// Horizon controllers
// ---------------------------------------------------------------------------

/// Terminal state weight of a finite-horizon cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalWeight {
    /// Diagonal of `P`.
    Diagonal(Vec<f64>),
    /// Solution of the discrete algebraic Riccati equation for `(A_d, B_d, Q, R)`.
    Riccati,
}

/// Horizon and weights shared by the finite-horizon and MPC controllers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HorizonConfig {
    /// Number of predicted steps `N`.
    pub horizon: usize,
    /// Diagonal of the stage weight `Q`.
    pub q: Vec<f64>,
    /// Scalar input weight `R`.
    pub r: f64,
    pub terminal: TerminalWeight,
}

impl HorizonConfig {
    pub const DEFAULT_HORIZON: usize = 100;

    pub fn for_layout(layout: StateLayout) -> Self {
        let (q, p) = if layout.has_position() {
            (vec![100.0, 10.0, 1.0, 1.0], vec![1000.0, 1.0, 1.0, 1.0])
        } else {
            (vec![1.0, 1.0], vec![1.0, 1.0])
        };
        Self {
            horizon: Self::DEFAULT_HORIZON,
            q,
            r: 1.0,
            terminal: TerminalWeight::Diagonal(p),
        }
    }

    #[must_use]
    pub const fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    #[must_use]
    pub fn with_terminal(mut self, terminal: TerminalWeight) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        if self.horizon == 0 {
            return Err(ControlError::InvalidConfig(
                "horizon must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn q_matrix(&self, state_dim: usize) -> Result<DMatrix<f64>, ControlError> {
        weight_matrix(&self.q, state_dim)
    }

    pub fn r_matrix(&self) -> Result<DMatrix<f64>, ControlError> {
        scalar_weight(self.r, "r")
    }
}

const fn default_u_max() -> f64 {
    10.0
}

/// Receding-horizon MPC: horizon weights plus constraints and solver limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MpcConfig {
    pub weights: HorizonConfig,
    /// Input bound `|u_k| ≤ u_max`.
    #[serde(default = "default_u_max")]
    pub u_max: f64,
    /// Optional state bound `|x_i| ≤ x_max` applied to every predicted entry.
    #[serde(default)]
    pub x_max: Option<f64>,
    #[serde(default)]
    pub solver: ClarabelQp,
}

impl MpcConfig {
    pub fn for_layout(layout: StateLayout) -> Self {
        Self {
            weights: HorizonConfig::for_layout(layout),
            u_max: default_u_max(),
            x_max: None,
            solver: ClarabelQp::default(),
        }
    }

    #[must_use]
    pub const fn with_u_max(mut self, u_max: f64) -> Self {
        self.u_max = u_max;
        self
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        self.weights.validate()?;
        if !(self.u_max > 0.0) {
            return Err(ControlError::InvalidConfig(format!(
                "u_max must be positive, got {}",
                self.u_max
            )));
        }
        if let Some(x_max) = self.x_max {
            if !(x_max > 0.0) {
                return Err(ControlError::InvalidConfig(format!(
                    "x_max must be positive, got {x_max}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Diagonal weight matrix, checked against the state dimension.
pub(crate) fn weight_matrix(diag: &[f64], state_dim: usize) -> Result<DMatrix<f64>, ControlError> {
    if diag.len() != state_dim {
        return Err(DimensionError {
            expected: state_dim,
            got: diag.len(),
        }
        .into());
    }
    if diag.iter().any(|w| !(*w >= 0.0) || !w.is_finite()) {
        return Err(ControlError::InvalidConfig(format!(
            "state weights must be non-negative, got {diag:?}"
        )));
    }
    Ok(diagonal(diag))
}

fn scalar_weight(value: f64, field: &str) -> Result<DMatrix<f64>, ControlError> {
    if value > 0.0 && value.is_finite() {
        Ok(DMatrix::from_element(1, 1, value))
    } else {
        Err(ControlError::InvalidConfig(format!(
            "{field} must be positive, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_defaults() {
        let gains = PidGains::default();
        assert!((gains.kp_angle - 50.0).abs() < f64::EPSILON);
        assert!((gains.kd_position - 4.8).abs() < f64::EPSILON);
    }

    #[test]
    fn defaults_follow_layout() {
        let cart = StateLayout::cart_and_angle();
        let robot = StateLayout::angle_only();
        assert_eq!(default_poles(cart).len(), 4);
        assert_eq!(default_poles(robot), vec![-4.0, -5.0]);
        assert_eq!(LqrConfig::for_layout(cart).q, vec![100.0, 1.0, 10.0, 100.0]);
        assert_eq!(
            HorizonConfig::for_layout(cart).terminal,
            TerminalWeight::Diagonal(vec![1000.0, 1.0, 1.0, 1.0])
        );
        assert_eq!(HorizonConfig::for_layout(robot).horizon, 100);
        assert!(MpcConfig::for_layout(robot).x_max.is_none());
    }

    #[test]
    fn weight_length_checked() {
        let config = LqrConfig::for_layout(StateLayout::angle_only());
        let err = config.q_matrix(4).unwrap_err();
        assert_eq!(
            err,
            ControlError::Dimension(DimensionError {
                expected: 4,
                got: 2
            })
        );
    }

    #[test]
    fn zero_horizon_rejected() {
        let config = HorizonConfig::for_layout(StateLayout::angle_only()).with_horizon(0);
        assert!(matches!(config.validate(), Err(ControlError::InvalidConfig(_))));
    }

    #[test]
    fn non_positive_u_max_rejected() {
        let config = MpcConfig::for_layout(StateLayout::angle_only()).with_u_max(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_r_rejected() {
        let mut config = LqrConfig::for_layout(StateLayout::angle_only());
        config.r = -1.0;
        assert!(config.r_matrix().is_err());
    }

    #[test]
    fn mpc_config_from_toml() {
        let toml_str = r#"
            u_max = 2.5

            [weights]
            horizon = 20
            q = [1.0, 1.0]
            r = 0.5
            terminal = "riccati"
        "#;
        let config: MpcConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.weights.horizon, 20);
        assert_eq!(config.weights.terminal, TerminalWeight::Riccati);
        assert!((config.u_max - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.solver, ClarabelQp::default());
    }
}
