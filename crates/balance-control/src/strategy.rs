//! Closed set of controller variants and the config that selects one.

use std::fmt;
use std::str::FromStr;

use balance_core::error::ControlError;
use balance_core::model::LinearModel;
use balance_core::traits::{Controller, PolePlacer, RiccatiSolver};
use balance_core::types::Command;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{HorizonConfig, LqrConfig, MpcConfig, PidGains, TerminalWeight, default_poles};
use crate::feedback::StateFeedback;
use crate::finite_horizon::FiniteHorizon;
use crate::mpc::RecedingHorizonMpc;
use crate::pid::Pid;
use crate::placement::{Ackermann, real_poles};
use crate::riccati::SignFunctionCare;

// ---------------------------------------------------------------------------
// ControllerKind
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    Pid,
    PolePlacement,
    Lqr,
    FiniteHorizon,
    Mpc,
}

impl ControllerKind {
    pub const ALL: [Self; 5] = [
        Self::Pid,
        Self::PolePlacement,
        Self::Lqr,
        Self::FiniteHorizon,
        Self::Mpc,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::PolePlacement => "pole_placement",
            Self::Lqr => "lqr",
            Self::FiniteHorizon => "finite_horizon",
            Self::Mpc => "mpc",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerKind {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                ControlError::InvalidConfig(format!(
                    "unknown controller '{s}' (expected one of pid, pole_placement, lqr, \
                     finite_horizon, mpc)"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Controller selection plus optional overrides of the per-plant defaults.
///
/// ```toml
/// [controller]
/// kind = "mpc"
/// horizon = 100
/// u_max = 10.0
/// desired_position = 0.3
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub kind: ControllerKind,
    #[serde(default)]
    pub desired_position: f64,
    /// Prediction horizon (finite-horizon and MPC).
    #[serde(default)]
    pub horizon: Option<usize>,
    /// Input bound (MPC).
    #[serde(default)]
    pub u_max: Option<f64>,
    /// State bound (MPC).
    #[serde(default)]
    pub x_max: Option<f64>,
    /// Real closed-loop poles (pole placement).
    #[serde(default)]
    pub poles: Option<Vec<f64>>,
    /// Diagonal of the state weight (LQR, finite-horizon, MPC).
    #[serde(default)]
    pub q: Option<Vec<f64>>,
    /// Input weight (LQR, finite-horizon, MPC).
    #[serde(default)]
    pub r: Option<f64>,
    /// Terminal weight (finite-horizon and MPC).
    #[serde(default)]
    pub terminal: Option<TerminalWeight>,
    /// Solver wall-clock limit per tick in seconds (MPC).
    #[serde(default)]
    pub time_limit: Option<f64>,
    #[serde(default)]
    pub pid: Option<PidGains>,
}

impl ControllerConfig {
    /// Defaults for `kind`, no overrides.
    pub const fn new(kind: ControllerKind) -> Self {
        Self {
            kind,
            desired_position: 0.0,
            horizon: None,
            u_max: None,
            x_max: None,
            poles: None,
            q: None,
            r: None,
            terminal: None,
            time_limit: None,
            pid: None,
        }
    }

    #[must_use]
    pub const fn with_desired_position(mut self, position: f64) -> Self {
        self.desired_position = position;
        self
    }

    #[must_use]
    pub const fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = Some(horizon);
        self
    }

    fn lqr_config(&self, model: &LinearModel) -> LqrConfig {
        let mut config = LqrConfig::for_layout(model.layout());
        if let Some(q) = &self.q {
            config.q.clone_from(q);
        }
        if let Some(r) = self.r {
            config.r = r;
        }
        config
    }

    fn horizon_config(&self, model: &LinearModel) -> HorizonConfig {
        let mut config = HorizonConfig::for_layout(model.layout());
        if let Some(horizon) = self.horizon {
            config.horizon = horizon;
        }
        if let Some(q) = &self.q {
            config.q.clone_from(q);
        }
        if let Some(r) = self.r {
            config.r = r;
        }
        if let Some(terminal) = &self.terminal {
            config.terminal = terminal.clone();
        }
        config
    }

    fn mpc_config(&self, model: &LinearModel) -> MpcConfig {
        let mut config = MpcConfig::for_layout(model.layout());
        config.weights = self.horizon_config(model);
        if let Some(u_max) = self.u_max {
            config.u_max = u_max;
        }
        config.x_max = self.x_max;
        config.solver.time_limit = self.time_limit;
        config
    }
}

// ---------------------------------------------------------------------------
// ControlStrategy
// ---------------------------------------------------------------------------

/// One of the five controller variants.
#[derive(Debug)]
pub enum ControlStrategy {
    Pid(Pid),
    PolePlacement(StateFeedback),
    Lqr(StateFeedback),
    FiniteHorizon(FiniteHorizon),
    Mpc(RecedingHorizonMpc),
}

impl ControlStrategy {
    /// Build with the default solvers.
    pub fn from_config(config: &ControllerConfig, model: &LinearModel) -> Result<Self, ControlError> {
        Self::from_config_with(config, model, &Ackermann, &SignFunctionCare::default())
    }

    /// Build with injected pole-placement and Riccati solvers.
    pub fn from_config_with(
        config: &ControllerConfig,
        model: &LinearModel,
        placer: &dyn PolePlacer,
        riccati: &dyn RiccatiSolver,
    ) -> Result<Self, ControlError> {
        let mut strategy = match config.kind {
            ControllerKind::Pid => Self::Pid(Pid::new(
                config.pid.clone().unwrap_or_default(),
                model.layout(),
            )),
            ControllerKind::PolePlacement => {
                let poles = config
                    .poles
                    .clone()
                    .unwrap_or_else(|| default_poles(model.layout()));
                Self::PolePlacement(StateFeedback::pole_placement(
                    model,
                    &real_poles(&poles),
                    placer,
                )?)
            }
            ControllerKind::Lqr => {
                Self::Lqr(StateFeedback::lqr(model, &config.lqr_config(model), riccati)?)
            }
            ControllerKind::FiniteHorizon => {
                Self::FiniteHorizon(FiniteHorizon::new(model, &config.horizon_config(model))?)
            }
            ControllerKind::Mpc => Self::Mpc(RecedingHorizonMpc::new(model, config.mpc_config(model))?),
        };
        strategy.set_desired_position(config.desired_position);
        info!(controller = strategy.name(), kind = %config.kind, "controller ready");
        Ok(strategy)
    }

    pub const fn kind(&self) -> ControllerKind {
        match self {
            Self::Pid(_) => ControllerKind::Pid,
            Self::PolePlacement(_) => ControllerKind::PolePlacement,
            Self::Lqr(_) => ControllerKind::Lqr,
            Self::FiniteHorizon(_) => ControllerKind::FiniteHorizon,
            Self::Mpc(_) => ControllerKind::Mpc,
        }
    }

    fn inner(&self) -> &dyn Controller {
        match self {
            Self::Pid(c) => c,
            Self::PolePlacement(c) | Self::Lqr(c) => c,
            Self::FiniteHorizon(c) => c,
            Self::Mpc(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Controller {
        match self {
            Self::Pid(c) => c,
            Self::PolePlacement(c) | Self::Lqr(c) => c,
            Self::FiniteHorizon(c) => c,
            Self::Mpc(c) => c,
        }
    }
}

impl Controller for ControlStrategy {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn set_desired_position(&mut self, position: f64) {
        self.inner_mut().set_desired_position(position);
    }

    fn desired_position(&self) -> f64 {
        self.inner().desired_position()
    }

    fn control(&self, state: &DVector<f64>) -> Command {
        self.inner().control(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_core::model::StateLayout;
    use nalgebra::DMatrix;

    fn robot_model() -> LinearModel {
        LinearModel::new(
            DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 19.62, 0.0]),
            DMatrix::from_column_slice(2, 1, &[0.0, -2.0]),
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            0.01,
            StateLayout::angle_only(),
        )
        .unwrap()
    }

    #[test]
    fn kind_parses_and_displays() {
        for kind in ControllerKind::ALL {
            assert_eq!(kind.to_string().parse::<ControllerKind>().unwrap(), kind);
        }
        assert_eq!("Pole-Placement".parse::<ControllerKind>().unwrap(), ControllerKind::PolePlacement);
        assert!("bang_bang".parse::<ControllerKind>().is_err());
    }

    #[test]
    fn builds_every_kind_for_robot() {
        let model = robot_model();
        for kind in ControllerKind::ALL {
            let config = ControllerConfig::new(kind).with_horizon(20);
            let strategy = ControlStrategy::from_config(&config, &model).unwrap();
            assert_eq!(strategy.kind(), kind);
            let cmd = strategy.control(&DVector::from_vec(vec![0.05, 0.0]));
            assert!(cmd.value.is_finite(), "{kind}");
            assert!(cmd.value > 0.0, "{kind} should push against positive tilt");
        }
    }

    #[test]
    fn desired_position_applied_at_build() {
        let model = robot_model();
        let config = ControllerConfig::new(ControllerKind::Lqr).with_desired_position(0.3);
        let strategy = ControlStrategy::from_config(&config, &model).unwrap();
        assert!((strategy.desired_position() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_override_surfaces_error() {
        let model = robot_model();
        let mut config = ControllerConfig::new(ControllerKind::Lqr);
        config.q = Some(vec![1.0, 1.0, 1.0]);
        assert!(matches!(
            ControlStrategy::from_config(&config, &model),
            Err(ControlError::Dimension(_))
        ));
    }

    #[test]
    fn config_from_toml() {
        let config: ControllerConfig = toml::from_str(
            r#"
            kind = "mpc"
            horizon = 100
            u_max = 10.0
            desired_position = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(config.kind, ControllerKind::Mpc);
        assert_eq!(config.horizon, Some(100));
        assert_eq!(config.u_max, Some(10.0));
        assert!(config.pid.is_none());
    }
}
