//! TOML scenario: simulation timing, one plant and an optional controller.
//!
//! ```toml
//! [sim]
//! control_freq = 100.0
//! frames = 1000
//!
//! [plant]
//! kind = "cart_pendulum"
//! initial_state = [-0.3, 0.0, 0.1, 0.0]
//!
//! [controller]
//! kind = "mpc"
//! horizon = 100
//! u_max = 10.0
//! desired_position = 0.3
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use balance_control::{ControlStrategy, ControllerConfig};
use balance_core::config::SimConfig;
use balance_core::error::{BalanceError, ConfigError};
use balance_core::traits::{Controller, Plant};
use balance_plant::{BalancingRobot, CartPendulum, CartPendulumParams, RobotParams};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::simulator::Simulator;

// ---------------------------------------------------------------------------
// PlantKind
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantKind {
    #[default]
    CartPendulum,
    Robot,
}

impl PlantKind {
    pub const ALL: [Self; 2] = [Self::CartPendulum, Self::Robot];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CartPendulum => "cart_pendulum",
            Self::Robot => "robot",
        }
    }
}

impl fmt::Display for PlantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlantKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "plant.kind".into(),
                message: format!("unknown plant '{s}' (expected cart_pendulum or robot)"),
            })
    }
}

// ---------------------------------------------------------------------------
// PlantConfig
// ---------------------------------------------------------------------------

/// Plant selection, initial state and parameter overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantConfig {
    #[serde(default)]
    pub kind: PlantKind,
    /// Starts at rest upright when absent.
    #[serde(default)]
    pub initial_state: Option<Vec<f64>>,
    #[serde(default)]
    pub cart_pendulum: CartPendulumParams,
    #[serde(default)]
    pub robot: RobotParams,
}

impl PlantConfig {
    pub fn new(kind: PlantKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_initial_state(mut self, state: &[f64]) -> Self {
        self.initial_state = Some(state.to_vec());
        self
    }

    /// Construct the plant and apply the initial state.
    pub fn build(&self, sim: &SimConfig) -> Result<Box<dyn Plant>, BalanceError> {
        let mut plant: Box<dyn Plant> = match self.kind {
            PlantKind::CartPendulum => {
                Box::new(CartPendulum::new(self.cart_pendulum.clone(), sim)?)
            }
            PlantKind::Robot => Box::new(BalancingRobot::new(self.robot.clone(), sim)?),
        };
        if let Some(state) = &self.initial_state {
            plant.set_state(DVector::from_column_slice(state))?;
        }
        Ok(plant)
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// A complete simulation description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub plant: PlantConfig,
    /// Open-loop when absent.
    #[serde(default)]
    pub controller: Option<ControllerConfig>,
}

impl Scenario {
    pub fn new(plant: PlantConfig, controller: Option<ControllerConfig>) -> Self {
        Self {
            sim: SimConfig::default(),
            plant,
            controller,
        }
    }

    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        self.plant.cart_pendulum.validate()?;
        self.plant.robot.validate()?;
        Ok(())
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Build the plant, the controller and the simulator.
    ///
    /// Controller construction failures abort here with their cause.
    pub fn build(&self) -> Result<Simulator, BalanceError> {
        self.validate()?;
        let plant = self.plant.build(&self.sim)?;
        let controller: Option<Box<dyn Controller>> = match &self.controller {
            Some(config) => Some(Box::new(ControlStrategy::from_config(config, plant.model())?)),
            None => None,
        };
        info!(
            plant = %self.plant.kind,
            controller = self.controller.as_ref().map(|c| c.kind.as_str()),
            frames = self.sim.frames,
            dt = self.sim.dt(),
            "scenario built"
        );
        Ok(Simulator::new(plant, controller, self.sim.frames))
    }
}

impl FromStr for Scenario {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scenario: Self = toml::from_str(s)?;
        scenario.validate()?;
        Ok(scenario)
    }
}
