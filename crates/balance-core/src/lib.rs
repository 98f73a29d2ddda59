// balance-core: Types, traits, config, and errors for the balance control workspace.

pub mod config;
pub mod error;
pub mod model;
pub mod traits;
pub mod types;

pub mod prelude {
    pub use crate::config::SimConfig;
    pub use crate::error::{BalanceError, ConfigError, ControlError, DimensionError, SolverError};
    pub use crate::model::{LinearModel, StateLayout, diagonal, discretize_euler};
    pub use crate::traits::{Controller, Plant, PolePlacer, QpSolver, RiccatiSolver};
    pub use crate::types::{Command, EpisodeSignal, QpProblem, StepOutcome};
}
