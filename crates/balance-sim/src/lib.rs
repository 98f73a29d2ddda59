//! Headless closed-loop simulation for the balance workspace.
//!
//! [`Simulator`] drives one plant with an optional controller for a fixed
//! number of frames, recording a [`Trajectory`] and per-tick
//! [`TickStats`]. [`Scenario`] loads the whole setup from TOML.
//!
//! # Example
//!
//! ```no_run
//! use balance_sim::Scenario;
//!
//! let scenario = Scenario::from_file("scenario.toml").unwrap();
//! let mut sim = scenario.build().unwrap();
//! let trajectory = sim.run();
//! trajectory.write_csv("run.csv").unwrap();
//! ```

pub mod scenario;
pub mod simulator;
pub mod stats;
pub mod trajectory;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use scenario::{PlantConfig, PlantKind, Scenario};
pub use simulator::{EpisodeResult, Simulator};
pub use stats::TickStats;
pub use trajectory::{Trajectory, state_labels};
