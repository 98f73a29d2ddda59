//! Shared test fixtures and utilities for balance crates.
//!
//! Provides standard plant fixtures, stub solvers and controllers, and
//! closed-loop stepping helpers.

pub mod episodes;
pub mod mocks;
pub mod plants;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use episodes::{max_abs_angle, run_until_done};
pub use mocks::{
    ConstantController, ConstantQp, FailingRiccati, FallbackController, FixedGainPlacer,
    FixedRiccati, InfeasibleQp, SlowController, UncontrollablePlacer,
};
pub use plants::{cart_pendulum, cart_pendulum_at, robot, robot_at, sim_config, undamped_robot_at};
