//! Feedback controllers for the balancing plants.
//!
//! Five control laws share the [`Controller`](balance_core::traits::Controller)
//! trait and are collected in [`ControlStrategy`]:
//!
//! 1. **PID**: two summed PD loops
//! 2. **Pole placement**: Ackermann gain on the continuous model
//! 3. **LQR**: continuous Riccati gain (matrix sign function)
//! 4. **Finite horizon**: batch LQ on the discrete model, first input applied
//! 5. **MPC**: input-constrained QP solved every tick with Clarabel
//!
//! Every gain and prediction matrix is computed once at construction; a
//! control call only reads the state and the setpoint.

pub mod analysis;
pub mod config;
pub mod feedback;
pub mod finite_horizon;
pub mod mpc;
pub mod pid;
pub mod placement;
pub mod prediction;
pub mod qp;
pub mod riccati;
pub mod strategy;

pub use analysis::AnalysisReport;
pub use config::{HorizonConfig, LqrConfig, MpcConfig, PidGains, TerminalWeight};
pub use feedback::{FeedbackDesign, StateFeedback};
pub use finite_horizon::FiniteHorizon;
pub use mpc::RecedingHorizonMpc;
pub use pid::Pid;
pub use placement::Ackermann;
pub use prediction::Prediction;
pub use qp::ClarabelQp;
pub use riccati::{SignFunctionCare, dlqr, solve_dare};
pub use strategy::{ControlStrategy, ControllerConfig, ControllerKind};
