//! Episode termination tracking for bounded-state rollouts.
//!
//! An episode runs from construction (or [`EpisodeTracker::reset`]) until the
//! state first leaves its [`Bounds`]. From then on every step reports
//! [`EpisodeSignal::AlreadyTerminated`] with zero reward until reset.

use balance_core::model::StateLayout;
use balance_core::types::{EpisodeSignal, StepOutcome};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 12 degrees, the classic cart-pole failure angle.
pub const DEFAULT_ANGLE_THRESHOLD: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;

/// Cart travel limit in meters.
pub const DEFAULT_POSITION_THRESHOLD: f64 = 2.4;

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Symmetric bounds on the angle and, optionally, the cart position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Maximum |angle| in radians.
    pub angle: f64,
    /// Maximum |position| in meters, for plants with a cart.
    pub position: Option<f64>,
}

impl Bounds {
    /// Returns `true` if `state` is outside the bounds.
    pub fn violated(&self, state: &DVector<f64>, layout: StateLayout) -> bool {
        let theta = state[layout.angle];
        let angle_out = theta < -self.angle || theta > self.angle;
        let position_out = match (self.position, layout.position) {
            (Some(limit), Some(idx)) => state[idx] < -limit || state[idx] > limit,
            _ => false,
        };
        position_out || angle_out
    }
}

// ---------------------------------------------------------------------------
// EpisodeTracker
// ---------------------------------------------------------------------------

/// Tri-state termination bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct EpisodeTracker {
    terminated: bool,
    steps_beyond_done: u32,
}

impl EpisodeTracker {
    pub const fn new() -> Self {
        Self {
            terminated: false,
            steps_beyond_done: 0,
        }
    }

    /// Record the bound check of one step.
    pub fn record(&mut self, out_of_bounds: bool) -> StepOutcome {
        if self.terminated {
            if self.steps_beyond_done == 0 {
                warn!(
                    "stepping an episode that already terminated; call reset_episode() \
                     after a terminal signal"
                );
            }
            self.steps_beyond_done = self.steps_beyond_done.saturating_add(1);
            return StepOutcome {
                signal: EpisodeSignal::AlreadyTerminated,
                reward: 0.0,
            };
        }

        if out_of_bounds {
            self.terminated = true;
            StepOutcome {
                signal: EpisodeSignal::JustTerminated,
                reward: 1.0,
            }
        } else {
            StepOutcome {
                signal: EpisodeSignal::Alive,
                reward: 1.0,
            }
        }
    }

    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Steps taken after the terminating one.
    pub const fn steps_beyond_done(&self) -> u32 {
        self.steps_beyond_done
    }

    pub const fn reset(&mut self) {
        self.terminated = false;
        self.steps_beyond_done = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alive_until_violation() {
        let mut tracker = EpisodeTracker::new();
        let out = tracker.record(false);
        assert_eq!(out.signal, EpisodeSignal::Alive);
        assert!((out.reward - 1.0).abs() < f64::EPSILON);
        assert!(!tracker.is_terminated());
    }

    #[test]
    fn terminates_once_then_stays_terminated() {
        let mut tracker = EpisodeTracker::new();
        let out = tracker.record(true);
        assert_eq!(out.signal, EpisodeSignal::JustTerminated);
        assert!((out.reward - 1.0).abs() < f64::EPSILON);

        // Back in bounds does not revive the episode.
        for _ in 0..3 {
            let out = tracker.record(false);
            assert_eq!(out.signal, EpisodeSignal::AlreadyTerminated);
            assert!(out.reward.abs() < f64::EPSILON);
        }
        assert_eq!(tracker.steps_beyond_done(), 3);
    }

    #[test]
    fn reset_starts_new_episode() {
        let mut tracker = EpisodeTracker::new();
        tracker.record(true);
        tracker.reset();
        assert!(!tracker.is_terminated());
        assert_eq!(tracker.record(false).signal, EpisodeSignal::Alive);
    }

    #[test]
    fn bounds_check_angle_only() {
        let bounds = Bounds {
            angle: DEFAULT_ANGLE_THRESHOLD,
            position: None,
        };
        let layout = StateLayout::angle_only();
        assert!(!bounds.violated(&DVector::from_vec(vec![0.2, 5.0]), layout));
        assert!(bounds.violated(&DVector::from_vec(vec![0.21, 0.0]), layout));
        assert!(bounds.violated(&DVector::from_vec(vec![-0.21, 0.0]), layout));
    }

    #[test]
    fn bounds_check_position() {
        let bounds = Bounds {
            angle: DEFAULT_ANGLE_THRESHOLD,
            position: Some(DEFAULT_POSITION_THRESHOLD),
        };
        let layout = StateLayout::cart_and_angle();
        assert!(!bounds.violated(&DVector::from_vec(vec![2.3, 0.0, 0.0, 0.0]), layout));
        assert!(bounds.violated(&DVector::from_vec(vec![-2.5, 0.0, 0.0, 0.0]), layout));
    }

    #[test]
    fn default_angle_threshold_is_twelve_degrees() {
        assert!((DEFAULT_ANGLE_THRESHOLD - 0.209_439_510_239_319_55).abs() < 1e-12);
    }
}
