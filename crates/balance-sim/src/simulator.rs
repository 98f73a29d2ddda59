//! Fixed-frame closed-loop simulation driver.
//!
//! Each frame reads the plant state, asks the controller for a command,
//! and advances the nonlinear dynamics by one sampling period. Controller
//! calls are timed against that period; a slow call is counted and logged
//! but the physical step always happens.

use std::fmt;
use std::time::{Duration, Instant};

use balance_core::traits::{Controller, Plant};
use balance_core::types::{Command, EpisodeSignal};
use tracing::{debug, info};

use crate::stats::TickStats;
use crate::trajectory::{Trajectory, state_labels};

/// Result of an episodic run.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeResult {
    pub trajectory: Trajectory,
    /// Sum of the per-step rewards.
    pub reward: f64,
    /// Whether the plant left its bounds before the frame budget ran out.
    pub terminated: bool,
}

/// Drives one plant with an optional controller.
pub struct Simulator {
    plant: Box<dyn Plant>,
    controller: Option<Box<dyn Controller>>,
    frames: usize,
    stats: TickStats,
}

impl Simulator {
    /// `controller = None` runs the plant open-loop with zero input.
    pub fn new(
        plant: Box<dyn Plant>,
        controller: Option<Box<dyn Controller>>,
        frames: usize,
    ) -> Self {
        Self {
            plant,
            controller,
            frames,
            stats: TickStats::new(),
        }
    }

    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Simulated duration of a full run in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn sim_time(&self) -> f64 {
        self.frames as f64 * self.plant.dt()
    }

    pub fn plant(&self) -> &dyn Plant {
        self.plant.as_ref()
    }

    pub fn plant_mut(&mut self) -> &mut dyn Plant {
        self.plant.as_mut()
    }

    pub fn controller(&self) -> Option<&dyn Controller> {
        self.controller.as_deref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut (dyn Controller + 'static)> {
        self.controller.as_deref_mut()
    }

    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Run all frames on the nonlinear dynamics.
    pub fn run(&mut self) -> Trajectory {
        info!(
            plant = self.plant.name(),
            controller = self.controller_name(),
            frames = self.frames,
            "simulation started"
        );
        let mut trajectory = self.empty_trajectory();
        for frame in 0..self.frames {
            let (u, setpoint) = self.tick();
            self.plant.step_continuous(u);
            trajectory.push(self.frame_time(frame), self.plant.state().clone(), u, setpoint);
        }
        self.log_summary();
        trajectory
    }

    /// Run until the plant leaves its bounds or the frames run out.
    ///
    /// The terminating frame is recorded and its reward counted.
    pub fn run_episode(&mut self) -> EpisodeResult {
        info!(
            plant = self.plant.name(),
            controller = self.controller_name(),
            frames = self.frames,
            "episode started"
        );
        self.plant.reset_episode();
        let mut trajectory = self.empty_trajectory();
        let mut reward = 0.0;
        let mut terminated = false;

        for frame in 0..self.frames {
            let (u, setpoint) = self.tick();
            let outcome = self.plant.step_with_termination(u);
            reward += outcome.reward;
            trajectory.push(self.frame_time(frame), self.plant.state().clone(), u, setpoint);
            if outcome.signal.is_terminal() {
                terminated = true;
                info!(
                    frame,
                    time = self.frame_time(frame),
                    already = outcome.signal == EpisodeSignal::AlreadyTerminated,
                    "episode terminated"
                );
                break;
            }
        }
        self.log_summary();
        EpisodeResult {
            trajectory,
            reward,
            terminated,
        }
    }

    /// One timed controller call; returns the command and the setpoint.
    fn tick(&mut self) -> (f64, f64) {
        let Some(controller) = self.controller.as_deref() else {
            return (0.0, 0.0);
        };

        let start = Instant::now();
        let command: Command = controller.control(self.plant.state());
        let elapsed = start.elapsed();

        let period = Duration::from_secs_f64(self.plant.dt());
        if self.stats.record(elapsed, period, command.is_fallback()) {
            debug!(
                tick = self.stats.ticks,
                elapsed_us = elapsed.as_micros(),
                period_us = period.as_micros(),
                "controller overran sampling period"
            );
        }
        (command.value, controller.desired_position())
    }

    #[allow(clippy::cast_precision_loss)]
    fn frame_time(&self, frame: usize) -> f64 {
        frame as f64 * self.plant.dt()
    }

    fn empty_trajectory(&self) -> Trajectory {
        let labels = state_labels(self.plant.layout(), self.plant.state_dim());
        Trajectory::with_capacity(labels, self.frames)
    }

    fn controller_name(&self) -> &str {
        self.controller.as_deref().map_or("none", |c| c.name())
    }

    fn log_summary(&self) {
        info!(
            ticks = self.stats.ticks,
            overruns = self.stats.overruns,
            fallbacks = self.stats.solver_fallbacks,
            mean_compute_us = self.stats.mean_compute().map(|d| d.as_micros()),
            max_compute_us = self.stats.max_compute.as_micros(),
            "simulation finished"
        );
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("plant", &self.plant.name())
            .field("controller", &self.controller_name())
            .field("frames", &self.frames)
            .field("stats", &self.stats)
            .finish()
    }
}
