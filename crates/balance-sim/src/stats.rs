//! Per-tick controller timing statistics.
//!
//! [`TickStats`] records how long each controller call took, how many calls
//! ran past the sampling period, and how many ticks fell back to a zero
//! command because the QP solver failed.

use std::time::Duration;

// ---------------------------------------------------------------------------
// TickStats
// ---------------------------------------------------------------------------

/// Cumulative controller timing across a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickStats {
    /// Number of controller calls recorded.
    pub ticks: u64,
    /// Calls whose compute time exceeded the sampling period.
    pub overruns: u64,
    /// Calls that returned a fallback command.
    pub solver_fallbacks: u64,
    /// Sum of all compute times.
    pub total_compute: Duration,
    /// Slowest single call.
    pub max_compute: Duration,
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TickStats {
    /// Create empty stats.
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            overruns: 0,
            solver_fallbacks: 0,
            total_compute: Duration::ZERO,
            max_compute: Duration::ZERO,
        }
    }

    /// Record one controller call. Returns `true` if it overran `period`.
    pub fn record(&mut self, elapsed: Duration, period: Duration, fallback: bool) -> bool {
        self.ticks += 1;
        self.total_compute += elapsed;
        self.max_compute = self.max_compute.max(elapsed);
        if fallback {
            self.solver_fallbacks += 1;
        }
        let overrun = elapsed > period;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    /// Mean compute time per call.
    pub fn mean_compute(&self) -> Option<Duration> {
        if self.ticks == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.total_compute.div_f64(self.ticks as f64))
    }

    /// Fraction of calls that overran.
    pub fn overrun_ratio(&self) -> Option<f64> {
        if self.ticks == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.overruns as f64 / self.ticks as f64)
    }

    /// Reset all statistics.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
