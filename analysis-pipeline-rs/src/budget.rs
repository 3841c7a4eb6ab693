//! Per-request time budget tracking.
//!
//! One `BudgetController` is created when a request arrives and threaded
//! through every stage call. It is a pure function of the wall clock and the
//! stored deadline: remaining time is recomputed at each check point, nothing
//! is mutated, and the controller never preempts a running call; it only
//! prevents new stages from starting and caps how long a caller will wait.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Total per-request budget: 4 minutes, leaving a 1-minute buffer under the
/// externally imposed 5-minute hard limit for assembly and serialization
pub const DEFAULT_TOTAL_BUDGET: Duration = Duration::from_secs(240);

/// Once remaining time drops below this floor, stages go straight to
/// fallback instead of attempting real work
pub const DEFAULT_STAGE_FLOOR: Duration = Duration::from_secs(5);

/// Cap on a single source-acquisition attempt
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

/// Cap on a single visualization attempt
pub const DEFAULT_VIZ_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing knobs for one request's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Total wall-clock budget for the whole request
    pub total: Duration,
    /// Minimum remaining time below which the budget counts as expired
    pub stage_floor: Duration,
    /// Per-attempt cap for source acquisition
    pub source_timeout: Duration,
    /// Per-attempt cap for visualization
    pub viz_timeout: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL_BUDGET,
            stage_floor: DEFAULT_STAGE_FLOOR,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            viz_timeout: DEFAULT_VIZ_TIMEOUT,
        }
    }
}

/// Tracks elapsed time for one request against a fixed deadline
#[derive(Debug, Clone, Copy)]
pub struct BudgetController {
    deadline: Instant,
    stage_floor: Duration,
}

impl BudgetController {
    /// Start a budget now, per the given config
    pub fn start(config: &BudgetConfig) -> Self {
        Self::start_at(Instant::now(), config)
    }

    /// Start a budget anchored to a request's arrival instant.
    ///
    /// Time the request spent queued before processing began counts against
    /// its budget; a long queue wait cannot push the response past the
    /// deadline the caller was promised.
    pub fn start_at(arrival: Instant, config: &BudgetConfig) -> Self {
        Self {
            deadline: arrival + config.total,
            stage_floor: config.stage_floor,
        }
    }

    /// Time left before the deadline; zero once past it
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// True once remaining time is below the stage floor, the point where a
    /// stage can no longer safely attempt real work
    pub fn expired(&self) -> bool {
        self.remaining() <= self.stage_floor
    }

    /// How long a stage may run: the smaller of its own cap and what the
    /// budget can still spare above the floor. Zero when expired.
    pub fn stage_allowance(&self, cap: Duration) -> Duration {
        let spare = self.remaining().saturating_sub(self.stage_floor);
        cap.min(spare)
    }
}
