use serde::{Deserialize, Serialize};

/// Scheduler lifecycle.
///
/// `Draining` is the stopped state while a cycle started before `stop` is
/// still settling; it keeps the backpressure latch closed so a quick
/// restart cannot overlap the old cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Not capturing
    Idle,
    /// Capturing, timer running, no cycle in flight
    Armed,
    /// Capturing with one cycle's region jobs outstanding
    CycleRunning,
    /// Not capturing, but a cycle is still outstanding
    Draining,
}

/// What a timer tick does in a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Start a new cycle
    Launch,
    /// A cycle is in flight; the tick is discarded
    Dropped,
    /// Not capturing; the tick raced with `stop`
    Ignored,
}

impl SchedulerState {
    pub fn start(self) -> Self {
        match self {
            SchedulerState::Idle | SchedulerState::Armed => SchedulerState::Armed,
            SchedulerState::CycleRunning | SchedulerState::Draining => SchedulerState::CycleRunning,
        }
    }

    pub fn stop(self) -> Self {
        match self {
            SchedulerState::Idle | SchedulerState::Armed => SchedulerState::Idle,
            SchedulerState::CycleRunning | SchedulerState::Draining => SchedulerState::Draining,
        }
    }

    pub fn tick(self) -> (Self, TickOutcome) {
        match self {
            SchedulerState::Armed => (SchedulerState::CycleRunning, TickOutcome::Launch),
            SchedulerState::CycleRunning => (SchedulerState::CycleRunning, TickOutcome::Dropped),
            SchedulerState::Idle | SchedulerState::Draining => (self, TickOutcome::Ignored),
        }
    }

    /// All jobs of the in-flight cycle have settled
    pub fn complete(self) -> Self {
        match self {
            SchedulerState::CycleRunning | SchedulerState::Armed => SchedulerState::Armed,
            SchedulerState::Draining | SchedulerState::Idle => SchedulerState::Idle,
        }
    }

    pub fn is_capturing(self) -> bool {
        matches!(self, SchedulerState::Armed | SchedulerState::CycleRunning)
    }

    pub fn cycle_in_flight(self) -> bool {
        matches!(self, SchedulerState::CycleRunning | SchedulerState::Draining)
    }
}
