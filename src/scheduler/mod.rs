mod builder;
mod core;
mod cycle;
mod settings;
mod state;
mod stats;

pub use builder::ExtractionSchedulerBuilder;
pub use core::ExtractionScheduler;
pub use settings::{CaptureSettings, CaptureSettingsUpdate};
pub use state::{SchedulerState, TickOutcome};
pub use stats::{CycleReport, SchedulerStats, SchedulerStatsSnapshot};
