pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod recognition;
pub mod region;
pub mod results;
pub mod sampler;
pub mod scheduler;

pub use app::{ExtractionApp, ShutdownHandle, ShutdownReason};
pub use config::AppConfig;
pub use error::{CaptureError, EventBusError, RecognitionError, Result, RoiscanError};
pub use events::{EventBus, EventFilter, EventReceiver, ExtractionEvent};
pub use frame::{FrameSource, ImageFrameSource, PixelRect, PlaybackClock, SourceKind};
pub use recognition::{
    BlockingRecognizer, BoxedRecognizer, CommandRecognizer, Recognition, Recognizer,
    TimeoutRecognizer,
};
pub use region::{Region, RegionDraft, RegionRegistry, RegionUpdate};
pub use results::{ExtractionRecord, RecordDraft, ResultLog};
pub use sampler::{FrameSampler, SampledImage};
pub use scheduler::{
    CaptureSettings, CaptureSettingsUpdate, CycleReport, ExtractionScheduler,
    ExtractionSchedulerBuilder, SchedulerState, SchedulerStatsSnapshot,
};
