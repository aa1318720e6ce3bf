use super::types::ShutdownReason;
use crate::config::AppConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::frame::FrameSource;
use crate::recognition::BoxedRecognizer;
use crate::region::{Region, RegionDraft, RegionRegistry, RegionUpdate};
use crate::results::{ExtractionRecord, ResultLog};
use crate::scheduler::{
    CaptureSettings, CaptureSettingsUpdate, ExtractionScheduler, ExtractionSchedulerBuilder,
};

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How long shutdown waits for an in-flight cycle before exporting anyway
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Hosting context for one extraction session: owns the region registry,
/// the result log, the event bus and the scheduler driving them.
pub struct ExtractionApp {
    pub(super) config: AppConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) registry: Arc<RegionRegistry>,
    pub(super) results: Arc<ResultLog>,
    pub(super) scheduler: ExtractionScheduler,

    // Lifecycle management
    pub(super) export_on_exit: bool,
    pub(super) shutdown_grace: Duration,
    pub(super) shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

/// Cloneable trigger that ends a running `ExtractionApp::run`
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownHandle {
    /// Request shutdown; returns false if one was already requested
    pub fn request(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}

impl ExtractionApp {
    /// Create a session from configuration, seeding the registry with the
    /// configured regions
    pub fn new(
        config: AppConfig,
        source: Option<Arc<dyn FrameSource>>,
        recognizer: BoxedRecognizer,
    ) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let registry = Arc::new(RegionRegistry::with_regions(config.regions.clone()));
        let results = Arc::new(ResultLog::new());

        let mut builder = ExtractionSchedulerBuilder::new()
            .registry(Arc::clone(&registry))
            .results(Arc::clone(&results))
            .recognizer(recognizer)
            .event_bus(Arc::clone(&event_bus))
            .sampler(config.sampler.clone())
            .settings(CaptureSettings::from(&config.capture))
            .autoplay(config.capture.autoplay);
        if let Some(source) = source {
            builder = builder.source(source);
        }
        let scheduler = builder.build()?;

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        info!(
            "Extraction session ready with {} regions",
            registry.len()
        );

        Ok(Self {
            config,
            event_bus,
            registry,
            results,
            scheduler,
            export_on_exit: true,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable writing the result log when a run ends
    pub fn set_export_on_exit(&mut self, enabled: bool) {
        self.export_on_exit = enabled;
    }

    pub fn set_shutdown_grace(&mut self, grace: Duration) {
        self.shutdown_grace = grace;
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            sender: Arc::clone(&self.shutdown_sender),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn scheduler(&self) -> &ExtractionScheduler {
        &self.scheduler
    }

    /// External on/off switch for capturing
    pub fn set_capturing(&self, capturing: bool) {
        self.scheduler.set_capturing(capturing);
    }

    pub fn is_capturing(&self) -> bool {
        self.scheduler.is_capturing()
    }

    pub fn update_settings(&self, update: CaptureSettingsUpdate) -> Result<CaptureSettings> {
        self.scheduler.update_settings(update)
    }

    pub fn settings(&self) -> CaptureSettings {
        self.scheduler.settings()
    }

    pub fn attach_source(&self, source: Arc<dyn FrameSource>) {
        self.scheduler.attach_source(source);
    }

    pub fn add_region(&self, draft: RegionDraft) -> Region {
        self.registry.add(draft)
    }

    pub fn remove_region(&self, id: &str) -> Option<Region> {
        self.registry.remove(id)
    }

    pub fn update_region(&self, id: &str, update: RegionUpdate) -> Option<Region> {
        self.registry.update(id, update)
    }

    pub fn regions(&self) -> Vec<Region> {
        self.registry.list()
    }

    /// Snapshot of the result log in append order
    pub fn export(&self) -> Vec<ExtractionRecord> {
        self.results.export()
    }

    pub fn clear_results(&self) {
        debug!("Clearing {} records", self.results.len());
        self.results.clear();
    }

    pub fn export_json(&self) -> Result<String> {
        self.results.export_json(self.config.export.pretty)
    }

    /// Write the result log into the configured export directory
    pub async fn write_export(&self) -> Result<PathBuf> {
        self.results
            .write_export(&self.config.export.directory, self.config.export.pretty)
            .await
    }
}
