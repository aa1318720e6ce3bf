use super::core::ExtractionScheduler;
use super::settings::CaptureSettings;
use crate::config::SamplerConfig;
use crate::error::{RoiscanError, Result};
use crate::events::EventBus;
use crate::frame::FrameSource;
use crate::recognition::BoxedRecognizer;
use crate::region::RegionRegistry;
use crate::results::ResultLog;
use crate::sampler::FrameSampler;

use std::sync::Arc;

const COMPONENT: &str = "extraction_scheduler_builder";

/// Builder for ExtractionScheduler
pub struct ExtractionSchedulerBuilder {
    registry: Option<Arc<RegionRegistry>>,
    results: Option<Arc<ResultLog>>,
    recognizer: Option<BoxedRecognizer>,
    event_bus: Option<Arc<EventBus>>,
    source: Option<Arc<dyn FrameSource>>,
    sampler: SamplerConfig,
    settings: CaptureSettings,
    autoplay: bool,
}

impl ExtractionSchedulerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            registry: None,
            results: None,
            recognizer: None,
            event_bus: None,
            source: None,
            sampler: SamplerConfig::default(),
            settings: CaptureSettings::default(),
            autoplay: true,
        }
    }

    /// Set the region registry
    pub fn registry(mut self, registry: Arc<RegionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the result log
    pub fn results(mut self, results: Arc<ResultLog>) -> Self {
        self.results = Some(results);
        self
    }

    /// Set the recognition engine
    pub fn recognizer(mut self, recognizer: BoxedRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Set the event bus
    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Attach a frame source up front
    pub fn source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sampler(mut self, config: SamplerConfig) -> Self {
        self.sampler = config;
        self
    }

    pub fn settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Whether `start` puts file sources into playing state
    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Build the scheduler
    pub fn build(self) -> Result<ExtractionScheduler> {
        let registry = self
            .registry
            .ok_or_else(|| RoiscanError::component(COMPONENT, "Region registry is required"))?;

        let results = self
            .results
            .ok_or_else(|| RoiscanError::component(COMPONENT, "Result log is required"))?;

        let recognizer = self
            .recognizer
            .ok_or_else(|| RoiscanError::component(COMPONENT, "Recognizer is required"))?;

        let event_bus = self
            .event_bus
            .ok_or_else(|| RoiscanError::component(COMPONENT, "Event bus is required"))?;

        self.settings.validate()?;

        Ok(ExtractionScheduler::from_parts(
            self.settings,
            self.source,
            registry,
            results,
            recognizer,
            FrameSampler::new(self.sampler),
            event_bus,
            self.autoplay,
        ))
    }
}

impl Default for ExtractionSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
