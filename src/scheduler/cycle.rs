use super::core::SchedulerShared;
use super::stats::CycleReport;
use crate::events::ExtractionEvent;
use crate::frame::FrameSource;
use crate::recognition::normalize_text;
use crate::error::CaptureError;
use crate::region::Region;
use crate::results::RecordDraft;
use crate::sampler::SampledImage;

use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, trace};

/// How a single region job settled
#[derive(Debug)]
enum JobOutcome {
    Recorded,
    Empty,
    CaptureFailed,
    RecognitionFailed,
}

impl SchedulerShared {
    /// Run one cycle over a snapshot of the registry.
    ///
    /// Each region is an independent task; the cycle settles once every task
    /// has finished, whatever its outcome.
    pub(super) async fn run_cycle(
        self: Arc<Self>,
        cycle: u64,
        regions: Vec<Region>,
        source: Arc<dyn FrameSource>,
    ) {
        let started = Instant::now();
        let mut report = CycleReport::new(cycle, regions.len());

        debug!("Cycle {} started over {} regions", cycle, regions.len());
        self.emit(ExtractionEvent::CycleStarted {
            cycle,
            regions: regions.len(),
        });

        let mut jobs = JoinSet::new();
        for region in regions {
            let shared = Arc::clone(&self);
            let source = Arc::clone(&source);
            jobs.spawn(async move { shared.run_region_job(cycle, region, source).await });
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(JobOutcome::Recorded) => report.records += 1,
                Ok(JobOutcome::Empty) => report.empty += 1,
                Ok(JobOutcome::CaptureFailed) => report.capture_failures += 1,
                Ok(JobOutcome::RecognitionFailed) => report.recognition_failures += 1,
                Err(e) => {
                    error!("Region job in cycle {} panicked: {}", cycle, e);
                    report.recognition_failures += 1;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        self.stats.record_cycle(&report);

        debug!(
            "Cycle {} completed in {}ms: {} records, {} empty, {} capture failures, {} recognition failures",
            cycle,
            report.duration_ms,
            report.records,
            report.empty,
            report.capture_failures,
            report.recognition_failures
        );
        self.emit(ExtractionEvent::CycleCompleted { report });

        // Idle implies this cycle is already counted
        self.finish_cycle();
    }

    async fn run_region_job(
        &self,
        cycle: u64,
        region: Region,
        source: Arc<dyn FrameSource>,
    ) -> JobOutcome {
        let sample = match self.sample_region(&region, source).await {
            Ok(sample) => sample,
            Err(e) => {
                debug!("Skipping region '{}' in cycle {}: {}", region.name, cycle, e);
                self.emit(ExtractionEvent::RegionSkipped {
                    cycle,
                    region_id: region.id,
                    region_name: region.name,
                    reason: e.to_string(),
                });
                return JobOutcome::CaptureFailed;
            }
        };

        let recognition = match self.recognizer.recognize(&sample).await {
            Ok(recognition) => recognition,
            Err(e) => {
                debug!(
                    "Recognition of region '{}' failed in cycle {} ({}): {}",
                    region.name,
                    cycle,
                    self.recognizer.name(),
                    e
                );
                self.emit(ExtractionEvent::RecognitionFailed {
                    cycle,
                    region_id: region.id,
                    region_name: region.name,
                    error: e.to_string(),
                });
                return JobOutcome::RecognitionFailed;
            }
        };

        let Some(value) = normalize_text(&recognition.text) else {
            trace!("Region '{}' produced no text in cycle {}", region.name, cycle);
            return JobOutcome::Empty;
        };

        // Key is the name from the cycle snapshot, so later renames never
        // rewrite it.
        let record = self
            .results
            .append(RecordDraft::captured_at(sample.position, region.name, value));

        trace!(
            "Cycle {} appended [{}] {}: {} ({:.0}%)",
            cycle,
            record.formatted_time,
            record.key,
            record.value,
            recognition.confidence
        );
        self.emit(ExtractionEvent::RecordAppended { cycle, record });

        JobOutcome::Recorded
    }

    /// Crop, scale and encode on the blocking pool, off the timer's runtime
    async fn sample_region(
        &self,
        region: &Region,
        source: Arc<dyn FrameSource>,
    ) -> Result<SampledImage, CaptureError> {
        let sampler = self.sampler.clone();
        let region = region.clone();

        tokio::task::spawn_blocking(move || sampler.sample(source.as_ref(), &region))
            .await
            .map_err(|e| CaptureError::Aborted {
                details: e.to_string(),
            })?
    }
}
