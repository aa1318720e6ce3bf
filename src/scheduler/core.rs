use super::settings::{CaptureSettings, CaptureSettingsUpdate};
use super::state::{SchedulerState, TickOutcome};
use super::stats::{SchedulerStats, SchedulerStatsSnapshot};
use crate::error::Result;
use crate::events::{EventBus, ExtractionEvent};
use crate::frame::FrameSource;
use crate::recognition::BoxedRecognizer;
use crate::region::RegionRegistry;
use crate::results::ResultLog;
use crate::sampler::FrameSampler;

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// State shared between the scheduler handle, its timer and its cycles
pub(super) struct SchedulerShared {
    pub(super) state: Mutex<SchedulerState>,
    pub(super) settings: RwLock<CaptureSettings>,
    pub(super) source: RwLock<Option<Arc<dyn FrameSource>>>,
    pub(super) registry: Arc<RegionRegistry>,
    pub(super) results: Arc<ResultLog>,
    pub(super) recognizer: BoxedRecognizer,
    pub(super) sampler: FrameSampler,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) stats: SchedulerStats,
    pub(super) autoplay: bool,
    /// Id of the most recently launched cycle
    pub(super) current_cycle: AtomicU64,
    /// Mirrors `state.cycle_in_flight()` for waiters
    pub(super) in_flight: watch::Sender<bool>,
}

struct TimerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    fn cancel(self) {
        self.cancel.cancel();
        trace!("Timer task cancelled (finished: {})", self.task.is_finished());
    }
}

/// Periodic region extraction driver.
///
/// Every tick launches one cycle over a snapshot of the registry, unless
/// the previous cycle is still in flight, in which case the tick is dropped.
/// Must be started from within a tokio runtime.
pub struct ExtractionScheduler {
    shared: Arc<SchedulerShared>,
    timer: Mutex<Option<TimerHandle>>,
}

impl ExtractionScheduler {
    pub(super) fn from_parts(
        settings: CaptureSettings,
        source: Option<Arc<dyn FrameSource>>,
        registry: Arc<RegionRegistry>,
        results: Arc<ResultLog>,
        recognizer: BoxedRecognizer,
        sampler: FrameSampler,
        event_bus: Arc<EventBus>,
        autoplay: bool,
    ) -> Self {
        let (in_flight, _) = watch::channel(false);

        Self {
            shared: Arc::new(SchedulerShared {
                state: Mutex::new(SchedulerState::Idle),
                settings: RwLock::new(settings),
                source: RwLock::new(source),
                registry,
                results,
                recognizer,
                sampler,
                event_bus,
                stats: SchedulerStats::new(),
                autoplay,
                current_cycle: AtomicU64::new(0),
                in_flight,
            }),
            timer: Mutex::new(None),
        }
    }

    /// Switch capturing on
    pub fn start(&self) {
        let mut timer = self.timer.lock();

        let previous = {
            let mut state = self.shared.state.lock();
            let previous = *state;
            *state = previous.start();
            previous
        };

        if previous.is_capturing() {
            warn!("Extraction scheduler is already capturing");
            return;
        }

        if self.shared.autoplay {
            if let Some(source) = self.shared.source.read().clone() {
                source.ensure_playing();
            }
        }

        let settings = *self.shared.settings.read();
        info!(
            "Starting extraction every {}ms over {} regions (sensitivity {} is advisory)",
            settings.interval_ms,
            self.shared.registry.len(),
            settings.sensitivity
        );

        if let Some(stale) = timer.take() {
            stale.cancel();
        }
        *timer = Some(spawn_timer(Arc::clone(&self.shared), settings.interval()));

        self.shared.emit(ExtractionEvent::CaptureStarted {
            interval_ms: settings.interval_ms,
        });
    }

    /// Switch capturing off. An in-flight cycle is not cancelled; its
    /// results are still committed when it settles.
    pub fn stop(&self) {
        let mut timer = self.timer.lock();
        if let Some(handle) = timer.take() {
            handle.cancel();
        }

        let (previous, next) = {
            let mut state = self.shared.state.lock();
            let previous = *state;
            *state = previous.stop();
            (previous, *state)
        };

        if !previous.is_capturing() {
            debug!("Extraction scheduler is not capturing");
            return;
        }

        self.shared.emit(ExtractionEvent::CaptureStopped {
            cycle_in_flight: next.cycle_in_flight(),
        });
    }

    /// External on/off switch
    pub fn set_capturing(&self, capturing: bool) {
        if capturing {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Change capture settings. A new interval re-arms the timer starting
    /// from the next tick; a running cycle is unaffected.
    pub fn update_settings(&self, update: CaptureSettingsUpdate) -> Result<CaptureSettings> {
        let mut timer = self.timer.lock();

        let (previous, updated) = {
            let mut settings = self.shared.settings.write();
            let previous = *settings;
            *settings = previous.merged(update)?;
            (previous, *settings)
        };

        if previous.interval_ms != updated.interval_ms && self.is_capturing() {
            debug!(
                "Re-arming timer: {}ms -> {}ms",
                previous.interval_ms, updated.interval_ms
            );
            if let Some(handle) = timer.take() {
                handle.cancel();
            }
            *timer = Some(spawn_timer(Arc::clone(&self.shared), updated.interval()));
        }

        if previous != updated {
            self.shared
                .emit(ExtractionEvent::SettingsChanged { settings: updated });
        }

        Ok(updated)
    }

    /// Attach or replace the frame source read by future cycles
    pub fn attach_source(&self, source: Arc<dyn FrameSource>) {
        if self.shared.autoplay && self.is_capturing() {
            source.ensure_playing();
        }
        *self.shared.source.write() = Some(source);
    }

    pub fn detach_source(&self) -> Option<Arc<dyn FrameSource>> {
        self.shared.source.write().take()
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }

    pub fn is_capturing(&self) -> bool {
        self.state().is_capturing()
    }

    pub fn settings(&self) -> CaptureSettings {
        *self.shared.settings.read()
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn registry(&self) -> Arc<RegionRegistry> {
        Arc::clone(&self.shared.registry)
    }

    pub fn results(&self) -> Arc<ResultLog> {
        Arc::clone(&self.shared.results)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.shared.event_bus)
    }

    /// Wait until no cycle is in flight
    pub async fn wait_until_idle(&self) {
        let mut in_flight = self.shared.in_flight.subscribe();
        let _ = in_flight.wait_for(|busy| !*busy).await;
    }

    /// Wait until no cycle is in flight, giving up after `timeout`.
    ///
    /// Returns false if a cycle was still outstanding when time ran out.
    pub async fn wait_until_idle_for(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.wait_until_idle()).await.is_ok()
    }
}

impl Drop for ExtractionScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.cancel();
        }
    }
}

impl SchedulerShared {
    pub(super) fn emit(&self, event: ExtractionEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            error!("Failed to publish extraction event: {}", e);
        }
    }

    fn ready_source(&self) -> std::result::Result<Arc<dyn FrameSource>, String> {
        let source = self
            .source
            .read()
            .clone()
            .ok_or_else(|| "no frame source attached".to_string())?;

        if !source.is_ready() {
            let (width, height) = source.native_dimensions();
            return Err(format!("frame source has no pixel data ({}x{})", width, height));
        }

        Ok(source)
    }

    fn on_tick(self: &Arc<Self>) {
        let mut state = self.state.lock();
        let (next, outcome) = state.tick();

        match outcome {
            TickOutcome::Ignored => {
                trace!("Tick ignored in state {:?}", *state);
            }
            TickOutcome::Dropped => {
                drop(state);
                let cycle = self.current_cycle.load(Ordering::SeqCst);
                self.stats.ticks_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Cycle {} still in flight, dropping tick", cycle);
                self.emit(ExtractionEvent::TickDropped { cycle });
            }
            TickOutcome::Launch => {
                let source = match self.ready_source() {
                    Ok(source) => source,
                    Err(reason) => {
                        drop(state);
                        self.stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                        debug!("Skipping tick: {}", reason);
                        self.emit(ExtractionEvent::TickSkipped { reason });
                        return;
                    }
                };

                *state = next;
                self.in_flight.send_replace(true);
                let cycle = self.current_cycle.fetch_add(1, Ordering::SeqCst) + 1;
                let regions = self.registry.list();
                drop(state);

                self.stats.cycles_started.fetch_add(1, Ordering::Relaxed);
                tokio::spawn(Arc::clone(self).run_cycle(cycle, regions, source));
            }
        }
    }

    /// Release the backpressure latch once every job of the cycle has settled
    pub(super) fn finish_cycle(&self) {
        let mut state = self.state.lock();
        *state = state.complete();
        self.in_flight.send_replace(false);
    }
}

fn spawn_timer(shared: Arc<SchedulerShared>, period: Duration) -> TimerHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        // Overruns drop ticks instead of bunching them up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => shared.on_tick(),
            }
        }

        trace!("Extraction timer stopped");
    });

    TimerHandle { cancel, task }
}
