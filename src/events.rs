use crate::error::EventBusError;
use crate::results::ExtractionRecord;
use crate::scheduler::{CaptureSettings, CycleReport};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Events emitted by the extraction pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExtractionEvent {
    /// Capturing was switched on
    CaptureStarted { interval_ms: u64 },
    /// Capturing was switched off; an in-flight cycle still commits
    CaptureStopped { cycle_in_flight: bool },
    /// A sampling cycle launched over a snapshot of `regions` regions
    CycleStarted { cycle: u64, regions: usize },
    /// Every job of a cycle settled
    CycleCompleted { report: CycleReport },
    /// A tick fired while `cycle` was still in flight and was dropped
    TickDropped { cycle: u64 },
    /// A tick fired but the frame source could not provide pixels
    TickSkipped { reason: String },
    /// A region could not be captured this cycle
    RegionSkipped {
        cycle: u64,
        region_id: String,
        region_name: String,
        reason: String,
    },
    /// The recognition engine failed for a region this cycle
    RecognitionFailed {
        cycle: u64,
        region_id: String,
        region_name: String,
        error: String,
    },
    /// A record was appended to the result log
    RecordAppended { cycle: u64, record: ExtractionRecord },
    /// Capture settings changed
    SettingsChanged { settings: CaptureSettings },
}

impl ExtractionEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ExtractionEvent::CaptureStarted { interval_ms } => {
                format!("Capture started (every {}ms)", interval_ms)
            }
            ExtractionEvent::CaptureStopped { cycle_in_flight } => {
                if *cycle_in_flight {
                    "Capture stopped, draining in-flight cycle".to_string()
                } else {
                    "Capture stopped".to_string()
                }
            }
            ExtractionEvent::CycleStarted { cycle, regions } => {
                format!("Cycle {} started with {} regions", cycle, regions)
            }
            ExtractionEvent::CycleCompleted { report } => format!(
                "Cycle {} completed: {} records, {} empty, {} capture failures, {} recognition failures",
                report.cycle,
                report.records,
                report.empty,
                report.capture_failures,
                report.recognition_failures
            ),
            ExtractionEvent::TickDropped { cycle } => {
                format!("Tick dropped while cycle {} in flight", cycle)
            }
            ExtractionEvent::TickSkipped { reason } => format!("Tick skipped: {}", reason),
            ExtractionEvent::RegionSkipped {
                region_name, reason, ..
            } => format!("Region '{}' skipped: {}", region_name, reason),
            ExtractionEvent::RecognitionFailed {
                region_name, error, ..
            } => format!("Recognition failed for '{}': {}", region_name, error),
            ExtractionEvent::RecordAppended { record, .. } => format!(
                "[{}] {}: {}",
                record.formatted_time, record.key, record.value
            ),
            ExtractionEvent::SettingsChanged { settings } => format!(
                "Settings changed: interval {}ms, sensitivity {}",
                settings.interval_ms, settings.sensitivity
            ),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ExtractionEvent::CaptureStarted { .. } => "capture_started",
            ExtractionEvent::CaptureStopped { .. } => "capture_stopped",
            ExtractionEvent::CycleStarted { .. } => "cycle_started",
            ExtractionEvent::CycleCompleted { .. } => "cycle_completed",
            ExtractionEvent::TickDropped { .. } => "tick_dropped",
            ExtractionEvent::TickSkipped { .. } => "tick_skipped",
            ExtractionEvent::RegionSkipped { .. } => "region_skipped",
            ExtractionEvent::RecognitionFailed { .. } => "recognition_failed",
            ExtractionEvent::RecordAppended { .. } => "record_appended",
            ExtractionEvent::SettingsChanged { .. } => "settings_changed",
        }
    }
}

/// Broadcast bus connecting the scheduler to whoever watches it
pub struct EventBus {
    sender: broadcast::Sender<ExtractionEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ExtractionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Publishing with nobody listening is not an error; it returns `Ok(0)`.
    pub fn publish(&self, event: ExtractionEvent) -> Result<usize, EventBusError> {
        match &event {
            ExtractionEvent::CaptureStarted { .. } | ExtractionEvent::CaptureStopped { .. } => {
                info!("{}", event.description());
            }
            ExtractionEvent::RecognitionFailed { .. } => {
                warn!("{}", event.description());
            }
            _ => trace!("Publishing event: {}", event.description()),
        }

        if self.sender.receiver_count() == 0 {
            trace!("No subscribers for {}", event.event_type());
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events concerning specific region ids
    Regions(Vec<String>),
    /// Custom filter function
    Custom(fn(&ExtractionEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &ExtractionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Regions(ids) => match event {
                ExtractionEvent::RegionSkipped { region_id, .. }
                | ExtractionEvent::RecognitionFailed { region_id, .. } => ids.contains(region_id),
                _ => false,
            },
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<ExtractionEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<ExtractionEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next matching event, skipping over lag
    pub async fn recv(&mut self) -> Result<ExtractionEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        trace!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive a matching event without waiting
    pub fn try_recv(&mut self) -> Result<Option<ExtractionEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{RecordDraft, ResultLog};
    use tokio::time::{timeout, Duration};

    fn record_event() -> ExtractionEvent {
        let log = ResultLog::new();
        ExtractionEvent::RecordAppended {
            cycle: 3,
            record: log.append(RecordDraft::captured_at(12.0, "Speaker", "ALICE")),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(record_event()).unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            ExtractionEvent::RecordAppended { cycle, record } => {
                assert_eq!(cycle, 3);
                assert_eq!(record.value, "ALICE");
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let event_bus = EventBus::new(10);

        assert_eq!(event_bus.publish(record_event()).unwrap(), 0);
        assert!(!event_bus.has_subscribers());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(ExtractionEvent::TickDropped { cycle: 1 })
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["record_appended", "cycle_started"]);

        assert!(filter.matches(&record_event()));
        assert!(filter.matches(&ExtractionEvent::CycleStarted { cycle: 1, regions: 2 }));
        assert!(!filter.matches(&ExtractionEvent::TickDropped { cycle: 1 }));

        let regions = EventFilter::Regions(vec!["r1".to_string()]);
        assert!(regions.matches(&ExtractionEvent::RegionSkipped {
            cycle: 1,
            region_id: "r1".to_string(),
            region_name: "Speaker".to_string(),
            reason: "empty".to_string(),
        }));
        assert!(!regions.matches(&record_event()));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let receiver = event_bus.subscribe();
        let filter = EventFilter::EventTypes(vec!["record_appended"]);
        let mut filtered_receiver = EventReceiver::new(receiver, filter, "test".to_string());

        event_bus
            .publish(ExtractionEvent::CycleStarted { cycle: 3, regions: 1 })
            .unwrap();
        event_bus.publish(record_event()).unwrap();

        let received = timeout(Duration::from_millis(100), filtered_receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "record_appended");
        assert!(filtered_receiver.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_properties() {
        let event = record_event();

        assert_eq!(event.event_type(), "record_appended");
        assert_eq!(event.description(), "[00:00:12] Speaker: ALICE");
    }
}
