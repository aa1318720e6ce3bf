use std::time::Duration;

/// Why a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    DurationElapsed(Duration),
    UserRequest,
}
