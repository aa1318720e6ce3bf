use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoiscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Invalid capture settings: {message}")]
    InvalidSettings { message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl RoiscanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn invalid_settings<S: Into<String>>(message: S) -> Self {
        Self::InvalidSettings {
            message: message.into(),
        }
    }
}

/// Reasons a region could not be turned into a recognition-ready image.
///
/// All of these are recoverable: the scheduler skips the region for the
/// current cycle only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("No frame source attached")]
    NoSource,

    #[error("Frame source has no pixel data ({width}x{height})")]
    SourceNotReady { width: u32, height: u32 },

    #[error("Region '{region}' is empty after clamping")]
    DegenerateRegion { region: String },

    #[error("Requested rectangle {x},{y} {width}x{height} exceeds the {frame_width}x{frame_height} frame")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Failed to encode sampled region: {details}")]
    Encoding { details: String },

    #[error("Sampling task aborted: {details}")]
    Aborted { details: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    #[error("Recognition engine failed: {details}")]
    Engine { details: String },

    #[error("Recognition process failed: {details}")]
    Process { details: String },

    #[error("Recognition engine returned unusable output: {details}")]
    InvalidOutput { details: String },

    #[error("Recognition did not finish within {after_ms}ms")]
    TimedOut { after_ms: u64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, RoiscanError>;
