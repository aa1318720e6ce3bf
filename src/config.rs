use crate::region::RegionDraft;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Smallest sampling interval accepted from configuration or at runtime
pub const MIN_INTERVAL_MS: u64 = 10;

/// Largest upscale factor the sampler accepts
pub const MAX_SAMPLER_SCALE: f32 = 8.0;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub sampler: SamplerConfig,
    pub recognizer: RecognizerConfig,
    pub export: ExportConfig,
    pub system: SystemConfig,
    /// Regions seeded into the registry at startup
    #[serde(default = "default_regions")]
    pub regions: Vec<RegionDraft>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Minimum period between sampling cycles in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Change-detection sensitivity (1-100), advisory only
    #[serde(default = "default_sensitivity")]
    pub sensitivity: u8,

    /// Put file-backed sources into playing state when capture starts
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Magnification applied to the cropped pixel rectangle
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Convert sampled regions to grayscale
    #[serde(default = "default_grayscale")]
    pub grayscale: bool,

    /// Contrast multiplier (1.0 = unchanged, 2.0 = 200%)
    #[serde(default = "default_contrast")]
    pub contrast: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerOutput {
    /// Raw text on stdout
    Plain,
    /// `{"text": ..., "confidence": ...}` on stdout
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecognizerConfig {
    /// External recognition command, fed a PNG on stdin
    #[serde(default = "default_recognizer_command")]
    pub command: String,

    /// Arguments passed to the recognition command
    #[serde(default = "default_recognizer_args")]
    pub args: Vec<String>,

    /// Format of the command's stdout
    #[serde(default = "default_recognizer_output")]
    pub output: RecognizerOutput,

    /// Optional per-call timeout; unset means recognition may take arbitrarily long
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    /// Directory receiving exported result snapshots
    #[serde(default = "default_export_directory")]
    pub directory: String,

    /// Pretty-print exported JSON
    #[serde(default = "default_export_pretty")]
    pub pretty: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl AppConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("roiscan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("capture.interval_ms", default_interval_ms())?
            .set_default("capture.sensitivity", default_sensitivity() as u64)?
            .set_default("capture.autoplay", default_autoplay())?
            .set_default("sampler.scale", default_scale() as f64)?
            .set_default("sampler.grayscale", default_grayscale())?
            .set_default("sampler.contrast", default_contrast() as f64)?
            .set_default("recognizer.command", default_recognizer_command())?
            .set_default("recognizer.args", default_recognizer_args())?
            .set_default("recognizer.output", "plain")?
            .set_default("export.directory", default_export_directory())?
            .set_default("export.pretty", default_export_pretty())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // ROISCAN_CAPTURE__INTERVAL_MS=500 style overrides
            .add_source(
                Environment::with_prefix("ROISCAN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.interval_ms < MIN_INTERVAL_MS {
            return Err(ConfigError::Message(format!(
                "Capture interval_ms must be at least {}",
                MIN_INTERVAL_MS
            )));
        }

        if !(1..=100).contains(&self.capture.sensitivity) {
            return Err(ConfigError::Message(
                "Capture sensitivity must be between 1 and 100".to_string(),
            ));
        }

        if !(self.sampler.scale > 0.0 && self.sampler.scale <= MAX_SAMPLER_SCALE) {
            return Err(ConfigError::Message(format!(
                "Sampler scale must be greater than 0 and at most {}",
                MAX_SAMPLER_SCALE
            )));
        }

        if !(self.sampler.contrast.is_finite() && self.sampler.contrast >= 0.0) {
            return Err(ConfigError::Message(
                "Sampler contrast must not be negative".to_string(),
            ));
        }

        if self.recognizer.command.trim().is_empty() {
            return Err(ConfigError::Message(
                "Recognizer command must not be empty".to_string(),
            ));
        }

        if self.recognizer.timeout_ms == Some(0) {
            return Err(ConfigError::Message(
                "Recognizer timeout_ms must be greater than 0 when set".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                interval_ms: default_interval_ms(),
                sensitivity: default_sensitivity(),
                autoplay: default_autoplay(),
            },
            sampler: SamplerConfig::default(),
            recognizer: RecognizerConfig {
                command: default_recognizer_command(),
                args: default_recognizer_args(),
                output: default_recognizer_output(),
                timeout_ms: None,
            },
            export: ExportConfig {
                directory: default_export_directory(),
                pretty: default_export_pretty(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
            regions: default_regions(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            grayscale: default_grayscale(),
            contrast: default_contrast(),
        }
    }
}

// Default value functions
fn default_interval_ms() -> u64 {
    1000
}
fn default_sensitivity() -> u8 {
    50
}
fn default_autoplay() -> bool {
    true
}

fn default_scale() -> f32 {
    2.0
}
fn default_grayscale() -> bool {
    true
}
fn default_contrast() -> f32 {
    2.0
}

fn default_recognizer_command() -> String {
    "tesseract".to_string()
}
fn default_recognizer_args() -> Vec<String> {
    ["stdin", "stdout", "--psm", "7"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_recognizer_output() -> RecognizerOutput {
    RecognizerOutput::Plain
}

fn default_export_directory() -> String {
    "./exports".to_string()
}
fn default_export_pretty() -> bool {
    true
}

fn default_event_bus_capacity() -> usize {
    100
}

fn default_regions() -> Vec<RegionDraft> {
    vec![
        RegionDraft::new("Speaker", "#FACC15", 10.0, 10.0, 20.0, 10.0),
        RegionDraft::new("Subtitle", "#22D3EE", 10.0, 80.0, 80.0, 15.0),
    ]
}
