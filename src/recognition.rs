//! Recognition gateway: the narrow capability the pipeline uses to turn a
//! sampled image into text. Engines are swappable without touching the
//! scheduler or sampler.

use crate::config::{RecognizerConfig, RecognizerOutput};
use crate::error::RecognitionError;
use crate::sampler::SampledImage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

/// Text returned by a recognition engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    /// Engine confidence, 0-100
    #[serde(default)]
    pub confidence: f32,
}

impl Recognition {
    pub fn new<S: Into<String>>(text: S, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 100.0),
        }
    }
}

pub type BoxedRecognizer = Arc<dyn Recognizer>;

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize text in a preprocessed region image
    async fn recognize(&self, image: &SampledImage) -> Result<Recognition, RecognitionError>;

    /// Engine name used in diagnostics
    fn name(&self) -> &str;
}

/// In-process synchronous engine, run on the blocking thread pool
pub struct BlockingRecognizer<F> {
    name: String,
    engine: Arc<F>,
}

impl<F> BlockingRecognizer<F>
where
    F: Fn(&SampledImage) -> Result<Recognition, RecognitionError> + Send + Sync + 'static,
{
    pub fn new<S: Into<String>>(name: S, engine: F) -> Self {
        Self {
            name: name.into(),
            engine: Arc::new(engine),
        }
    }
}

#[async_trait]
impl<F> Recognizer for BlockingRecognizer<F>
where
    F: Fn(&SampledImage) -> Result<Recognition, RecognitionError> + Send + Sync + 'static,
{
    async fn recognize(&self, image: &SampledImage) -> Result<Recognition, RecognitionError> {
        let engine = Arc::clone(&self.engine);
        let image = image.clone();

        tokio::task::spawn_blocking(move || (engine.as_ref())(&image))
            .await
            .map_err(|e| RecognitionError::Engine {
                details: format!("recognition task failed: {}", e),
            })?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Out-of-process engine: pipes the PNG into a command and reads the text
/// from its stdout.
pub struct CommandRecognizer {
    command: String,
    args: Vec<String>,
    output: RecognizerOutput,
}

impl CommandRecognizer {
    pub fn new(config: &RecognizerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            output: config.output,
        }
    }

    fn parse_output(&self, stdout: &[u8]) -> Result<Recognition, RecognitionError> {
        match self.output {
            // Plain-text engines do not report confidence
            RecognizerOutput::Plain => Ok(Recognition::new(
                String::from_utf8_lossy(stdout).into_owned(),
                0.0,
            )),
            RecognizerOutput::Json => {
                let parsed: Recognition = serde_json::from_slice(stdout).map_err(|e| {
                    RecognitionError::InvalidOutput {
                        details: e.to_string(),
                    }
                })?;
                Ok(Recognition::new(parsed.text, parsed.confidence))
            }
        }
    }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    async fn recognize(&self, image: &SampledImage) -> Result<Recognition, RecognitionError> {
        trace!(
            "Running '{}' for region '{}' ({} bytes)",
            self.command,
            image.region_name,
            image.png.len()
        );

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecognitionError::Process {
                details: format!("failed to spawn '{}': {}", self.command, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&image.png)
                .await
                .map_err(|e| RecognitionError::Process {
                    details: format!("failed to write image to '{}': {}", self.command, e),
                })?;
            // Close stdin so the engine sees end of input
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RecognitionError::Process {
                details: format!("failed to wait for '{}': {}", self.command, e),
            })?;

        if !output.status.success() {
            return Err(RecognitionError::Process {
                details: format!(
                    "'{}' exited with {}: {}",
                    self.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        self.parse_output(&output.stdout)
    }

    fn name(&self) -> &str {
        &self.command
    }
}

/// Bounds each recognition call of the wrapped engine.
///
/// The call is abandoned, not cancelled, when the deadline passes: the
/// inner future is dropped and the job reports `TimedOut`.
pub struct TimeoutRecognizer {
    inner: BoxedRecognizer,
    timeout: Duration,
}

impl TimeoutRecognizer {
    pub fn new(inner: BoxedRecognizer, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Recognizer for TimeoutRecognizer {
    async fn recognize(&self, image: &SampledImage) -> Result<Recognition, RecognitionError> {
        match tokio::time::timeout(self.timeout, self.inner.recognize(image)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    "{} did not answer for region '{}' within {:?}",
                    self.inner.name(),
                    image.region_name,
                    self.timeout
                );
                Err(RecognitionError::TimedOut {
                    after_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Build the configured out-of-process engine, wrapped in a timeout if one is set
pub fn from_config(config: &RecognizerConfig) -> BoxedRecognizer {
    let command: BoxedRecognizer = Arc::new(CommandRecognizer::new(config));
    match config.timeout_ms {
        Some(ms) => Arc::new(TimeoutRecognizer::new(command, Duration::from_millis(ms))),
        None => command,
    }
}

/// Trim recognized text and fold line breaks into single spaces.
///
/// Returns `None` when nothing but whitespace was recognized.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace("\r\n", " ").replace('\n', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelRect;
    use image::{DynamicImage, GrayImage};

    fn sampled() -> SampledImage {
        SampledImage {
            region_id: "r1".to_string(),
            region_name: "Subtitle".to_string(),
            position: 1.0,
            source_rect: PixelRect::new(0, 0, 4, 4),
            pixels: Arc::new(DynamicImage::ImageLuma8(GrayImage::new(8, 8))),
            png: Arc::new(vec![0x89, b'P', b'N', b'G']),
        }
    }

    fn command_config(command: &str, args: &[&str], output: RecognizerOutput) -> RecognizerConfig {
        RecognizerConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            output,
            timeout_ms: None,
        }
    }

    struct SlowRecognizer;

    #[async_trait]
    impl Recognizer for SlowRecognizer {
        async fn recognize(&self, _image: &SampledImage) -> Result<Recognition, RecognitionError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Recognition::new("late", 90.0))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  HELLO \n"), Some("HELLO".to_string()));
        assert_eq!(normalize_text("line one\nline two"), Some("line one line two".to_string()));
        assert_eq!(normalize_text("a\r\nb"), Some("a b".to_string()));
        assert_eq!(normalize_text(""), None);
        assert_eq!(normalize_text(" \n\t "), None);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Recognition::new("x", 140.0).confidence, 100.0);
        assert_eq!(Recognition::new("x", -3.0).confidence, 0.0);
    }

    #[tokio::test]
    async fn test_blocking_recognizer() {
        let recognizer = BlockingRecognizer::new("fixed", |image: &SampledImage| {
            Ok(Recognition::new(format!("{}x{}", image.width(), image.height()), 95.0))
        });

        let result = recognizer.recognize(&sampled()).await.unwrap();
        assert_eq!(result.text, "8x8");
        assert_eq!(recognizer.name(), "fixed");
    }

    #[tokio::test]
    async fn test_blocking_recognizer_propagates_engine_error() {
        let recognizer = BlockingRecognizer::new("broken", |_: &SampledImage| {
            Err(RecognitionError::Engine {
                details: "model missing".to_string(),
            })
        });

        let err = recognizer.recognize(&sampled()).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Engine { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_recognizer() {
        let recognizer =
            TimeoutRecognizer::new(Arc::new(SlowRecognizer), Duration::from_millis(500));

        let err = recognizer.recognize(&sampled()).await.unwrap_err();
        assert_eq!(err, RecognitionError::TimedOut { after_ms: 500 });
        assert_eq!(recognizer.name(), "slow");
    }

    #[test]
    fn test_parse_json_output() {
        let recognizer =
            CommandRecognizer::new(&command_config("ocr", &[], RecognizerOutput::Json));

        let parsed = recognizer
            .parse_output(br#"{"text": "HELLO", "confidence": 87.5}"#)
            .unwrap();
        assert_eq!(parsed, Recognition::new("HELLO", 87.5));

        assert!(matches!(
            recognizer.parse_output(b"not json"),
            Err(RecognitionError::InvalidOutput { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_recognizer_reads_stdout() {
        let recognizer = CommandRecognizer::new(&command_config(
            "sh",
            &["-c", "cat > /dev/null; printf 'SCORE 12\\n'"],
            RecognizerOutput::Plain,
        ));

        let result = recognizer.recognize(&sampled()).await.unwrap();
        assert_eq!(result.text, "SCORE 12\n");
        assert_eq!(result.confidence, 0.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_recognizer_reports_failure_status() {
        let recognizer = CommandRecognizer::new(&command_config(
            "sh",
            &["-c", "cat > /dev/null; echo boom >&2; exit 3"],
            RecognizerOutput::Plain,
        ));

        let err = recognizer.recognize(&sampled()).await.unwrap_err();
        match err {
            RecognitionError::Process { details } => assert!(details.contains("boom")),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_recognizer_missing_binary() {
        let recognizer = CommandRecognizer::new(&command_config(
            "/nonexistent/roiscan-ocr",
            &[],
            RecognizerOutput::Plain,
        ));

        let err = recognizer.recognize(&sampled()).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Process { .. }));
    }
}
