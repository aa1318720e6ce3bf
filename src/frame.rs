use crate::error::{CaptureError, RoiscanError, Result};
use image::{imageops, RgbaImage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Instant;
use tracing::{debug, info};

/// How the frame source's playback position advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Seekable file or URL; paused until something starts playback
    File,
    /// Live stream; always advancing, playback controls are no-ops
    Live,
}

/// A rectangle in the source's native pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check that the rectangle lies within a `frame_width` x `frame_height` frame
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x as u64 + self.width as u64 <= frame_width as u64
            && self.y as u64 + self.height as u64 <= frame_height as u64
    }
}

/// Decodable frame source the extraction pipeline reads from.
///
/// Only the playback position, native dimensions and sub-rectangle stills
/// are read; transport control beyond `ensure_playing` belongs to the
/// component that owns the source.
pub trait FrameSource: Send + Sync {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Native pixel dimensions; (0, 0) while nothing decodable is loaded
    fn native_dimensions(&self) -> (u32, u32);

    /// Extract a still of `rect` at the current position
    fn capture(&self, rect: PixelRect) -> std::result::Result<RgbaImage, CaptureError>;

    fn kind(&self) -> SourceKind;

    /// Start playback if the source is seekable and paused
    fn ensure_playing(&self) {}

    fn is_ready(&self) -> bool {
        let (width, height) = self.native_dimensions();
        width > 0 && height > 0
    }
}

/// Playback position tracker driven by the tokio clock
#[derive(Debug)]
pub struct PlaybackClock {
    state: Mutex<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    /// Position accumulated before the current play span
    base_seconds: f64,
    /// Start of the current play span, `None` while paused
    playing_since: Option<Instant>,
}

impl PlaybackClock {
    pub fn paused() -> Self {
        Self {
            state: Mutex::new(ClockState {
                base_seconds: 0.0,
                playing_since: None,
            }),
        }
    }

    pub fn playing() -> Self {
        let clock = Self::paused();
        clock.play();
        clock
    }

    pub fn play(&self) {
        let mut state = self.state.lock();
        if state.playing_since.is_none() {
            state.playing_since = Some(Instant::now());
        }
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if let Some(since) = state.playing_since.take() {
            state.base_seconds += since.elapsed().as_secs_f64();
        }
    }

    pub fn seek(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.base_seconds = seconds.max(0.0);
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing_since.is_some()
    }

    pub fn position(&self) -> f64 {
        let state = self.state.lock();
        match state.playing_since {
            Some(since) => state.base_seconds + since.elapsed().as_secs_f64(),
            None => state.base_seconds,
        }
    }
}

/// Frame source backed by a decoded still raster.
///
/// Every position shows the same picture, which makes capture
/// deterministic between advances.
pub struct ImageFrameSource {
    frame: Option<RgbaImage>,
    kind: SourceKind,
    clock: PlaybackClock,
}

impl ImageFrameSource {
    pub fn new(frame: RgbaImage, kind: SourceKind) -> Self {
        let clock = match kind {
            SourceKind::File => PlaybackClock::paused(),
            SourceKind::Live => PlaybackClock::playing(),
        };

        Self {
            frame: Some(frame),
            kind,
            clock,
        }
    }

    /// Decode an image file into a frame source
    pub fn open<P: AsRef<Path>>(path: P, kind: SourceKind) -> Result<Self> {
        let path = path.as_ref();
        let frame = image::open(path)
            .map_err(|e| {
                RoiscanError::component(
                    "frame_source".to_string(),
                    format!("Failed to decode {}: {}", path.display(), e),
                )
            })?
            .to_rgba8();

        info!(
            "Opened {:?} frame source {} ({}x{})",
            kind,
            path.display(),
            frame.width(),
            frame.height()
        );

        Ok(Self::new(frame, kind))
    }

    /// A source with nothing loaded, reporting zero dimensions
    pub fn unloaded(kind: SourceKind) -> Self {
        Self {
            frame: None,
            kind,
            clock: PlaybackClock::paused(),
        }
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }
}

impl FrameSource for ImageFrameSource {
    fn current_time(&self) -> f64 {
        self.clock.position()
    }

    fn native_dimensions(&self) -> (u32, u32) {
        self.frame
            .as_ref()
            .map(|frame| frame.dimensions())
            .unwrap_or((0, 0))
    }

    fn capture(&self, rect: PixelRect) -> std::result::Result<RgbaImage, CaptureError> {
        let frame = self.frame.as_ref().ok_or(CaptureError::SourceNotReady {
            width: 0,
            height: 0,
        })?;

        let (frame_width, frame_height) = frame.dimensions();
        if !rect.fits_within(frame_width, frame_height) {
            return Err(CaptureError::OutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                frame_width,
                frame_height,
            });
        }

        Ok(imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image())
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn ensure_playing(&self) {
        if self.kind == SourceKind::File && !self.clock.is_playing() {
            debug!("Starting playback of file source");
            self.clock.play();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::time::Duration;

    fn checkerboard(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_unloaded_source_reports_zero_dimensions() {
        let source = ImageFrameSource::unloaded(SourceKind::File);

        assert_eq!(source.native_dimensions(), (0, 0));
        assert!(!source.is_ready());
        assert!(source.capture(PixelRect::new(0, 0, 1, 1)).is_err());
    }

    #[test]
    fn test_capture_crops_sub_rectangle() {
        let source = ImageFrameSource::new(checkerboard(8, 6), SourceKind::Live);

        let crop = source.capture(PixelRect::new(1, 0, 3, 2)).unwrap();
        assert_eq!(crop.dimensions(), (3, 2));
        // (1,0) in the source is black
        assert_eq!(crop.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(crop.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_capture_rejects_out_of_bounds() {
        let source = ImageFrameSource::new(checkerboard(8, 6), SourceKind::Live);

        let err = source.capture(PixelRect::new(6, 0, 4, 2)).unwrap_err();
        assert!(matches!(err, CaptureError::OutOfBounds { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_source_starts_paused_until_ensure_playing() {
        let source = ImageFrameSource::new(checkerboard(4, 4), SourceKind::File);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.current_time(), 0.0);

        source.ensure_playing();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!((source.current_time() - 1.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_pause_and_seek() {
        let clock = PlaybackClock::playing();

        tokio::time::sleep(Duration::from_secs(3)).await;
        clock.pause();
        let paused_at = clock.position();
        assert!((paused_at - 3.0).abs() < 1e-6);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.position(), paused_at);

        clock.seek(42.0);
        assert_eq!(clock.position(), 42.0);
        clock.seek(-1.0);
        assert_eq!(clock.position(), 0.0);
    }
}
