use crate::config::{SamplerConfig, MAX_SAMPLER_SCALE};
use crate::error::CaptureError;
use crate::frame::{FrameSource, PixelRect};
use crate::region::Region;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, Rgba, RgbaImage};
use imageproc::map::map_colors;
use std::io::Cursor;
use std::sync::Arc;
use tracing::trace;

/// A region rasterized and preprocessed for recognition
#[derive(Debug, Clone)]
pub struct SampledImage {
    pub region_id: String,
    pub region_name: String,
    /// Playback position in seconds when the region was captured
    pub position: f64,
    /// Native pixel rectangle the image was cut from
    pub source_rect: PixelRect,
    /// Preprocessed raster
    pub pixels: Arc<DynamicImage>,
    /// Lossless PNG encoding of `pixels`
    pub png: Arc<Vec<u8>>,
}

impl SampledImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Turns a region of the current frame into a recognition-ready image:
/// percentage-to-pixel transform, upscaling, grayscale, contrast boost, PNG.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    config: SamplerConfig,
    contrast_lut: [u8; 256],
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        let contrast_lut = contrast_table(config.contrast);
        Self {
            config,
            contrast_lut,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Capture and preprocess `region` from the source's current frame
    pub fn sample(
        &self,
        source: &dyn FrameSource,
        region: &Region,
    ) -> Result<SampledImage, CaptureError> {
        let (frame_width, frame_height) = source.native_dimensions();
        if frame_width == 0 || frame_height == 0 {
            return Err(CaptureError::SourceNotReady {
                width: frame_width,
                height: frame_height,
            });
        }

        let rect = pixel_rect(region, frame_width, frame_height).ok_or_else(|| {
            CaptureError::DegenerateRegion {
                region: region.name.clone(),
            }
        })?;

        let position = source.current_time();
        let raw = source.capture(rect)?;

        let pixels = self.preprocess(raw);
        let png = encode_png(&pixels)?;

        trace!(
            "Sampled region '{}' at {:.3}s: {:?} -> {}x{} ({} bytes)",
            region.name,
            position,
            rect,
            pixels.width(),
            pixels.height(),
            png.len()
        );

        Ok(SampledImage {
            region_id: region.id.clone(),
            region_name: region.name.clone(),
            position,
            source_rect: rect,
            pixels: Arc::new(pixels),
            png: Arc::new(png),
        })
    }

    fn preprocess(&self, raw: RgbaImage) -> DynamicImage {
        let target_width = scaled(raw.width(), self.config.scale);
        let target_height = scaled(raw.height(), self.config.scale);

        let resized = if (target_width, target_height) == raw.dimensions() {
            raw
        } else {
            imageops::resize(&raw, target_width, target_height, FilterType::Triangle)
        };

        let lut = &self.contrast_lut;
        if self.config.grayscale {
            let gray: GrayImage = DynamicImage::ImageRgba8(resized).to_luma8();
            DynamicImage::ImageLuma8(map_colors(&gray, |p: Luma<u8>| {
                Luma([lut[p[0] as usize]])
            }))
        } else {
            DynamicImage::ImageRgba8(map_colors(&resized, |p: Rgba<u8>| {
                Rgba([
                    lut[p[0] as usize],
                    lut[p[1] as usize],
                    lut[p[2] as usize],
                    p[3],
                ])
            }))
        }
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}

/// Convert a percentage-space region into the source's native pixel space.
///
/// The region is clamped to the frame first; `None` if nothing remains.
pub fn pixel_rect(region: &Region, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
    let (x0, x1) = clamp_span(region.x, region.width)?;
    let (y0, y1) = clamp_span(region.y, region.height)?;

    let left = to_pixels(x0, frame_width);
    let right = to_pixels(x1, frame_width);
    let top = to_pixels(y0, frame_height);
    let bottom = to_pixels(y1, frame_height);

    let rect = PixelRect::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top));
    if rect.is_empty() {
        None
    } else {
        Some(rect)
    }
}

fn clamp_span(start: f64, length: f64) -> Option<(f64, f64)> {
    if !start.is_finite() || !length.is_finite() {
        return None;
    }

    let begin = start.clamp(0.0, 100.0);
    let end = (start + length).clamp(0.0, 100.0);
    if end > begin {
        Some((begin, end))
    } else {
        None
    }
}

fn to_pixels(percent: f64, extent: u32) -> u32 {
    ((percent / 100.0) * extent as f64).round().min(extent as f64) as u32
}

fn scaled(extent: u32, scale: f32) -> u32 {
    let scale = if scale.is_finite() {
        scale.clamp(0.0, MAX_SAMPLER_SCALE)
    } else {
        1.0
    };
    ((extent as f32) * scale).round().max(1.0) as u32
}

/// Linear contrast around mid-gray, matching the CSS `contrast()` filter
fn contrast_table(amount: f32) -> [u8; 256] {
    let mut table = [0u8; 256];
    for (value, slot) in table.iter_mut().enumerate() {
        let adjusted = (value as f32 - 127.5) * amount + 127.5;
        *slot = adjusted.round().clamp(0.0, 255.0) as u8;
    }
    table
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| CaptureError::Encoding {
            details: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}
