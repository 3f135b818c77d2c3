//! FrameEncoder - raw channel bytes to `data:image/jpeg;base64,...`
//!
//! Color channels are JPEG-encoded as-is. Depth channels are clipped to
//! their range, normalized to 8-bit gray and then encoded.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use contracts::{ChannelDescriptor, ChannelKind, DepthRange, ElementLayout, ProcessingConfig};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::{IngestionError, Result};

/// Prefix of every encoded payload.
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    jpeg_quality: u8,
    depth_quality: u8,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(15, 15)
    }
}

impl FrameEncoder {
    pub fn new(jpeg_quality: u8, depth_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
            depth_quality: depth_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.jpeg_quality, config.depth_quality)
    }

    /// Encode one channel's bytes into a data URI.
    pub fn encode(&self, descriptor: &ChannelDescriptor, raw: &[u8]) -> Result<String> {
        let jpeg = self.encode_jpeg(descriptor, raw)?;
        Ok(to_data_uri(&jpeg))
    }

    /// Encode one channel's bytes into JPEG.
    pub fn encode_jpeg(&self, descriptor: &ChannelDescriptor, raw: &[u8]) -> Result<Vec<u8>> {
        let expected = descriptor.byte_size();
        if raw.len() != expected {
            return Err(IngestionError::BufferSize {
                channel_id: descriptor.id.to_string(),
                expected,
                actual: raw.len(),
            });
        }

        match descriptor.kind {
            ChannelKind::Color => self.encode_color(descriptor, raw),
            ChannelKind::Depth => self.encode_depth(descriptor, raw),
        }
    }

    fn encode_color(&self, descriptor: &ChannelDescriptor, raw: &[u8]) -> Result<Vec<u8>> {
        if descriptor.element != ElementLayout::U8 {
            return Err(IngestionError::unsupported_layout(
                descriptor.id.as_str(),
                "color channels must be u8",
            ));
        }

        match descriptor.components() {
            1 => jpeg(descriptor, raw, ExtendedColorType::L8, self.jpeg_quality),
            3 => jpeg(descriptor, raw, ExtendedColorType::Rgb8, self.jpeg_quality),
            4 => {
                // JPEG has no alpha channel
                let rgb: Vec<u8> = raw
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect();
                jpeg(descriptor, &rgb, ExtendedColorType::Rgb8, self.jpeg_quality)
            }
            n => Err(IngestionError::unsupported_layout(
                descriptor.id.as_str(),
                format!("{n} components per pixel"),
            )),
        }
    }

    fn encode_depth(&self, descriptor: &ChannelDescriptor, raw: &[u8]) -> Result<Vec<u8>> {
        if descriptor.element != ElementLayout::F32 || descriptor.components() != 1 {
            return Err(IngestionError::unsupported_layout(
                descriptor.id.as_str(),
                "depth channels must be single-component f32",
            ));
        }

        let gray = depth_to_gray8(raw, descriptor.effective_depth_range());
        jpeg(descriptor, &gray, ExtendedColorType::L8, self.depth_quality)
    }
}

fn jpeg(
    descriptor: &ChannelDescriptor,
    pixels: &[u8],
    color: ExtendedColorType,
    quality: u8,
) -> Result<Vec<u8>> {
    let (width, height) = (descriptor.width() as u32, descriptor.height() as u32);
    let mut out = Vec::with_capacity(pixels.len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(pixels, width, height, color)
        .map_err(|e| IngestionError::encode(descriptor.id.as_str(), e.to_string()))?;
    Ok(out)
}

/// Depth in meters (native-endian f32) to 8-bit gray.
///
/// NaN and +inf map to `max`, -inf to `min`; values are clipped to
/// `[min, max]` and scaled to `0..=255` with truncation.
pub fn depth_to_gray8(raw: &[u8], range: DepthRange) -> Vec<u8> {
    let DepthRange { min, max } = range;
    let span = max - min;

    raw.chunks_exact(4)
        .map(|chunk| {
            let depth: f32 = bytemuck::pod_read_unaligned(chunk);
            let depth = if depth.is_nan() || depth == f32::INFINITY {
                max
            } else if depth == f32::NEG_INFINITY {
                min
            } else {
                depth
            };
            if span <= 0.0 {
                return 0;
            }
            ((depth.clamp(min, max) - min) / span * 255.0) as u8
        })
        .collect()
}

pub fn to_data_uri(jpeg: &[u8]) -> String {
    let mut uri = String::with_capacity(DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    uri.push_str(DATA_URI_PREFIX);
    BASE64.encode_string(jpeg, &mut uri);
    uri
}
