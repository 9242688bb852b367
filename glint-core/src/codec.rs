//! Image codec: raw capture bytes → pixel image → sized JPEG.
//!
//! The resize filter is chosen by the engine from current load:
//! nearest-neighbor when encodes are running slow, bilinear otherwise.
//! JPEG output is baseline (non-progressive) with the encoder's default
//! chroma subsampling.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::error::GlintError;
use crate::types::{FrameEncoding, RawFrame, ScaledDims};

// ── ResizeFilter ─────────────────────────────────────────────────

/// Resize quality/speed trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFilter {
    /// Fastest; used when the pipeline is falling behind.
    Nearest,
    /// Default quality.
    Bilinear,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
        }
    }
}

// ── FrameCodec ───────────────────────────────────────────────────

/// Stateless codec over the `image` crate. Cheap to clone into the
/// blocking encode task.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode a raw capture into a pixel image.
    pub fn decode(&self, frame: &RawFrame) -> Result<DynamicImage, GlintError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(GlintError::InvalidGeometry {
                width: frame.width,
                height: frame.height,
            });
        }
        match frame.encoding {
            FrameEncoding::Png => Ok(image::load_from_memory(&frame.data)?),
            FrameEncoding::Bgra8 { stride } => {
                self.decode_bgra(&frame.data, frame.width, frame.height, stride)
            }
        }
    }

    /// Encode to baseline JPEG at `quality`.
    pub fn encode_jpeg(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, GlintError> {
        let mut out = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut out, quality);
        // JPEG has no alpha channel; flatten first.
        img.to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| GlintError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }

    /// Full pipeline: decode, resize to `target` if the decoded size
    /// differs, encode at `quality`.
    pub fn process(
        &self,
        frame: &RawFrame,
        target: ScaledDims,
        filter: ResizeFilter,
        quality: u8,
    ) -> Result<Vec<u8>, GlintError> {
        let mut img = self.decode(frame)?;
        if img.width() != target.width || img.height() != target.height {
            img = img.resize_exact(target.width, target.height, filter.into());
        }
        self.encode_jpeg(&img, quality)
    }

    /// BGRA rows (with possible pitch padding) → packed RGB image.
    fn decode_bgra(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        stride: u32,
    ) -> Result<DynamicImage, GlintError> {
        let stride = stride as usize;
        let row_len = width as usize * 4;
        if stride < row_len || data.len() < stride * height as usize {
            return Err(GlintError::Encode(format!(
                "bgra buffer too short: {} bytes for {}x{} stride {}",
                data.len(),
                width,
                height,
                stride,
            )));
        }

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height as usize {
            let row = &data[y * stride..y * stride + row_len];
            for px in row.chunks_exact(4) {
                rgb.push(px[2]);
                rgb.push(px[1]);
                rgb.push(px[0]);
            }
        }

        let img = RgbImage::from_raw(width, height, rgb).ok_or(GlintError::InvalidGeometry {
            width,
            height,
        })?;
        Ok(DynamicImage::ImageRgb8(img))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawFrame;

    fn png_frame(width: u32, height: u32) -> RawFrame {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        RawFrame::new(width, height, FrameEncoding::Png, buf.into_inner())
    }

    #[test]
    fn decodes_png_capture() {
        let codec = FrameCodec::new();
        let frame = png_frame(64, 48);
        let img = codec.decode(&frame).unwrap();
        assert_eq!(img.width(), 64);
        assert_eq!(img.height(), 48);
    }

    #[test]
    fn decodes_bgra_capture_with_padding() {
        let codec = FrameCodec::new();
        // 2x2 image, stride padded to 12 bytes per row.
        let mut data = vec![0u8; 24];
        // Pixel (0,0): blue=10 green=20 red=30.
        data[0] = 10;
        data[1] = 20;
        data[2] = 30;
        let frame = RawFrame::new(2, 2, FrameEncoding::Bgra8 { stride: 12 }, data);
        let img = codec.decode(&frame).unwrap();
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn rejects_short_bgra_buffer() {
        let codec = FrameCodec::new();
        let frame = RawFrame::new(16, 16, FrameEncoding::Bgra8 { stride: 64 }, vec![0; 100]);
        assert!(codec.decode(&frame).is_err());
    }

    #[test]
    fn rejects_zero_geometry() {
        let codec = FrameCodec::new();
        let frame = RawFrame::new(0, 16, FrameEncoding::Png, vec![]);
        assert!(matches!(
            codec.decode(&frame),
            Err(GlintError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn process_resizes_and_emits_jpeg() {
        let codec = FrameCodec::new();
        let frame = png_frame(128, 72);
        let target = ScaledDims {
            width: 64,
            height: 36,
        };
        let jpeg = codec
            .process(&frame, target, ResizeFilter::Bilinear, 80)
            .unwrap();
        // JPEG magic.
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 36);
    }

    #[test]
    fn process_skips_resize_when_sizes_match() {
        let codec = FrameCodec::new();
        let frame = png_frame(64, 36);
        let target = ScaledDims {
            width: 64,
            height: 36,
        };
        let jpeg = codec
            .process(&frame, target, ResizeFilter::Nearest, 70)
            .unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 64);
    }

    #[test]
    fn lower_quality_is_smaller() {
        let codec = FrameCodec::new();
        let img = codec.decode(&png_frame(256, 144)).unwrap();
        let high = codec.encode_jpeg(&img, 90).unwrap();
        let low = codec.encode_jpeg(&img, 60).unwrap();
        assert!(low.len() < high.len());
    }
}
