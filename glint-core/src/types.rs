//! Shared types for the capture/stream pipeline.
//!
//! These are **internal** frame representations passed between pipeline
//! stages. The serialisable *wire* envelopes live in [`crate::protocol`].

use std::time::Instant;

use bytes::Bytes;

// ── ScreenSize ───────────────────────────────────────────────────

/// Real display dimensions in physical pixels, read once at engine
/// creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether this display counts as high-resolution for quality
    /// decisions (4K and above).
    pub fn is_high_res(&self) -> bool {
        self.width >= 3840
    }
}

// ── ScaledDims ───────────────────────────────────────────────────

/// Output dimensions derived from the current stream width, preserving
/// the real display's aspect ratio: `height = floor(width * realH / realW)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledDims {
    pub width: u32,
    pub height: u32,
}

impl ScaledDims {
    /// Derive scaled dimensions for `stream_width` against `screen`.
    pub fn derive(stream_width: u32, screen: ScreenSize) -> Self {
        let height = (stream_width as u64 * screen.height as u64 / screen.width as u64) as u32;
        Self {
            width: stream_width,
            height,
        }
    }
}

// ── FrameEncoding ────────────────────────────────────────────────

/// Byte layout of a raw captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEncoding {
    /// A complete PNG image (sources that hand back encoded screenshots).
    Png,
    /// 4 bytes per pixel Blue, Green, Red, Alpha with a row pitch that
    /// may exceed `width * 4` (GDI / DXGI captures).
    Bgra8 { stride: u32 },
}

// ── RawFrame ─────────────────────────────────────────────────────

/// A raw screen sample obtained from the [`crate::source::ScreenSource`].
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Byte layout of `data`.
    pub encoding: FrameEncoding,
    /// Capture payload.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub captured_at: Instant,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, encoding: FrameEncoding, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            encoding,
            data,
            captured_at: Instant::now(),
        }
    }
}

// ── EncodedFrame ─────────────────────────────────────────────────

/// A JPEG-compressed frame ready for delivery to subscribers.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// JPEG bytes. `Bytes` so chunk views can share the allocation.
    pub data: Bytes,
    /// Dimensions the frame was encoded at.
    pub dims: ScaledDims,
}

impl EncodedFrame {
    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

// ── ChunkedFrame ─────────────────────────────────────────────────

/// An encoded frame split into fixed-size sub-buffers because it
/// exceeded the profile's frame-size ceiling. Each chunk is a zero-copy
/// slice of the parent JPEG buffer.
#[derive(Debug, Clone)]
pub struct ChunkedFrame {
    /// Ordered chunk views, all but the last exactly `CHUNK_SIZE` long.
    pub chunks: Vec<Bytes>,
    /// Dimensions of the underlying frame.
    pub dims: ScaledDims,
}

/// Chunk payload size: 32 KiB.
pub const CHUNK_SIZE: usize = 32 * 1024;

impl ChunkedFrame {
    /// Split `frame` into [`CHUNK_SIZE`] sub-buffers (the last chunk may
    /// be shorter). Concatenating the chunks in index order yields the
    /// original encoded buffer exactly.
    pub fn split(frame: &EncodedFrame) -> Self {
        let mut chunks = Vec::with_capacity(frame.data.len().div_ceil(CHUNK_SIZE));
        let mut offset = 0;
        while offset < frame.data.len() {
            let end = (offset + CHUNK_SIZE).min(frame.data.len());
            chunks.push(frame.data.slice(offset..end));
            offset = end;
        }
        Self {
            chunks,
            dims: frame.dims,
        }
    }

    /// Number of chunks.
    pub fn total(&self) -> usize {
        self.chunks.len()
    }
}

// ── FrameUpdate ──────────────────────────────────────────────────

/// What the engine delivers to each subscriber: either a whole encoded
/// frame or a pre-chunked one. Cheap to clone (shared buffers).
#[derive(Debug, Clone)]
pub enum FrameUpdate {
    Full(EncodedFrame),
    Chunked(ChunkedFrame),
}

impl FrameUpdate {
    /// Dimensions of the carried frame.
    pub fn dims(&self) -> ScaledDims {
        match self {
            FrameUpdate::Full(f) => f.dims,
            FrameUpdate::Chunked(c) => c.dims,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_dims_preserve_aspect() {
        let screen = ScreenSize::new(1920, 1080);
        let dims = ScaledDims::derive(1280, screen);
        assert_eq!(dims.width, 1280);
        assert_eq!(dims.height, 720);

        // floor, not round: 960 * 4320 / 7680 = 540 exactly,
        // 1023 * 1080 / 1920 = 575.4375 → 575.
        let dims = ScaledDims::derive(1023, screen);
        assert_eq!(dims.height, 575);
    }

    #[test]
    fn high_res_threshold() {
        assert!(ScreenSize::new(3840, 2160).is_high_res());
        assert!(ScreenSize::new(7680, 4320).is_high_res());
        assert!(!ScreenSize::new(2560, 1440).is_high_res());
    }

    #[test]
    fn chunk_split_covers_buffer_exactly() {
        let dims = ScaledDims {
            width: 1200,
            height: 675,
        };
        // 2 MiB encodes to exactly 64 chunks of 32 KiB.
        let frame = EncodedFrame {
            data: Bytes::from(vec![0x7E; 2 * 1024 * 1024]),
            dims,
        };
        let chunked = ChunkedFrame::split(&frame);
        assert_eq!(chunked.total(), 64);
        assert!(chunked.chunks.iter().all(|c| c.len() == CHUNK_SIZE));

        let rejoined: Vec<u8> = chunked
            .chunks
            .iter()
            .flat_map(|c| c.iter().copied())
            .collect();
        assert_eq!(rejoined, frame.data.as_ref());
    }

    #[test]
    fn chunk_split_short_tail() {
        let dims = ScaledDims {
            width: 800,
            height: 450,
        };
        let frame = EncodedFrame {
            data: Bytes::from(vec![1u8; CHUNK_SIZE + 100]),
            dims,
        };
        let chunked = ChunkedFrame::split(&frame);
        assert_eq!(chunked.total(), 2);
        assert_eq!(chunked.chunks[0].len(), CHUNK_SIZE);
        assert_eq!(chunked.chunks[1].len(), 100);
    }
}
