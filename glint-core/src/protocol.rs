//! Wire protocol: textual JSON envelopes exchanged with viewers.
//!
//! # Outbound (server → client)
//!
//! ```text
//! { "type": "screen-update", "image": <base64 jpeg>, "dimensions": {...} }
//! { "type": "screen-update-chunk", "chunk": <base64>, "chunkIndex": i,
//!   "totalChunks": n, "dimensions": {...}, "isLastChunk": bool }
//! { "type": "error", "message": <text> }
//! ```
//!
//! # Inbound (client → server)
//!
//! Binary payloads are first tried as tagged JSON (`mouse-event`,
//! `keyboard-event`, `quality-update`). Payloads that fail to parse,
//! **including valid JSON with an unknown `type`**, fall through to
//! the command predicate and finally to the upload port as opaque
//! bytes. Textual payloads are either a `quality-update` or free-form
//! chat.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::controller::QualityUpdate;
use crate::error::GlintError;
use crate::ports::is_supported_command;
use crate::types::{ChunkedFrame, EncodedFrame, ScaledDims, ScreenSize};

// ── Outbound envelopes ───────────────────────────────────────────

/// Frame dimensions as carried on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<ScaledDims> for Dimensions {
    fn from(dims: ScaledDims) -> Self {
        Self {
            width: dims.width,
            height: dims.height,
        }
    }
}

/// Server → client messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEnvelope {
    ScreenUpdate {
        image: String,
        dimensions: Dimensions,
    },
    ScreenUpdateChunk {
        chunk: String,
        #[serde(rename = "chunkIndex")]
        chunk_index: usize,
        #[serde(rename = "totalChunks")]
        total_chunks: usize,
        dimensions: Dimensions,
        #[serde(rename = "isLastChunk")]
        is_last_chunk: bool,
    },
    Error {
        message: String,
    },
}

impl ServerEnvelope {
    /// Envelope for a whole encoded frame.
    pub fn screen_update(frame: &EncodedFrame) -> Self {
        ServerEnvelope::ScreenUpdate {
            image: BASE64.encode(&frame.data),
            dimensions: frame.dims.into(),
        }
    }

    /// Ordered envelopes for a chunked frame, one per chunk.
    pub fn screen_update_chunks(chunked: &ChunkedFrame) -> Vec<Self> {
        let total = chunked.total();
        chunked
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ServerEnvelope::ScreenUpdateChunk {
                chunk: BASE64.encode(chunk),
                chunk_index: i,
                total_chunks: total,
                dimensions: chunked.dims.into(),
                is_last_chunk: i == total - 1,
            })
            .collect()
    }

    /// Error envelope for per-message failures.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEnvelope::Error {
            message: message.into(),
        }
    }

    /// Serialize to the wire text.
    pub fn to_json(&self) -> Result<String, GlintError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound envelopes ────────────────────────────────────────────

/// Mouse gesture kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MouseEventType {
    Down,
    Up,
    Move,
}

/// Client → server messages with a known tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEnvelope {
    MouseEvent {
        x: f64,
        y: f64,
        #[serde(rename = "eventType")]
        event_type: MouseEventType,
        #[serde(rename = "screenWidth")]
        screen_width: u32,
        #[serde(rename = "screenHeight")]
        screen_height: u32,
    },
    KeyboardEvent {
        key: String,
        #[serde(default)]
        modifier: Option<String>,
    },
    QualityUpdate {
        #[serde(default)]
        width: Option<u32>,
        #[serde(rename = "jpegQuality", default)]
        jpeg_quality: Option<u8>,
        #[serde(default)]
        fps: Option<u8>,
    },
}

// ── Classification ───────────────────────────────────────────────

/// What a binary payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundAction {
    Envelope(ClientEnvelope),
    Command(String),
    Upload(Vec<u8>),
}

/// What a textual payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum TextAction {
    Quality(QualityUpdate),
    Chat(String),
}

/// Classify a binary payload per the inbound protocol.
pub fn classify_binary(data: &[u8]) -> InboundAction {
    if let Ok(envelope) = serde_json::from_slice::<ClientEnvelope>(data) {
        return InboundAction::Envelope(envelope);
    }
    // Parse failures and unknown-tag JSON both land here.
    let text = String::from_utf8_lossy(data);
    if is_supported_command(&text) {
        InboundAction::Command(text.into_owned())
    } else {
        InboundAction::Upload(data.to_vec())
    }
}

/// Classify a textual payload: a quality update applies directly,
/// anything else goes to the AI chat.
pub fn classify_text(text: &str) -> TextAction {
    if let Ok(ClientEnvelope::QualityUpdate {
        width,
        jpeg_quality,
        fps,
    }) = serde_json::from_str::<ClientEnvelope>(text)
    {
        return TextAction::Quality(QualityUpdate {
            width,
            jpeg_quality,
            fps,
        });
    }
    TextAction::Chat(text.to_string())
}

// ── Coordinate mapping ───────────────────────────────────────────

/// Map client-viewport coordinates onto the real display:
/// `actual = floor(coord × real / client)`. Returns `None` when the
/// client reported a degenerate viewport.
pub fn map_to_display(
    x: f64,
    y: f64,
    client_width: u32,
    client_height: u32,
    screen: ScreenSize,
) -> Option<(i32, i32)> {
    if client_width == 0 || client_height == 0 {
        return None;
    }
    let actual_x = (x * screen.width as f64 / client_width as f64).floor() as i32;
    let actual_y = (y * screen.height as f64 / client_height as f64).floor() as i32;
    Some((actual_x, actual_y))
}

// ── Tests ────────────────────────────────────────────────────────
