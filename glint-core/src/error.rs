//! Domain-specific error types for the screen-share engine.
//!
//! All fallible operations return `Result<T, GlintError>`.
//! Every error is typed; per-frame and per-message failures are
//! recoverable by policy.

use thiserror::Error;

/// The canonical error type for the screen-share engine.
#[derive(Debug, Error)]
pub enum GlintError {
    // ── Capture & encode ─────────────────────────────────────────
    /// The screen source failed to produce a frame.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Decoding raw capture bytes into a pixel image failed.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// JPEG encoding produced no usable output.
    #[error("jpeg encode failed: {0}")]
    Encode(String),

    /// A frame had impossible geometry (zero or mismatched dimensions).
    #[error("invalid frame geometry: {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    // ── Engine lifecycle ─────────────────────────────────────────
    /// `initialize` was called while an engine already exists.
    #[error("capture engine is already initialized")]
    AlreadyInitialized,

    /// An operation required an engine but none has been initialized.
    #[error("capture engine is not initialized")]
    NotInitialized,

    /// The engine actor has shut down and no longer accepts commands.
    #[error("engine channel closed")]
    EngineClosed,

    // ── Transport & session ──────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An envelope could not be serialized or parsed.
    #[error("envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    // ── Input & ports ────────────────────────────────────────────
    /// Input injection into the OS failed.
    #[error("input injection failed: {0}")]
    Input(String),

    /// A named key in a keyboard event is not recognized.
    #[error("unknown key: {0}")]
    UnknownKey(String),

    /// An external port (command, upload, chat, UI) reported failure.
    #[error("port error: {0}")]
    Port(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for GlintError {
    fn from(s: String) -> Self {
        GlintError::Other(s)
    }
}

impl From<&str> for GlintError {
    fn from(s: &str) -> Self {
        GlintError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for GlintError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        GlintError::EngineClosed
    }
}
