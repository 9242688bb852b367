//! # glint-core — adaptive screen-share engine
//!
//! Streams the host display to remote viewers over WebSocket while
//! accepting their mouse, keyboard, and quality-control messages.
//!
//! ## Architecture
//!
//! ```text
//! HOST                                           VIEWER
//! ┌──────────────────────────────┐              ┌──────────────────┐
//! │ ScreenSource                 │              │ render <img>     │
//! │   ↓ sample / dedup           │              │   ▲              │
//! │ CaptureEngine (actor)        │  WebSocket   │ screen-update    │
//! │   ↓ coalesce / encode / chunk│ ───────────► │ (-chunk) JSON    │
//! │ Session (one per viewer)     │ ◄─────────── │ mouse-event /    │
//! │   ↓                          │              │ keyboard-event / │
//! │ InputInjector / ports        │              │ quality-update   │
//! └──────────────────────────────┘              └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module       | Purpose                                            |
//! |--------------|----------------------------------------------------|
//! | `types`      | Shared frame / geometry types across the pipeline  |
//! | `profile`    | Display profile table and live quality config      |
//! | `metrics`    | Rolling processing metrics and the frame digest    |
//! | `memory`     | In-flight byte accounting with a pressure latch    |
//! | `controller` | The degrade/improve quality feedback decision      |
//! | `codec`      | Decode, resize, and JPEG-encode frames             |
//! | `engine`     | The singleton capture engine actor                 |
//! | `source`     | Screen-capture port and the GDI implementation     |
//! | `input`      | Mouse/keyboard injection port and `SendInput` impl |
//! | `ports`      | Interfaces to the editor, uploads, chat, secrets   |
//! | `protocol`   | Textual JSON wire envelopes and classification     |
//! | `session`    | Per-viewer duplex message pump                     |
//! | `server`     | TCP/WebSocket listener with idempotent start/stop  |

pub mod codec;
pub mod controller;
pub mod engine;
pub mod error;
pub mod input;
pub mod memory;
pub mod metrics;
pub mod ports;
pub mod profile;
pub mod protocol;
pub mod server;
pub mod session;
pub mod source;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use codec::{FrameCodec, ResizeFilter};
pub use controller::{QualityUpdate, PERFORMANCE_CHECK_INTERVAL};
pub use engine::{CaptureEngine, EngineSnapshot, Subscription};
pub use error::GlintError;
pub use input::{ButtonState, InputInjector, MouseButton, SystemInputInjector};
pub use memory::MemoryAccountant;
pub use metrics::{frame_digest, StreamMetrics};
pub use ports::{
    is_supported_command, AiChatPort, CommandPort, EditorUiPort, FileUploadPort, SecretStore,
    SessionPorts,
};
pub use profile::{select_profile, DisplayProfile, QualityConfig, PROFILES};
pub use protocol::{ClientEnvelope, ServerEnvelope};
pub use server::{ServerConfig, ShareServer};
pub use session::Session;
pub use source::{GdiScreenSource, ScreenSource};
pub use types::{
    ChunkedFrame, EncodedFrame, FrameEncoding, FrameUpdate, RawFrame, ScaledDims, ScreenSize,
    CHUNK_SIZE,
};
