//! Display profiles: tuned streaming defaults keyed by screen width.
//!
//! Higher-resolution displays deliberately get a *smaller* default
//! stream width so the encoded cost stays bounded regardless of how
//! many pixels the host panel has.

use crate::types::{ScaledDims, ScreenSize};

// ── Static bounds ────────────────────────────────────────────────

/// Smallest stream width the engine will ever produce.
pub const MIN_WIDTH: u32 = 800;
/// Largest stream width accepted from an external quality update.
pub const MAX_WIDTH: u32 = 1920;
/// JPEG quality floor.
pub const MIN_JPEG_QUALITY: u8 = 60;
/// JPEG quality ceiling.
pub const MAX_JPEG_QUALITY: u8 = 90;
/// Frame-rate bounds.
pub const MIN_FPS: u8 = 1;
pub const MAX_FPS: u8 = 60;

// ── DisplayProfile ───────────────────────────────────────────────

/// A static bundle of tuned defaults for one class of display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayProfile {
    /// Human-readable class name.
    pub name: &'static str,
    /// Smallest real screen width this profile applies to.
    pub min_width: u32,
    /// Stream width the engine starts at (and the controller's ceiling).
    pub default_width: u32,
    /// Initial JPEG quality.
    pub jpeg_quality: u8,
    /// Initial target frames per second.
    pub fps: u8,
    /// Encoded frames larger than this many KiB are chunked.
    pub max_frame_kb: usize,
}

/// Profile table, consulted top-down; the first entry whose `min_width`
/// the real screen width meets wins. The last entry (`min_width = 0`)
/// is the default.
pub static PROFILES: [DisplayProfile; 6] = [
    DisplayProfile {
        name: "8K+",
        min_width: 7680,
        default_width: 960,
        jpeg_quality: 70,
        fps: 20,
        max_frame_kb: 512,
    },
    DisplayProfile {
        name: "5K-6K",
        min_width: 5120,
        default_width: 1024,
        jpeg_quality: 75,
        fps: 25,
        max_frame_kb: 768,
    },
    DisplayProfile {
        name: "4K",
        min_width: 3840,
        default_width: 1200,
        jpeg_quality: 80,
        fps: 30,
        max_frame_kb: 1024,
    },
    DisplayProfile {
        name: "Ultrawide",
        min_width: 3440,
        default_width: 1280,
        jpeg_quality: 82,
        fps: 35,
        max_frame_kb: 1024,
    },
    DisplayProfile {
        name: "QHD",
        min_width: 2560,
        default_width: 1440,
        jpeg_quality: 85,
        fps: 40,
        max_frame_kb: 1280,
    },
    DisplayProfile {
        name: "FHD",
        min_width: 0,
        default_width: 1440,
        jpeg_quality: 85,
        fps: 45,
        max_frame_kb: 1536,
    },
];

/// Select the profile for a real screen width.
pub fn select_profile(screen_width: u32) -> &'static DisplayProfile {
    PROFILES
        .iter()
        .find(|p| screen_width >= p.min_width)
        .unwrap_or(&PROFILES[PROFILES.len() - 1])
}

// ── QualityConfig ────────────────────────────────────────────────

/// The engine's live streaming parameters. Created from a profile,
/// mutated by the quality controller and by external quality updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityConfig {
    /// Stream width in pixels, always within `[MIN_WIDTH, MAX_WIDTH]`.
    pub width: u32,
    /// JPEG quality, always within `[MIN_JPEG_QUALITY, MAX_JPEG_QUALITY]`.
    pub jpeg_quality: u8,
    /// Target frames per second, always within `[MIN_FPS, MAX_FPS]`.
    pub fps: u8,
}

impl QualityConfig {
    /// Initial configuration for a profile.
    pub fn from_profile(profile: &DisplayProfile) -> Self {
        Self {
            width: profile.default_width,
            jpeg_quality: profile.jpeg_quality,
            fps: profile.fps,
        }
    }

    /// Scaled output dimensions for this config against `screen`.
    pub fn scaled_dims(&self, screen: ScreenSize) -> ScaledDims {
        ScaledDims::derive(self.width, screen)
    }
}

// ── Tests ────────────────────────────────────────────────────────
