//! Quality controller: the feedback loop that trades fidelity for
//! smoothness.
//!
//! A pure decision function evaluated at most once per
//! [`PERFORMANCE_CHECK_INTERVAL`]. Degradation reacts to drops, slow
//! encodes, and memory pressure; improvement is cautious and never
//! pushes the stream width above the profile's tuned default.
//!
//! External quality updates bypass the controller entirely. They
//! validate against the static bounds only, so a viewer may request a
//! width above the profile default (the controller will not).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::profile::{
    DisplayProfile, QualityConfig, MAX_FPS, MAX_JPEG_QUALITY, MAX_WIDTH, MIN_FPS,
    MIN_JPEG_QUALITY, MIN_WIDTH,
};

/// Minimum spacing between two controller evaluations.
pub const PERFORMANCE_CHECK_INTERVAL: Duration = Duration::from_secs(2);

// ── Decision ─────────────────────────────────────────────────────

/// Rolling observations the controller decides on.
#[derive(Debug, Clone, Copy)]
pub struct ControllerInputs {
    /// Average processing time over the metrics window.
    pub avg_processing: Duration,
    /// Current adaptive sampling interval.
    pub adaptive_interval: Duration,
    /// `dropped / (dropped + sent + 1)`.
    pub drop_rate: f64,
    /// Latched memory-pressure flag.
    pub pressure: bool,
    /// Real display width is 4K or above.
    pub high_res: bool,
}

/// Outcome of one controller evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityAction {
    Degrade,
    Improve,
    Hold,
}

/// Decide whether to degrade, improve, or hold. Pure.
///
/// The branches are mutually exclusive and evaluated in order: a
/// degrade signal always wins over an improve signal.
pub fn decide(inputs: &ControllerInputs) -> QualityAction {
    let drop_threshold = 0.15 * if inputs.pressure { 1.5 } else { 1.0 };

    let degrade = inputs.drop_rate > drop_threshold
        || inputs.avg_processing > inputs.adaptive_interval.mul_f64(0.8)
        || inputs.pressure;
    if degrade {
        return QualityAction::Degrade;
    }

    let improve = inputs.drop_rate < 0.05
        && inputs.avg_processing < inputs.adaptive_interval.mul_f64(0.5)
        && !inputs.pressure;
    if improve {
        return QualityAction::Improve;
    }

    QualityAction::Hold
}

/// Apply a controller decision to `config`. Returns `true` when any
/// field actually changed (the caller recomputes scaled dimensions).
pub fn apply(
    action: QualityAction,
    config: &mut QualityConfig,
    profile: &DisplayProfile,
    high_res: bool,
) -> bool {
    let before = *config;
    match action {
        QualityAction::Degrade => {
            let q_step = if high_res { 8 } else { 5 };
            let w_step = if high_res { 192 } else { 128 };
            config.jpeg_quality = config.jpeg_quality.saturating_sub(q_step).max(MIN_JPEG_QUALITY);
            config.width = config.width.saturating_sub(w_step).max(MIN_WIDTH);
        }
        QualityAction::Improve => {
            let q_step = if high_res { 2 } else { 1 };
            config.jpeg_quality = (config.jpeg_quality + q_step).min(MAX_JPEG_QUALITY);
            // The controller's ceiling is the profile default, never the
            // global MAX_WIDTH.
            config.width = (config.width + 64).min(profile.default_width);
        }
        QualityAction::Hold => {}
    }
    *config != before
}

// ── External updates ─────────────────────────────────────────────

/// A `quality-update` request from a viewer. Each field is validated
/// independently against the static bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(rename = "jpegQuality", skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u8>,
}

/// Apply an external update. A field is accepted iff it lies within its
/// static range and differs from the current value; out-of-range fields
/// are rejected without affecting the others. Returns `true` when any
/// field was applied (the caller resets the rolling metrics window).
pub fn apply_update(config: &mut QualityConfig, update: &QualityUpdate) -> bool {
    let mut changed = false;

    if let Some(width) = update.width {
        if (MIN_WIDTH..=MAX_WIDTH).contains(&width) && width != config.width {
            config.width = width;
            changed = true;
        }
    }
    if let Some(quality) = update.jpeg_quality {
        if (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
            && quality != config.jpeg_quality
        {
            config.jpeg_quality = quality;
            changed = true;
        }
    }
    if let Some(fps) = update.fps {
        if (MIN_FPS..=MAX_FPS).contains(&fps) && fps != config.fps {
            config.fps = fps;
            changed = true;
        }
    }

    changed
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::select_profile;

    fn inputs() -> ControllerInputs {
        ControllerInputs {
            avg_processing: Duration::from_millis(10),
            adaptive_interval: Duration::from_millis(33),
            drop_rate: 0.0,
            pressure: false,
            high_res: false,
        }
    }

    #[test]
    fn high_drop_rate_degrades() {
        let mut i = inputs();
        i.drop_rate = 0.2;
        assert_eq!(decide(&i), QualityAction::Degrade);
    }

    #[test]
    fn slow_encode_degrades() {
        let mut i = inputs();
        i.avg_processing = Duration::from_millis(30); // > 0.8 * 33ms
        assert_eq!(decide(&i), QualityAction::Degrade);
    }

    #[test]
    fn pressure_alone_degrades() {
        let mut i = inputs();
        i.pressure = true;
        assert_eq!(decide(&i), QualityAction::Degrade);
    }

    #[test]
    fn pressure_relaxes_the_drop_threshold() {
        // 0.2 > 0.15 but not > 0.225; without the pressure OR-branch this
        // would hold. Pressure still forces a degrade on its own.
        let mut i = inputs();
        i.drop_rate = 0.2;
        i.pressure = true;
        assert_eq!(decide(&i), QualityAction::Degrade);
    }

    #[test]
    fn calm_stream_improves() {
        let mut i = inputs();
        i.drop_rate = 0.01;
        i.avg_processing = Duration::from_millis(10); // < 0.5 * 33ms
        assert_eq!(decide(&i), QualityAction::Improve);
    }

    #[test]
    fn middling_stream_holds() {
        let mut i = inputs();
        i.drop_rate = 0.10; // neither > 0.15 nor < 0.05
        assert_eq!(decide(&i), QualityAction::Hold);
    }

    #[test]
    fn degrade_steps_and_floors() {
        let profile = select_profile(1920);
        let mut cfg = QualityConfig::from_profile(profile);
        assert!(apply(QualityAction::Degrade, &mut cfg, profile, false));
        assert_eq!(cfg.jpeg_quality, 80);
        assert_eq!(cfg.width, 1312);

        // Repeated degrades are monotone down to the floors, then no-op.
        for _ in 0..20 {
            apply(QualityAction::Degrade, &mut cfg, profile, false);
        }
        assert_eq!(cfg.jpeg_quality, MIN_JPEG_QUALITY);
        assert_eq!(cfg.width, MIN_WIDTH);
        assert!(!apply(QualityAction::Degrade, &mut cfg, profile, false));
    }

    #[test]
    fn high_res_degrades_harder() {
        let profile = select_profile(7680);
        let mut cfg = QualityConfig::from_profile(profile);
        apply(QualityAction::Degrade, &mut cfg, profile, true);
        assert_eq!(cfg.jpeg_quality, 70 - 8);
        assert_eq!(cfg.width, MIN_WIDTH); // 960 - 192 = 768 → floored at 800
    }

    #[test]
    fn improve_caps_at_profile_default() {
        let profile = select_profile(3840);
        let mut cfg = QualityConfig::from_profile(profile);
        cfg.width = 1100;
        cfg.jpeg_quality = 70;
        assert!(apply(QualityAction::Improve, &mut cfg, profile, true));
        assert_eq!(cfg.width, 1164);
        assert_eq!(cfg.jpeg_quality, 72);

        for _ in 0..20 {
            apply(QualityAction::Improve, &mut cfg, profile, true);
        }
        assert_eq!(cfg.width, profile.default_width);
        assert_eq!(cfg.jpeg_quality, MAX_JPEG_QUALITY);
    }

    #[test]
    fn external_update_applies_all_valid_fields() {
        let profile = select_profile(2560);
        let mut cfg = QualityConfig::from_profile(profile);
        let update = QualityUpdate {
            width: Some(1024),
            jpeg_quality: Some(65),
            fps: Some(10),
        };
        assert!(apply_update(&mut cfg, &update));
        assert_eq!(cfg.width, 1024);
        assert_eq!(cfg.jpeg_quality, 65);
        assert_eq!(cfg.fps, 10);
    }

    #[test]
    fn external_update_rejects_fields_independently() {
        let profile = select_profile(2560);
        let mut cfg = QualityConfig::from_profile(profile);
        let update = QualityUpdate {
            width: Some(4000), // out of range
            jpeg_quality: Some(75),
            fps: Some(99), // out of range
        };
        assert!(apply_update(&mut cfg, &update));
        assert_eq!(cfg.width, profile.default_width);
        assert_eq!(cfg.jpeg_quality, 75);
        assert_eq!(cfg.fps, profile.fps);
    }

    #[test]
    fn external_update_ignores_equal_values() {
        let profile = select_profile(2560);
        let mut cfg = QualityConfig::from_profile(profile);
        let update = QualityUpdate {
            width: Some(cfg.width),
            jpeg_quality: None,
            fps: None,
        };
        assert!(!apply_update(&mut cfg, &update));
    }

    #[test]
    fn external_update_may_exceed_profile_default() {
        // The 8K profile defaults to 960 but an explicit request up to
        // MAX_WIDTH is honored.
        let profile = select_profile(7680);
        let mut cfg = QualityConfig::from_profile(profile);
        let update = QualityUpdate {
            width: Some(1920),
            ..Default::default()
        };
        assert!(apply_update(&mut cfg, &update));
        assert_eq!(cfg.width, 1920);
    }
}
