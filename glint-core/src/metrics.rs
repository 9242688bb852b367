//! Rolling stream metrics driving the adaptive quality loop.
//!
//! Tracks per-frame processing times over a bounded window, the
//! dropped/sent counters that feed the drop-rate ratio, and the digest
//! of the most recently accepted raw frame (for deduplication).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum number of processing-time samples retained.
pub const METRICS_WINDOW: usize = 30;

/// Number of trailing samples consulted by the high-motion heuristic.
const HIGH_MOTION_SAMPLES: usize = 5;

/// Number of bytes sampled from a raw frame when computing its digest.
const DIGEST_SAMPLES: usize = 32;

// ── Frame digest ─────────────────────────────────────────────────

/// Cheap content digest of a raw frame buffer.
///
/// Samples [`DIGEST_SAMPLES`] equally spaced bytes (`step = len / 32`,
/// offset `step / 2`) and hashes them with MD5. Collisions at this
/// granularity are acceptable: the digest only gates a "skip if
/// identical to the previous frame" heuristic.
pub fn frame_digest(data: &[u8]) -> [u8; 16] {
    if data.is_empty() {
        return md5::compute([]).0;
    }
    let step = (data.len() / DIGEST_SAMPLES).max(1);
    let offset = step / 2;

    let mut sampled = [0u8; DIGEST_SAMPLES];
    for (i, slot) in sampled.iter_mut().enumerate() {
        let idx = offset + i * step;
        if idx >= data.len() {
            break;
        }
        *slot = data[idx];
    }
    md5::compute(sampled).0
}

// ── StreamMetrics ────────────────────────────────────────────────

/// Rolling metrics for one engine lifetime.
#[derive(Debug)]
pub struct StreamMetrics {
    /// Most recent processing times, capped at [`METRICS_WINDOW`].
    processing: VecDeque<Duration>,
    /// Samples skipped or deduplicated since the last counter reset.
    pub dropped_frames: u64,
    /// Frames emitted since the last counter reset.
    pub frames_sent: u64,
    /// When the last frame was emitted.
    pub last_sent_at: Option<Instant>,
    /// Digest of the most recently accepted (non-duplicate) raw frame.
    pub last_frame_hash: Option<[u8; 16]>,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self {
            processing: VecDeque::with_capacity(METRICS_WINDOW),
            dropped_frames: 0,
            frames_sent: 0,
            last_sent_at: None,
            last_frame_hash: None,
        }
    }

    /// Append a processing-time sample, evicting the oldest beyond the
    /// window cap.
    pub fn record_processing(&mut self, elapsed: Duration) {
        if self.processing.len() == METRICS_WINDOW {
            self.processing.pop_front();
        }
        self.processing.push_back(elapsed);
    }

    /// Average processing time over the whole window, or zero when no
    /// samples exist yet.
    pub fn avg_processing(&self) -> Duration {
        Self::average(self.processing.iter())
    }

    /// Drop rate: `dropped / (dropped + sent + 1)`. The `+1` keeps the
    /// ratio defined before the first frame goes out.
    pub fn drop_rate(&self) -> f64 {
        self.dropped_frames as f64 / (self.dropped_frames + self.frames_sent + 1) as f64
    }

    /// High-motion heuristic: average of the last five samples exceeds
    /// `0.7 ×` the base frame interval.
    pub fn high_motion(&self, base_interval: Duration) -> bool {
        if self.processing.is_empty() {
            return false;
        }
        let tail = self
            .processing
            .iter()
            .rev()
            .take(HIGH_MOTION_SAMPLES);
        Self::average(tail) > base_interval.mul_f64(0.7)
    }

    /// Number of samples currently held.
    pub fn sample_count(&self) -> usize {
        self.processing.len()
    }

    /// Clear the processing-time window (counters are left alone; the
    /// per-second stats tick resets those).
    pub fn reset_window(&mut self) {
        self.processing.clear();
    }

    /// Reset the dropped/sent counters (per-second stats tick).
    pub fn reset_counters(&mut self) {
        self.dropped_frames = 0;
        self.frames_sent = 0;
    }

    /// Full reset: window, counters, hash, and timestamps. Applied when
    /// the last subscriber leaves.
    pub fn reset(&mut self) {
        self.processing.clear();
        self.dropped_frames = 0;
        self.frames_sent = 0;
        self.last_sent_at = None;
        self.last_frame_hash = None;
    }

    fn average<'a>(samples: impl Iterator<Item = &'a Duration>) -> Duration {
        let mut total = Duration::ZERO;
        let mut count = 0u32;
        for s in samples {
            total += *s;
            count += 1;
        }
        if count == 0 {
            Duration::ZERO
        } else {
            total / count
        }
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let data = vec![42u8; 4096];
        assert_eq!(frame_digest(&data), frame_digest(&data));
    }

    #[test]
    fn digest_differs_for_different_content() {
        let a = vec![0u8; 4096];
        let mut b = a.clone();
        // Flip every sampled byte so the 32-point sampling sees it.
        for byte in b.iter_mut() {
            *byte = 0xFF;
        }
        assert_ne!(frame_digest(&a), frame_digest(&b));
    }

    #[test]
    fn digest_blind_to_changes_between_sample_points() {
        // 4096 bytes → step 128, offset 64. Byte 0 is never sampled, so
        // flipping it leaves the digest unchanged (accepted collision
        // granularity).
        let a = vec![0u8; 4096];
        let mut b = a.clone();
        b[0] = 0xFF;
        assert_eq!(frame_digest(&a), frame_digest(&b));
    }

    #[test]
    fn digest_handles_tiny_buffers() {
        assert_eq!(frame_digest(&[1, 2, 3]), frame_digest(&[1, 2, 3]));
        assert_ne!(frame_digest(&[1, 2, 3]), frame_digest(&[3, 2, 1]));
        let _ = frame_digest(&[]);
    }

    #[test]
    fn window_caps_at_thirty() {
        let mut m = StreamMetrics::new();
        for i in 0..40 {
            m.record_processing(Duration::from_millis(i));
        }
        assert_eq!(m.sample_count(), METRICS_WINDOW);
        // Oldest ten were evicted; average covers 10..=39.
        let avg = m.avg_processing();
        assert_eq!(avg, Duration::from_micros(24500));
    }

    #[test]
    fn drop_rate_before_first_frame() {
        let m = StreamMetrics::new();
        assert_eq!(m.drop_rate(), 0.0);
    }

    #[test]
    fn drop_rate_ratio() {
        let mut m = StreamMetrics::new();
        m.dropped_frames = 3;
        m.frames_sent = 16;
        assert!((m.drop_rate() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn high_motion_uses_recent_tail() {
        let mut m = StreamMetrics::new();
        // Old fast samples followed by five slow ones.
        for _ in 0..10 {
            m.record_processing(Duration::from_millis(1));
        }
        assert!(!m.high_motion(Duration::from_millis(33)));
        for _ in 0..5 {
            m.record_processing(Duration::from_millis(60));
        }
        assert!(m.high_motion(Duration::from_millis(33)));
    }

    #[test]
    fn reset_window_keeps_counters() {
        let mut m = StreamMetrics::new();
        m.record_processing(Duration::from_millis(5));
        m.dropped_frames = 2;
        m.frames_sent = 7;
        m.reset_window();
        assert_eq!(m.sample_count(), 0);
        assert_eq!(m.dropped_frames, 2);
        assert_eq!(m.frames_sent, 7);
    }
}
