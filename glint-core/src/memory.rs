//! In-flight memory accounting with a latched pressure flag.
//!
//! Every emitted frame adds its encoded byte count here and schedules a
//! release one second later (frames are assumed consumed by then). The
//! engine slows down and degrades quality while `pressure` is latched.

/// Total in-flight bytes above which pressure latches: 512 MiB.
pub const MAX_MEMORY_BYTES: u64 = 512 * 1024 * 1024;

/// Tracks bytes in flight between emission and (delayed) release.
#[derive(Debug)]
pub struct MemoryAccountant {
    total: u64,
    pressure: bool,
    limit: u64,
}

impl MemoryAccountant {
    pub fn new() -> Self {
        Self::with_limit(MAX_MEMORY_BYTES)
    }

    /// Custom limit, for tests.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            total: 0,
            pressure: false,
            limit,
        }
    }

    /// Account `bytes` as in flight. Latches pressure once the total
    /// exceeds the limit.
    pub fn add(&mut self, bytes: u64) {
        self.total += bytes;
        if self.total > self.limit {
            self.pressure = true;
        }
    }

    /// Release `bytes`. Saturates at zero (release is idempotent with
    /// respect to over-counting) and unlatches pressure once the total
    /// drops back to or below the limit.
    pub fn release(&mut self, bytes: u64) {
        self.total = self.total.saturating_sub(bytes);
        if self.total <= self.limit {
            self.pressure = false;
        }
    }

    /// Current in-flight byte total.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Latched pressure flag.
    pub fn pressure(&self) -> bool {
        self.pressure
    }
}

impl Default for MemoryAccountant {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_release_pairs_restore_total() {
        let mut acc = MemoryAccountant::new();
        acc.add(1000);
        let before = acc.total();
        acc.add(4242);
        acc.release(4242);
        assert_eq!(acc.total(), before);
    }

    #[test]
    fn pressure_latches_above_limit() {
        let mut acc = MemoryAccountant::with_limit(1024);
        acc.add(1024);
        assert!(!acc.pressure(), "exactly at the limit is not pressure");
        acc.add(1);
        assert!(acc.pressure());
        acc.release(1);
        assert!(!acc.pressure(), "unlatched at or below the limit");
    }

    #[test]
    fn release_never_goes_negative() {
        let mut acc = MemoryAccountant::new();
        acc.add(10);
        acc.release(100);
        assert_eq!(acc.total(), 0);
        acc.release(100);
        assert_eq!(acc.total(), 0);
    }

    #[test]
    fn full_limit_is_512_mib() {
        assert_eq!(MAX_MEMORY_BYTES, 536_870_912);
    }
}
