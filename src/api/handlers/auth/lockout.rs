//! Lockout policy for repeated password-challenge failures.
//!
//! The counter and blocked-until state live on the device row; this trait
//! only decides when to block and for how long, so the backoff curve stays a
//! tuning parameter rather than a structural invariant.

use std::time::Duration;

pub trait LockoutPolicy: Send + Sync {
    /// Failed attempts tolerated before a device is blocked.
    fn threshold(&self) -> i32;

    /// Block duration once `error_count` failures have accumulated.
    fn block_duration(&self, error_count: i32) -> Duration;
}

/// Default policy: block at the threshold, double the block for every
/// additional failure, cap at a maximum.
#[derive(Clone, Debug)]
pub struct ProgressiveLockout {
    threshold: i32,
    base: Duration,
    max: Duration,
}

impl ProgressiveLockout {
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: 5,
            base: Duration::from_secs(60),
            max: Duration::from_secs(3600),
        }
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn with_base_seconds(mut self, seconds: u64) -> Self {
        self.base = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn with_max_seconds(mut self, seconds: u64) -> Self {
        self.max = Duration::from_secs(seconds.max(1));
        self
    }
}

impl Default for ProgressiveLockout {
    fn default() -> Self {
        Self::new()
    }
}

impl LockoutPolicy for ProgressiveLockout {
    fn threshold(&self) -> i32 {
        self.threshold
    }

    fn block_duration(&self, error_count: i32) -> Duration {
        if error_count < self.threshold {
            return Duration::ZERO;
        }
        let extra = error_count.saturating_sub(self.threshold).min(31);
        let factor = 1u32 << u32::try_from(extra).unwrap_or(31);
        let delay = self.base.checked_mul(factor).unwrap_or(self.max);
        delay.min(self.max)
    }
}

/// Policy that never blocks; used by tests.
#[derive(Clone, Copy, Debug)]
pub struct NoLockout;

impl LockoutPolicy for NoLockout {
    fn threshold(&self) -> i32 {
        i32::MAX
    }

    fn block_duration(&self, _error_count: i32) -> Duration {
        Duration::ZERO
    }
}
