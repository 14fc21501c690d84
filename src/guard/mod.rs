// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Login Attempt Guard
//!
//! Tracks failed login attempts per identifier and enforces a
//! maximum-attempts-then-lockout policy over a rolling time window.
//!
//! The policy is deliberately split from the storage: [`policy`] contains pure
//! functions over timestamp sequences, and [`AttemptGuard`] wires them to a
//! concurrent in-process map. The guard never raises user-visible errors; it
//! only returns decisions, and the caller translates "blocked" into an HTTP
//! rejection carrying the remaining lockout time.
//!
//! Records live in process memory and are lost on restart. That is a known
//! limitation of the single-instance deployment this serves, not a
//! correctness requirement.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Maximum failed attempts tolerated inside the lockout window.
pub const MAX_LOGIN_ATTEMPTS: usize = 5;

/// Lockout window: 5 minutes, measured from the oldest retained attempt.
pub const LOCKOUT_WINDOW_SECS: i64 = 5 * 60;

/// Decision returned by [`AttemptGuard::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// The identifier may attempt a login.
    Allowed,
    /// The identifier is locked out for `remaining_secs` more seconds.
    Blocked { remaining_secs: u64 },
}

impl BlockStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BlockStatus::Blocked { .. })
    }

    /// Remaining lockout seconds, or zero when allowed.
    pub fn remaining_secs(&self) -> u64 {
        match self {
            BlockStatus::Allowed => 0,
            BlockStatus::Blocked { remaining_secs } => *remaining_secs,
        }
    }
}

/// Pure lockout policy over a chronologically ordered timestamp sequence.
pub mod policy {
    use super::*;

    /// Drop attempts that fell out of the trailing window.
    ///
    /// Retains insertion order, so the head of the vector stays the oldest
    /// attempt still counted toward the threshold.
    pub fn prune(attempts: &mut Vec<DateTime<Utc>>, window: Duration, now: DateTime<Utc>) {
        attempts.retain(|t| now.signed_duration_since(*t) < window);
    }

    /// Remaining lockout seconds if the (already pruned) sequence crosses the
    /// threshold, `None` otherwise.
    ///
    /// The lockout expires `window` after the *oldest* retained attempt, not
    /// after the most recent one. Remaining time is ceiling-rounded to whole
    /// seconds and never negative.
    pub fn blocked_for(
        attempts: &[DateTime<Utc>],
        max_attempts: usize,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Option<u64> {
        if attempts.len() < max_attempts {
            return None;
        }
        let oldest = attempts.first()?;
        let unlock_at = *oldest + window;
        let remaining_ms = unlock_at.signed_duration_since(now).num_milliseconds();
        if remaining_ms <= 0 {
            return Some(0);
        }
        Some((remaining_ms as u64).div_ceil(1000))
    }
}

/// Concurrent per-identifier attempt store.
///
/// All read-modify-write cycles (prune-then-inspect, prune-then-append) run
/// under the map's per-key entry lock, so concurrent requests for the same
/// identifier cannot corrupt the stored sequence.
pub struct AttemptGuard {
    attempts: DashMap<String, Vec<DateTime<Utc>>>,
    max_attempts: usize,
    window: Duration,
}

impl AttemptGuard {
    pub fn new(max_attempts: usize, window_secs: i64) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts,
            window: Duration::seconds(window_secs),
        }
    }

    /// Check whether an identifier is currently locked out.
    ///
    /// Prunes expired attempts from the record as a side effect. An identifier
    /// with no record is always allowed.
    pub fn check(&self, identifier: &str) -> BlockStatus {
        self.check_at(identifier, Utc::now())
    }

    pub fn check_at(&self, identifier: &str, now: DateTime<Utc>) -> BlockStatus {
        let Some(mut entry) = self.attempts.get_mut(identifier) else {
            return BlockStatus::Allowed;
        };

        policy::prune(entry.value_mut(), self.window, now);

        match policy::blocked_for(entry.value(), self.max_attempts, self.window, now) {
            Some(remaining_secs) => {
                tracing::warn!(
                    identifier = %identifier,
                    remaining_secs = remaining_secs,
                    "Login attempt blocked by lockout"
                );
                BlockStatus::Blocked { remaining_secs }
            }
            None => BlockStatus::Allowed,
        }
    }

    /// Record a failed attempt for an identifier, creating the record if
    /// absent. Pruning happens at check time, not here.
    pub fn record_failure(&self, identifier: &str) {
        self.record_failure_at(identifier, Utc::now());
    }

    pub fn record_failure_at(&self, identifier: &str, now: DateTime<Utc>) {
        self.attempts
            .entry(identifier.to_string())
            .or_default()
            .push(now);
    }

    /// Delete an identifier's record entirely. Called on successful login and
    /// on logout.
    pub fn clear(&self, identifier: &str) {
        self.attempts.remove(identifier);
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_identifiers(&self) -> usize {
        self.attempts.len()
    }
}

impl Default for AttemptGuard {
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS, LOCKOUT_WINDOW_SECS)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: f64) -> DateTime<Utc> {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        base + Duration::milliseconds((secs * 1000.0).round() as i64)
    }

    #[test]
    fn test_no_record_is_allowed() {
        let guard = AttemptGuard::default();
        assert_eq!(guard.check_at("NEET2024001", at(0.0)), BlockStatus::Allowed);
    }

    #[test]
    fn test_threshold_invariant() {
        let guard = AttemptGuard::default();
        for i in 0..4 {
            guard.record_failure_at("NEET2024001", at(i as f64));
        }
        // Four attempts inside the window: still allowed.
        assert_eq!(guard.check_at("NEET2024001", at(5.0)), BlockStatus::Allowed);

        guard.record_failure_at("NEET2024001", at(4.0));
        // Fifth crosses the threshold.
        assert!(guard.check_at("NEET2024001", at(5.0)).is_blocked());
    }

    #[test]
    fn test_window_rolls_from_oldest_attempt() {
        let guard = AttemptGuard::default();
        for i in 0..5 {
            guard.record_failure_at("NEET2024001", at(i as f64));
        }

        // Just inside five minutes from the first attempt: still blocked.
        assert!(guard.check_at("NEET2024001", at(299.9)).is_blocked());

        // Just past five minutes from the first attempt: the oldest entry
        // falls out of the window and the identifier is unblocked.
        assert_eq!(guard.check_at("NEET2024001", at(300.1)), BlockStatus::Allowed);
    }

    #[test]
    fn test_remaining_seconds_ceiling() {
        let guard = AttemptGuard::default();
        for i in 0..5 {
            guard.record_failure_at("NEET2024001", at(i as f64));
        }

        // Oldest attempt at t=0, window 300s, checked at t=10: 290 left.
        let status = guard.check_at("NEET2024001", at(10.0));
        assert_eq!(status, BlockStatus::Blocked { remaining_secs: 290 });

        // Fractional remainder rounds up.
        let status = guard.check_at("NEET2024001", at(299.5));
        assert_eq!(status, BlockStatus::Blocked { remaining_secs: 1 });
    }

    #[test]
    fn test_clear_removes_record() {
        let guard = AttemptGuard::default();
        for i in 0..5 {
            guard.record_failure_at("NEET2024001", at(i as f64));
        }
        assert!(guard.check_at("NEET2024001", at(5.0)).is_blocked());

        guard.clear("NEET2024001");
        assert_eq!(guard.check_at("NEET2024001", at(5.0)), BlockStatus::Allowed);
        assert_eq!(guard.tracked_identifiers(), 0);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let guard = AttemptGuard::default();
        for i in 0..5 {
            guard.record_failure_at("NEET2024001", at(i as f64));
        }
        assert!(guard.check_at("NEET2024001", at(5.0)).is_blocked());
        assert_eq!(guard.check_at("NEET2024002", at(5.0)), BlockStatus::Allowed);
    }

    #[test]
    fn test_stale_attempts_pruned_before_counting() {
        let guard = AttemptGuard::default();
        // Two old failures that will have expired by the time of the burst.
        guard.record_failure_at("NEET2024001", at(0.0));
        guard.record_failure_at("NEET2024001", at(1.0));
        // Three fresh failures well past the window.
        for i in 0..3 {
            guard.record_failure_at("NEET2024001", at(400.0 + i as f64));
        }

        // Only the three fresh attempts count.
        assert_eq!(guard.check_at("NEET2024001", at(405.0)), BlockStatus::Allowed);
    }

    #[test]
    fn test_blocked_remaining_never_negative() {
        let attempts = vec![at(0.0); 5];
        // Checked long after the unlock instant.
        let remaining =
            policy::blocked_for(&attempts, 5, Duration::seconds(300), at(1000.0));
        assert_eq!(remaining, Some(0));
    }

    #[test]
    fn test_concurrent_failures_do_not_corrupt_record() {
        use std::sync::Arc;

        let guard = Arc::new(AttemptGuard::new(1000, LOCKOUT_WINDOW_SECS));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = Arc::clone(&guard);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    guard.record_failure("shared-id");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let entry = guard.attempts.get("shared-id").unwrap();
        assert_eq!(entry.value().len(), 400);
    }
}
