// Copyright (c) 2024-2025 The portalguard Authors
// Licensed under the MIT License. See LICENSE file for details.

//! Session lifecycle monitor.
//!
//! Tracks a logged-in session on the client side: elapsed time, inactivity,
//! a warning period before forced logout, and expiry. The server's token
//! expiry is the actual security boundary; this monitor only provides
//! UX-level early warning and local cleanup.
//!
//! ## State machine
//!
//! - **Active -> WarningActive** when inactivity reaches
//!   `timeout - warning_window` (the 25-minute mark with defaults).
//! - **WarningActive -> Active** on any recognized activity; the inactivity
//!   clock resets to zero and the countdown is cancelled.
//! - **WarningActive -> Expired** when the countdown reaches zero.
//! - **Expired** is terminal for the session instance.
//!
//! There are no scheduled timers to cancel or reschedule. Both the warning
//! and expiry deadlines are derived from the single `last_activity` instant
//! on every poll, so an activity reset can never leave one deadline stale
//! while moving the other.
//!
//! The elapsed-time display is independent of the timeout machinery and
//! never affects transitions.

pub mod store;

use std::time::{Duration, Instant};

/// Inactivity timeout: 30 minutes.
pub const SESSION_TIMEOUT_SECS: u64 = 30 * 60;

/// Warning window before forced logout: 5 minutes.
pub const WARNING_WINDOW_SECS: u64 = 5 * 60;

/// Burst-coalescing window for activity events: 1 second.
pub const ACTIVITY_DEBOUNCE_MS: u64 = 1000;

/// Session monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Session is active and being used.
    Active,
    /// The warning countdown is running.
    WarningActive,
    /// Session is over; local state must be cleared.
    Expired,
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Expired)
    }
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorState::Active => write!(f, "ACTIVE"),
            MonitorState::WarningActive => write!(f, "WARNING"),
            MonitorState::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Why a session reached `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCause {
    /// The warning countdown ran out with no activity.
    Inactivity,
    /// The user logged out explicitly.
    ManualLogout,
}

/// Transition notifications emitted by [`SessionMonitor::poll_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The warning period began; `remaining_secs` until forced logout.
    WarningStarted { remaining_secs: u64 },
    /// The session ended.
    Expired { cause: ExpiryCause },
}

impl MonitorEvent {
    /// Format event for the audit log.
    pub fn to_audit_string(&self) -> String {
        match self {
            MonitorEvent::WarningStarted { remaining_secs } => {
                format!("SESSION_WARNING | expires_in={}s", remaining_secs)
            }
            MonitorEvent::Expired { cause: ExpiryCause::Inactivity } => {
                "SESSION_EXPIRED | reason=inactivity".to_string()
            }
            MonitorEvent::Expired { cause: ExpiryCause::ManualLogout } => {
                "SESSION_EXPIRED | reason=logout".to_string()
            }
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity timeout in seconds.
    pub timeout_secs: u64,
    /// Seconds of warning before the timeout fires.
    pub warning_secs: u64,
    /// Activity events inside this window are coalesced.
    pub activity_debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: SESSION_TIMEOUT_SECS,
            warning_secs: WARNING_WINDOW_SECS,
            activity_debounce_ms: ACTIVITY_DEBOUNCE_MS,
        }
    }
}

impl SessionConfig {
    /// Custom configuration. The warning window is clamped below the timeout
    /// so the warning threshold stays positive.
    pub fn custom(timeout_secs: u64, warning_secs: u64) -> Self {
        let clamped_warning = warning_secs.min(timeout_secs.saturating_sub(1));
        Self {
            timeout_secs,
            warning_secs: clamped_warning,
            ..Self::default()
        }
    }

    fn warning_threshold(&self) -> Duration {
        Duration::from_secs(self.timeout_secs - self.warning_secs)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Client-side session monitor.
pub struct SessionMonitor {
    config: SessionConfig,
    login_at: Instant,
    last_activity: Instant,
    state: MonitorState,
    warning_announced: bool,
}

impl SessionMonitor {
    pub fn new(config: SessionConfig) -> Self {
        Self::start_at(config, Instant::now())
    }

    pub fn start_at(config: SessionConfig, now: Instant) -> Self {
        Self {
            config,
            login_at: now,
            last_activity: now,
            state: MonitorState::Active,
            warning_announced: false,
        }
    }

    /// Record a user-activity event.
    ///
    /// Returns `true` when the inactivity clock was reset. Bursts inside the
    /// debounce window are coalesced into the first event; because the
    /// warning threshold is minutes while the debounce is one second, the
    /// debounce can never swallow the reset that leaves the warning state.
    pub fn record_activity(&mut self) -> bool {
        self.record_activity_at(Instant::now())
    }

    pub fn record_activity_at(&mut self, now: Instant) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if now.duration_since(self.last_activity) < Duration::from_millis(self.config.activity_debounce_ms)
        {
            return false;
        }

        self.last_activity = now;
        self.warning_announced = false;
        self.state = MonitorState::Active;
        true
    }

    /// Advance the state machine to `now`, returning a transition event when
    /// one fired. Expected to be called about once per second by the driver.
    pub fn poll(&mut self) -> Option<MonitorEvent> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<MonitorEvent> {
        if self.state.is_terminal() {
            return None;
        }

        let inactivity = now.duration_since(self.last_activity);

        if inactivity >= self.config.timeout() {
            self.state = MonitorState::Expired;
            let event = MonitorEvent::Expired {
                cause: ExpiryCause::Inactivity,
            };
            tracing::info!("{}", event.to_audit_string());
            return Some(event);
        }

        if inactivity >= self.config.warning_threshold() {
            self.state = MonitorState::WarningActive;
            if !self.warning_announced {
                self.warning_announced = true;
                let event = MonitorEvent::WarningStarted {
                    remaining_secs: self.remaining_secs_at(now),
                };
                tracing::warn!("{}", event.to_audit_string());
                return Some(event);
            }
            return None;
        }

        self.state = MonitorState::Active;
        None
    }

    /// Explicit user logout. Valid from any state; terminal afterwards.
    pub fn terminate(&mut self) -> MonitorEvent {
        self.state = MonitorState::Expired;
        let event = MonitorEvent::Expired {
            cause: ExpiryCause::ManualLogout,
        };
        tracing::info!("{}", event.to_audit_string());
        event
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Seconds since login. Cosmetic; independent of the timeout machinery.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs_at(Instant::now())
    }

    pub fn elapsed_secs_at(&self, now: Instant) -> u64 {
        now.duration_since(self.login_at).as_secs()
    }

    /// Seconds until forced logout, measured from the last activity.
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs_at(Instant::now())
    }

    pub fn remaining_secs_at(&self, now: Instant) -> u64 {
        if self.state.is_terminal() {
            return 0;
        }
        let inactivity = now.duration_since(self.last_activity);
        self.config
            .timeout()
            .saturating_sub(inactivity)
            .as_secs()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// Format an elapsed duration as `12m 34s` for the session display.
pub fn format_elapsed(secs: u64) -> String {
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Format a countdown as `M:SS` for the warning display.
pub fn format_countdown(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> (SessionMonitor, Instant) {
        let t0 = Instant::now();
        (SessionMonitor::start_at(SessionConfig::default(), t0), t0)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_starts_active_with_full_window() {
        let (monitor, t0) = monitor();
        assert_eq!(monitor.state(), MonitorState::Active);
        assert_eq!(monitor.remaining_secs_at(t0), SESSION_TIMEOUT_SECS);
    }

    #[test]
    fn test_warning_fires_at_the_25_minute_mark() {
        let (mut monitor, t0) = monitor();

        // One second shy of the threshold: still active.
        assert_eq!(monitor.poll_at(t0 + secs(24 * 60 + 59)), None);
        assert_eq!(monitor.state(), MonitorState::Active);

        // At 25:00 the warning starts with the full warning window left.
        let event = monitor.poll_at(t0 + secs(25 * 60));
        assert_eq!(
            event,
            Some(MonitorEvent::WarningStarted {
                remaining_secs: WARNING_WINDOW_SECS
            })
        );
        assert_eq!(monitor.state(), MonitorState::WarningActive);

        // The warning event is announced once, not on every poll.
        assert_eq!(monitor.poll_at(t0 + secs(25 * 60 + 1)), None);
        assert_eq!(monitor.state(), MonitorState::WarningActive);
    }

    #[test]
    fn test_activity_during_warning_restores_full_window() {
        let (mut monitor, t0) = monitor();
        monitor.poll_at(t0 + secs(25 * 60));
        assert_eq!(monitor.state(), MonitorState::WarningActive);

        let reset_at = t0 + secs(25 * 60 + 1);
        assert!(monitor.record_activity_at(reset_at));
        assert_eq!(monitor.state(), MonitorState::Active);
        assert_eq!(monitor.remaining_secs_at(reset_at), SESSION_TIMEOUT_SECS);

        // The warning is re-armed for the next cycle.
        let event = monitor.poll_at(reset_at + secs(25 * 60));
        assert!(matches!(event, Some(MonitorEvent::WarningStarted { .. })));
    }

    #[test]
    fn test_expiry_exactly_five_minutes_after_warning() {
        let (mut monitor, t0) = monitor();
        monitor.poll_at(t0 + secs(25 * 60));

        // One second before the deadline: still in warning.
        assert_eq!(monitor.poll_at(t0 + secs(30 * 60 - 1)), None);
        assert_eq!(monitor.state(), MonitorState::WarningActive);

        // At the deadline: expired through inactivity.
        let event = monitor.poll_at(t0 + secs(30 * 60));
        assert_eq!(
            event,
            Some(MonitorEvent::Expired {
                cause: ExpiryCause::Inactivity
            })
        );
        assert!(monitor.state().is_terminal());
    }

    #[test]
    fn test_expired_is_terminal() {
        let (mut monitor, t0) = monitor();
        monitor.poll_at(t0 + secs(30 * 60));
        assert!(monitor.state().is_terminal());

        // Neither activity nor further polls revive the session.
        assert!(!monitor.record_activity_at(t0 + secs(30 * 60 + 5)));
        assert_eq!(monitor.poll_at(t0 + secs(31 * 60)), None);
        assert_eq!(monitor.remaining_secs_at(t0 + secs(31 * 60)), 0);
    }

    #[test]
    fn test_activity_bursts_are_coalesced() {
        let (mut monitor, t0) = monitor();

        assert!(monitor.record_activity_at(t0 + secs(10)));
        // 200ms later: coalesced into the first event.
        assert!(!monitor.record_activity_at(t0 + secs(10) + Duration::from_millis(200)));
        // Past the debounce window: accepted again.
        assert!(monitor.record_activity_at(t0 + secs(12)));
    }

    #[test]
    fn test_manual_logout_from_any_state() {
        let (mut monitor, t0) = monitor();
        monitor.poll_at(t0 + secs(25 * 60));
        assert_eq!(monitor.state(), MonitorState::WarningActive);

        let event = monitor.terminate();
        assert_eq!(
            event,
            MonitorEvent::Expired {
                cause: ExpiryCause::ManualLogout
            }
        );
        assert!(monitor.state().is_terminal());
    }

    #[test]
    fn test_elapsed_display_is_independent_of_activity() {
        let (mut monitor, t0) = monitor();
        monitor.record_activity_at(t0 + secs(600));

        // Activity reset the inactivity clock but not the elapsed display.
        assert_eq!(monitor.elapsed_secs_at(t0 + secs(700)), 700);
        assert_eq!(monitor.remaining_secs_at(t0 + secs(700)), SESSION_TIMEOUT_SECS - 100);
    }

    #[test]
    fn test_custom_config_clamps_warning() {
        let config = SessionConfig::custom(60, 300);
        assert_eq!(config.warning_secs, 59);
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(format_elapsed(754), "12m 34s");
        assert_eq!(format_countdown(299), "4:59");
        assert_eq!(format_countdown(5), "0:05");
    }
}
