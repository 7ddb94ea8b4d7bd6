//! Cooperative request and download quotas
//!
//! The subtitle service enforces a request cap per 10 second window and a
//! daily download cap, but bans clients that ignore them instead of
//! rejecting the excess calls. Every outbound call goes through
//! [`RateLimitedSession::check_and_reserve`] first.

use crate::protocol::error::{ProtocolError, Result};
use chrono::NaiveDate;
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What an outbound call consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Any RPC call; counts against the window only
    Request,
    /// Subtitle download; also counts against the daily quota
    Download,
}

/// Quota limits applied by a [`RateLimitedSession`]
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Length of the request window
    pub window: Duration,
    /// Requests allowed per window, regardless of tier
    pub window_cap: u32,
    /// Downloads per day for a regular account
    pub daily_cap: u32,
    /// Downloads per day for a privileged account
    pub privileged_daily_cap: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: crate::protocol::REQUEST_WINDOW,
            window_cap: crate::protocol::MAX_REQUESTS_PER_WINDOW,
            daily_cap: crate::protocol::MAX_DOWNLOADS_PER_DAY,
            privileged_daily_cap: crate::protocol::PRIVILEGED_MAX_DOWNLOADS_PER_DAY,
        }
    }
}

/// Counter snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaState {
    pub daily_remaining: u32,
    pub window_request_count: u32,
    pub window_start: Instant,
    pub day_start: NaiveDate,
}

/// Guarded quota counters for one protocol client
#[derive(Debug)]
pub struct RateLimitedSession {
    config: RateLimitConfig,
    privileged: AtomicBool,
    state: Mutex<QuotaState>,
}

impl RateLimitedSession {
    /// Create a session with full quotas starting now
    pub fn new(config: RateLimitConfig) -> Self {
        Self::starting_at(config, Instant::now(), today())
    }

    /// Create a session whose window and day begin at the given instants
    pub fn starting_at(config: RateLimitConfig, now: Instant, today: NaiveDate) -> Self {
        let state = QuotaState {
            daily_remaining: config.daily_cap,
            window_request_count: 0,
            window_start: now,
            day_start: today,
        };

        Self {
            config,
            privileged: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    /// Reserve one slot of `kind`, or fail without touching the counters
    pub fn check_and_reserve(&self, kind: RequestKind) -> Result<()> {
        self.check_and_reserve_at(kind, Instant::now(), today())
    }

    /// [`check_and_reserve`](Self::check_and_reserve) against an explicit clock
    pub fn check_and_reserve_at(
        &self,
        kind: RequestKind,
        now: Instant,
        today: NaiveDate,
    ) -> Result<()> {
        let mut state = self.lock();

        if today != state.day_start {
            let cap = self.daily_cap();
            debug!(
                "Quota day rolled over ({} -> {today}), daily downloads reset to {cap}",
                state.day_start
            );
            state.daily_remaining = cap;
            state.day_start = today;
        }

        if kind == RequestKind::Download && state.daily_remaining == 0 {
            warn!("Daily download quota exhausted");
            return Err(ProtocolError::QuotaExceeded);
        }

        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed > self.config.window {
            trace!("Request window rolled over after {elapsed:?}");
            state.window_request_count = 0;
            state.window_start = now;
        }

        if state.window_request_count >= self.config.window_cap {
            let wait = self
                .config
                .window
                .saturating_sub(now.saturating_duration_since(state.window_start));
            debug!(
                "Request window full ({} requests), next slot in {wait:?}",
                state.window_request_count
            );
            return Err(ProtocolError::rate_limited(wait));
        }

        state.window_request_count += 1;
        if kind == RequestKind::Download {
            state.daily_remaining -= 1;
        }

        trace!(
            "Reserved {kind:?}: window {}/{}, daily remaining {}",
            state.window_request_count, self.config.window_cap, state.daily_remaining
        );
        Ok(())
    }

    /// Replace the local daily counter with the server's `Download-Quota` value
    pub fn override_daily_remaining(&self, remaining: i64) {
        let clamped = remaining.clamp(0, i64::from(u32::MAX)) as u32;
        if clamped as i64 != remaining {
            warn!("Server reported download quota {remaining}, clamped to {clamped}");
        }
        self.lock().daily_remaining = clamped;
    }

    /// Select the privileged daily cap for the next day rollover
    pub fn set_privileged(&self, privileged: bool) {
        self.privileged.store(privileged, Ordering::Relaxed);
    }

    /// Whether the privileged daily cap is selected
    pub fn is_privileged(&self) -> bool {
        self.privileged.load(Ordering::Relaxed)
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> QuotaState {
        self.lock().clone()
    }

    fn daily_cap(&self) -> u32 {
        if self.is_privileged() {
            self.config.privileged_daily_cap
        } else {
            self.config.daily_cap
        }
    }

    fn lock(&self) -> MutexGuard<'_, QuotaState> {
        // Counters stay consistent across a panic; every update is a single step.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimitedSession {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn small_config() -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_secs(10),
            window_cap: 3,
            daily_cap: 2,
            privileged_daily_cap: 5,
        }
    }

    #[test]
    fn test_window_counts_each_request_once() {
        let start = Instant::now();
        let session = RateLimitedSession::starting_at(small_config(), start, day(1));

        for expected in 1..=3 {
            session
                .check_and_reserve_at(RequestKind::Request, start, day(1))
                .unwrap();
            assert_eq!(session.snapshot().window_request_count, expected);
        }

        let err = session
            .check_and_reserve_at(RequestKind::Request, start + Duration::from_secs(4), day(1))
            .unwrap_err();
        match err {
            ProtocolError::RateLimited { wait } => assert_eq!(wait, Duration::from_secs(6)),
            other => panic!("Expected RateLimited, got {other:?}"),
        }
        assert_eq!(session.snapshot().window_request_count, 3);
    }

    #[test]
    fn test_window_rollover_resets_counter() {
        let start = Instant::now();
        let session = RateLimitedSession::starting_at(small_config(), start, day(1));
        for _ in 0..3 {
            session
                .check_and_reserve_at(RequestKind::Request, start, day(1))
                .unwrap();
        }

        // Exactly at the window edge the window is still open
        let edge = start + Duration::from_secs(10);
        assert!(
            session
                .check_and_reserve_at(RequestKind::Request, edge, day(1))
                .is_err()
        );

        let later = start + Duration::from_secs(11);
        session
            .check_and_reserve_at(RequestKind::Request, later, day(1))
            .unwrap();
        let state = session.snapshot();
        assert_eq!(state.window_request_count, 1);
        assert_eq!(state.window_start, later);
    }

    #[test]
    fn test_download_at_zero_quota_leaves_counters_untouched() {
        let start = Instant::now();
        let session = RateLimitedSession::starting_at(small_config(), start, day(1));
        session
            .check_and_reserve_at(RequestKind::Download, start, day(1))
            .unwrap();
        session
            .check_and_reserve_at(RequestKind::Download, start, day(1))
            .unwrap();

        let before = session.snapshot();
        assert_eq!(before.daily_remaining, 0);

        let err = session
            .check_and_reserve_at(RequestKind::Download, start, day(1))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::QuotaExceeded));
        assert_eq!(session.snapshot(), before);

        // Plain requests still pass while downloads are exhausted
        session
            .check_and_reserve_at(RequestKind::Request, start, day(1))
            .unwrap();
    }

    #[test]
    fn test_day_rollover_restores_quota() {
        let start = Instant::now();
        let session = RateLimitedSession::starting_at(small_config(), start, day(1));
        session.override_daily_remaining(0);

        session
            .check_and_reserve_at(RequestKind::Download, start, day(2))
            .unwrap();
        let state = session.snapshot();
        assert_eq!(state.day_start, day(2));
        assert_eq!(state.daily_remaining, 1);
    }

    #[test]
    fn test_privileged_cap_applies_on_rollover() {
        let start = Instant::now();
        let session = RateLimitedSession::starting_at(small_config(), start, day(1));
        session.set_privileged(true);
        assert_eq!(session.snapshot().daily_remaining, 2);

        session
            .check_and_reserve_at(RequestKind::Request, start, day(2))
            .unwrap();
        assert_eq!(session.snapshot().daily_remaining, 5);
    }

    #[test]
    fn test_override_is_clamped() {
        let session = RateLimitedSession::default();

        session.override_daily_remaining(-4);
        assert_eq!(session.snapshot().daily_remaining, 0);

        session.override_daily_remaining(37);
        assert_eq!(session.snapshot().daily_remaining, 37);
    }

    #[test]
    fn test_default_limits() {
        let config = RateLimitConfig::default();
        assert_eq!(config.window, Duration::from_secs(10));
        assert_eq!(config.window_cap, 40);
        assert_eq!(config.daily_cap, 200);
        assert_eq!(config.privileged_daily_cap, 1000);
    }
}
