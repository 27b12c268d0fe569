
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::config::RateLimitConfig;

/// Outcome of an admission check. `remaining` reflects the state after an
/// admitted request has been counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub admitted: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Quota state reported without consuming a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Sliding-window request limiter keyed by an opaque client identifier.
///
/// Each identifier maps to the timestamps of its recent requests. Entries
/// older than the window are purged lazily on the next check for that
/// identifier; no background sweeper runs. The window slides continuously,
/// so a burst cannot squeeze through at a bucket boundary the way it can
/// with periodically reset counters.
///
/// The limiter is an owned value meant to be constructed once and shared;
/// the interior mutex makes the read-modify-write of `check_and_admit`
/// atomic, so two concurrent requests can never both claim the last slot.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    #[inline]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let secs = i64::try_from(config.window_secs).unwrap_or(i64::MAX);
        Self::new(
            config.max_requests,
            Duration::try_seconds(secs).unwrap_or(Duration::MAX),
        )
    }

    /// Check whether a request at `now` is admitted for `identifier`, and
    /// record it if so.
    ///
    /// `reset_at` is when the oldest retained request leaves the window
    /// (or `now + window` for an empty window); on denial the caller must
    /// wait until then for a slot to free.
    #[inline]
    pub fn check_and_admit(&self, identifier: &str, now: DateTime<Utc>) -> RateDecision {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.entry(identifier.to_string()).or_default();

        window.retain(|&t| now - t < self.window);

        let reset_at = window
            .first()
            .map_or(now + self.window, |&oldest| oldest + self.window);
        let current = u32::try_from(window.len()).unwrap_or(u32::MAX);
        let remaining = self.max_requests.saturating_sub(current);

        if current < self.max_requests {
            window.push(now);
            debug!(
                "Admitted request for {} ({} of {} used)",
                identifier,
                current + 1,
                self.max_requests
            );
            RateDecision {
                admitted: true,
                // current < max_requests, so remaining >= 1 here.
                remaining: remaining - 1,
                reset_at,
            }
        } else {
            debug!("Denied request for {} until {}", identifier, reset_at);
            RateDecision {
                admitted: false,
                remaining: 0,
                reset_at,
            }
        }
    }

    /// Report the quota state for `identifier` without consuming a request.
    ///
    /// Never perturbs admission decisions; an identifier that has never
    /// been seen gets the full quota without any window being allocated.
    #[inline]
    pub fn peek(&self, identifier: &str, now: DateTime<Utc>) -> QuotaStatus {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(window) = windows.get_mut(identifier) else {
            return QuotaStatus {
                remaining: self.max_requests,
                reset_at: now + self.window,
            };
        };

        window.retain(|&t| now - t < self.window);

        let reset_at = window
            .first()
            .map_or(now + self.window, |&oldest| oldest + self.window);
        let current = u32::try_from(window.len()).unwrap_or(u32::MAX);

        QuotaStatus {
            remaining: self.max_requests.saturating_sub(current),
            reset_at,
        }
    }
}
