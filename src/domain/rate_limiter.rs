//! Sliding-window abuse limiter keyed by (subject, action).
//!
//! Each key owns the timestamps of its recently admitted events. A check
//! drops timestamps older than the window, rejects if `max_events` remain,
//! and otherwise records the new event. The map is sharded ([`DashMap`]),
//! so the prune/decide/record sequence is atomic per key while unrelated
//! keys proceed in parallel.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default number of events admitted per window.
pub const DEFAULT_MAX_EVENTS: usize = 10;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Shortest interval accepted by [`RateLimiter::spawn_sweeper`].
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Identity of one abuse window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    subject: String,
    action: String,
}

/// Outcome of a [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The event was admitted and recorded.
    Allowed,
    /// The window is full; nothing was recorded.
    Limited {
        /// Time until the oldest recorded event leaves the window.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Returns `true` if the event was admitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl From<RateDecision> for bool {
    fn from(decision: RateDecision) -> Self {
        decision.is_allowed()
    }
}

/// Process-local sliding-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<WindowKey, VecDeque<Instant>>,
    max_events: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter admitting `max_events` per `window` for each
    /// (subject, action) pair.
    #[must_use]
    pub fn new(max_events: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_events,
            window,
        }
    }

    /// Returns the configured window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Checks and, if admitted, records one event for `subject` performing
    /// `action`.
    pub fn check(&self, subject: &str, action: &str) -> RateDecision {
        let now = Instant::now();
        let key = WindowKey {
            subject: subject.to_string(),
            action: action.to_string(),
        };
        // The entry guard holds the shard lock for the whole sequence.
        let mut events = self.windows.entry(key).or_default();
        prune(&mut events, now, self.window);

        if events.len() >= self.max_events {
            let retry_after = events
                .front()
                .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            return RateDecision::Limited { retry_after };
        }

        events.push_back(now);
        RateDecision::Allowed
    }

    /// Boolean form of [`check`](Self::check).
    pub fn allow(&self, subject: &str, action: &str) -> bool {
        self.check(subject, action).is_allowed()
    }

    /// Drops expired timestamps everywhere and evicts keys left empty.
    /// Returns the number of evicted keys.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, events| {
            prune(events, now, self.window);
            !events.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of (subject, action) keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Spawns a background task calling [`sweep`](Self::sweep) every
    /// `every`, raised to [`MIN_SWEEP_INTERVAL`] if shorter. The task ends
    /// once the limiter is dropped.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        let every = every.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let evicted = limiter.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = limiter.tracked_keys(), "rate limiter sweep");
                }
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS, DEFAULT_WINDOW)
    }
}

/// Removes timestamps that are `window` or more older than `now`.
fn prune(events: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = events.front() {
        if now.saturating_duration_since(*oldest) >= window {
            events.pop_front();
        } else {
            break;
        }
    }
}
