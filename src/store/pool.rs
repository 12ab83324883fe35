//! Bounded connection pool with health checks on both acquire and release.
//!
//! [`ConnectionPool`] keeps at most `capacity` pooled connections. Idle
//! connections wait in a queue whose length is mirrored by a semaphore, so
//! callers can wait for one with a timeout without holding any lock.
//!
//! # Acquire
//!
//! 1. Take an idle connection if one is available.
//! 2. Otherwise open a new pooled connection while the pool is below
//!    capacity.
//! 3. Otherwise wait up to `acquire_timeout` for a release or a freed
//!    slot, retrying steps 1 and 2 on every wake-up.
//! 4. On timeout apply the [`OverflowPolicy`]: open an unpooled overflow
//!    connection, or report [`PoolError::Exhausted`].
//!
//! A connection taken from the queue is probed first; a failed probe closes
//! it and a replacement is opened transparently.
//!
//! # Release
//!
//! Pooled connections are probed and re-queued if healthy; overflow and
//! unhealthy connections are closed. Release never blocks on the queue.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Notify, Semaphore};
use utoipa::ToSchema;

use super::{Connector, StoreConnection, StoreError};

/// Stand-in deadline for acquire timeouts too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// What to do when no pooled connection frees up within the acquire timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Always open a direct, unpooled connection. Exhaustion costs
    /// throughput, never a failed request.
    Direct,
    /// Open at most `n` simultaneous overflow connections, so no more than
    /// `capacity + n` connections are ever checked out, then fail.
    Bounded(usize),
    /// Never overflow; fail with [`PoolError::Exhausted`].
    Reject,
}

impl OverflowPolicy {
    /// Maximum number of simultaneous overflow connections, if bounded.
    const fn overflow_limit(self) -> Option<usize> {
        match self {
            Self::Direct => None,
            Self::Bounded(extra) => Some(extra),
            Self::Reject => Some(0),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    /// Parses `direct`, `reject` or `bounded:<n>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "direct" => Ok(Self::Direct),
            "reject" => Ok(Self::Reject),
            other => other
                .strip_prefix("bounded:")
                .and_then(|n| n.parse().ok())
                .map(Self::Bounded)
                .ok_or_else(|| format!("invalid overflow policy: {s}")),
        }
    }
}

/// Pool sizing and timeout settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pooled connections.
    pub capacity: usize,
    /// Connections opened by [`ConnectionPool::initialize`]. Clamped to
    /// `capacity`.
    pub warm: usize,
    /// How long `acquire` waits for a release before overflowing.
    pub acquire_timeout: Duration,
    /// Behaviour once the wait times out.
    pub overflow: OverflowPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            warm: 2,
            acquire_timeout: Duration::from_secs(5),
            overflow: OverflowPolicy::Direct,
        }
    }
}

/// Errors surfaced by the pool. Unhealthy connections are never an error;
/// they are replaced.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// No connection to the store could be opened at all.
    #[error("unable to open a store connection: {0}")]
    Connect(#[source] StoreError),

    /// The overflow policy refused to open another connection.
    #[error("connection pool exhausted ({checked_out} connections checked out)")]
    Exhausted {
        /// Connections checked out when the request was refused.
        checked_out: usize,
    },

    /// The pool has been shut down.
    #[error("connection pool is shut down")]
    Closed,
}

/// Point-in-time pool occupancy, reported by the health endpoint.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PoolStatus {
    /// Configured maximum of pooled connections.
    pub capacity: usize,
    /// Connections waiting in the queue.
    pub idle: usize,
    /// Pooled connections currently alive (idle or checked out).
    pub pooled: usize,
    /// Connections currently held by callers, overflow included.
    pub checked_out: usize,
    /// Overflow connections currently held by callers.
    pub overflow: usize,
}

#[derive(Debug, Default)]
struct Counters {
    /// Pooled connections alive, idle or checked out. Never exceeds capacity.
    pooled: AtomicUsize,
    /// Connections held by callers, pooled and overflow.
    checked_out: AtomicUsize,
    /// Overflow connections held by callers.
    overflow: AtomicUsize,
    /// Signalled whenever a pooled slot is given up.
    freed: Notify,
}

impl Counters {
    /// Reserves a slot on `counter` if it is below `limit`.
    fn try_reserve(counter: &AtomicUsize, limit: usize) -> bool {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n.saturating_add(1))
            })
            .is_ok()
    }

    fn decrement(counter: &AtomicUsize) {
        let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            Some(n.saturating_sub(1))
        });
    }

    /// Gives up a pooled slot and wakes one caller waiting for capacity.
    fn free_pooled(&self) {
        Self::decrement(&self.pooled);
        self.freed.notify_one();
    }
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Dereferences to the underlying connection. Hand it back with
/// [`ConnectionPool::release`]; a handle that is simply dropped closes its
/// connection and frees its pool slot.
pub struct PooledConnection<T> {
    conn: Option<T>,
    overflow: bool,
    counters: Arc<Counters>,
}

impl<T> PooledConnection<T> {
    /// Returns `true` if this connection was opened past the pool capacity
    /// and will be closed on release.
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        self.overflow
    }

    /// Detaches the connection from the handle, leaving slot accounting to
    /// the caller.
    fn take(&mut self) -> Option<T> {
        self.conn.take()
    }
}

impl<T> Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // `conn` is only emptied by `release`, which consumes the handle.
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<T> DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<T> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        if self.conn.take().is_some() {
            tracing::warn!(
                overflow = self.overflow,
                "pooled connection dropped without release; closing it"
            );
            Counters::decrement(&self.counters.checked_out);
            if self.overflow {
                Counters::decrement(&self.counters.overflow);
            } else {
                self.counters.free_pooled();
            }
        }
    }
}

impl<T> fmt::Debug for PooledConnection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("overflow", &self.overflow)
            .field("attached", &self.conn.is_some())
            .finish()
    }
}

/// Bounded pool of store connections.
///
/// # Concurrency
///
/// - The idle queue lock is held only to push or pop; no store I/O happens
///   under it.
/// - Waiting for a connection is bounded by the configured timeout and
///   ends early on a release or on any freed pooled slot.
/// - Initialization runs at most once: an atomic flag makes the initialized
///   fast path lock-free and a mutex serializes the slow path.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    config: PoolConfig,
    idle: Mutex<VecDeque<C::Connection>>,
    available: Semaphore,
    counters: Arc<Counters>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    closed: AtomicBool,
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates an empty pool. No connection is opened until
    /// [`initialize`](Self::initialize) or the first
    /// [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(connector: C, mut config: PoolConfig) -> Self {
        config.capacity = config.capacity.max(1);
        config.warm = config.warm.min(config.capacity);
        Self {
            connector,
            idle: Mutex::new(VecDeque::with_capacity(config.capacity)),
            config,
            available: Semaphore::new(0),
            counters: Arc::new(Counters::default()),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the pool configuration after clamping.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Opens the warm connections. Safe to call repeatedly and concurrently;
    /// only the first successful call does any work.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Connect`] if none of the warm connections could
    /// be opened, or [`PoolError::Closed`] after shutdown.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        let mut opened = VecDeque::with_capacity(self.config.warm);
        let mut last_error = None;
        for _ in 0..self.config.warm {
            match self.connector.connect().await {
                Ok(conn) => opened.push_back(conn),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to open warm connection");
                    last_error = Some(err);
                }
            }
        }
        if opened.is_empty()
            && let Some(err) = last_error
        {
            return Err(PoolError::Connect(err));
        }

        let warmed = opened.len();
        self.counters.pooled.fetch_add(warmed, Ordering::AcqRel);
        self.idle.lock().await.extend(opened);
        self.available.add_permits(warmed);
        self.initialized.store(true, Ordering::Release);

        tracing::info!(
            warm = warmed,
            capacity = self.config.capacity,
            "connection pool initialized"
        );
        Ok(())
    }

    /// Checks out a healthy connection.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Connect`] if a connection was needed and none
    /// could be opened, [`PoolError::Exhausted`] if the overflow policy
    /// refused, or [`PoolError::Closed`] after shutdown.
    pub async fn acquire(&self) -> Result<PooledConnection<C::Connection>, PoolError> {
        self.initialize().await?;
        let now = tokio::time::Instant::now();
        let deadline = now
            .checked_add(self.config.acquire_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(PoolError::Closed);
            }

            // Register for slot notifications before looking, so a slot
            // freed between the checks and the wait is not missed.
            let freed = self.counters.freed.notified();
            tokio::pin!(freed);
            freed.as_mut().enable();

            if let Ok(permit) = self.available.try_acquire() {
                permit.forget();
                return self.checkout_idle().await;
            }

            if Counters::try_reserve(&self.counters.pooled, self.config.capacity) {
                return match self.connector.connect().await {
                    Ok(conn) => Ok(self.handle(conn, false)),
                    Err(err) => {
                        self.counters.free_pooled();
                        Err(PoolError::Connect(err))
                    }
                };
            }

            tokio::select! {
                permit = self.available.acquire() => {
                    return match permit {
                        Ok(permit) => {
                            permit.forget();
                            self.checkout_idle().await
                        }
                        Err(_) => Err(PoolError::Closed),
                    };
                }
                () = &mut freed => {}
                () = tokio::time::sleep_until(deadline) => return self.open_overflow().await,
            }
        }
    }

    /// Returns a connection to the pool.
    ///
    /// Healthy pooled connections go back to the queue; overflow
    /// connections, unhealthy ones, and anything released after shutdown
    /// are closed.
    pub async fn release(&self, mut handle: PooledConnection<C::Connection>) {
        let overflow = handle.overflow;
        let Some(mut conn) = handle.take() else {
            return;
        };
        Counters::decrement(&self.counters.checked_out);

        if overflow {
            Counters::decrement(&self.counters.overflow);
            tracing::debug!("closing overflow connection");
            conn.close().await;
            return;
        }

        if let Err(err) = conn.ping().await {
            tracing::warn!(error = %err, "discarding unhealthy connection on release");
            self.counters.free_pooled();
            conn.close().await;
            return;
        }

        let rejected = {
            let mut idle = self.idle.lock().await;
            if self.closed.load(Ordering::Acquire) || idle.len() >= self.config.capacity {
                Some(conn)
            } else {
                idle.push_back(conn);
                None
            }
        };
        match rejected {
            Some(conn) => {
                self.counters.free_pooled();
                conn.close().await;
            }
            None => self.available.add_permits(1),
        }
    }

    /// Closes every idle connection and refuses further checkouts.
    /// Idempotent; connections still checked out are closed when released.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.available.close();

        let drained = std::mem::take(&mut *self.idle.lock().await);
        let count = drained.len();
        for conn in drained {
            Counters::decrement(&self.counters.pooled);
            conn.close().await;
        }
        if count > 0 {
            tracing::info!(closed = count, "connection pool shut down");
        }
    }

    /// Returns current occupancy figures.
    pub async fn status(&self) -> PoolStatus {
        let idle = self.idle.lock().await.len();
        PoolStatus {
            capacity: self.config.capacity,
            idle,
            pooled: self.counters.pooled.load(Ordering::Acquire),
            checked_out: self.counters.checked_out.load(Ordering::Acquire),
            overflow: self.counters.overflow.load(Ordering::Acquire),
        }
    }

    /// Pops an idle connection (a permit has already been consumed) and
    /// probes it, replacing it if the probe fails.
    async fn checkout_idle(&self) -> Result<PooledConnection<C::Connection>, PoolError> {
        let popped = self.idle.lock().await.pop_front();
        let conn = match popped {
            Some(mut conn) => match conn.ping().await {
                Ok(()) => conn,
                Err(err) => {
                    tracing::warn!(error = %err, "replacing unhealthy pooled connection");
                    conn.close().await;
                    self.open_replacement().await?
                }
            },
            // The queue was drained by shutdown between permit and pop.
            None => return Err(PoolError::Closed),
        };
        Ok(self.handle(conn, false))
    }

    /// Opens a connection that takes over an existing pooled slot.
    async fn open_replacement(&self) -> Result<C::Connection, PoolError> {
        self.connector.connect().await.map_err(|err| {
            self.counters.free_pooled();
            PoolError::Connect(err)
        })
    }

    async fn open_overflow(&self) -> Result<PooledConnection<C::Connection>, PoolError> {
        // Reserve the overflow slot before connecting so concurrent callers
        // cannot overshoot the bound.
        let reserved = match self.config.overflow.overflow_limit() {
            Some(limit) => Counters::try_reserve(&self.counters.overflow, limit),
            None => {
                self.counters.overflow.fetch_add(1, Ordering::AcqRel);
                true
            }
        };
        if !reserved {
            let checked_out = self.counters.checked_out.load(Ordering::Acquire);
            tracing::warn!(checked_out, "connection pool exhausted; refusing overflow");
            return Err(PoolError::Exhausted { checked_out });
        }

        tracing::warn!(
            timeout_ms = u64::try_from(self.config.acquire_timeout.as_millis()).unwrap_or(u64::MAX),
            "connection pool exhausted; opening overflow connection"
        );
        match self.connector.connect().await {
            Ok(conn) => Ok(self.handle(conn, true)),
            Err(err) => {
                Counters::decrement(&self.counters.overflow);
                Err(PoolError::Connect(err))
            }
        }
    }

    fn handle(&self, conn: C::Connection, overflow: bool) -> PooledConnection<C::Connection> {
        self.counters.checked_out.fetch_add(1, Ordering::AcqRel);
        PooledConnection {
            conn: Some(conn),
            overflow,
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<C: Connector + fmt::Debug> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connector", &self.connector)
            .field("config", &self.config)
            .field("counters", &self.counters)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
