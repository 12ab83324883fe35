//! Persistent store abstraction and connection pooling.
//!
//! The rest of the crate never opens a database connection directly. It
//! borrows one from a [`ConnectionPool`], which is generic over a
//! [`Connector`] so the pooling rules can be exercised without a live
//! database.

pub mod pool;
pub mod postgres;

use std::future::Future;

pub use pool::{ConnectionPool, OverflowPolicy, PoolConfig, PoolError, PoolStatus, PooledConnection};
pub use postgres::{PgConnector, StorePool};

/// Failure reported by the underlying store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A new connection could not be established.
    #[error("store connection failed: {0}")]
    Connect(String),

    /// The liveness probe on an existing connection failed.
    #[error("store health probe failed: {0}")]
    Probe(String),

    /// A statement failed to execute.
    #[error("store statement failed: {0}")]
    Query(String),
}

/// A single live connection to the persistent store.
pub trait StoreConnection: Send + Sized + 'static {
    /// Runs a trivial round-trip (`SELECT 1`) to confirm the connection is
    /// still usable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Probe`] when the round-trip fails.
    fn ping(&mut self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Closes the connection. Failures are swallowed: a connection being
    /// closed is already considered gone.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Factory for new store connections.
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Connection: StoreConnection;

    /// Opens a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if the store is unreachable.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, StoreError>> + Send;
}
