//! PostgreSQL connector backed by `sqlx::PgConnection`.

use sqlx::{Connection, PgConnection};

use super::{ConnectionPool, Connector, StoreConnection, StoreError};

/// The pool type used by the running service.
pub type StorePool = ConnectionPool<PgConnector>;

/// Opens connections to a PostgreSQL server.
#[derive(Clone)]
pub struct PgConnector {
    database_url: String,
}

impl PgConnector {
    /// Creates a connector for the given connection string.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

impl std::fmt::Debug for PgConnector {
    // The URL may carry credentials.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnector").finish_non_exhaustive()
    }
}

impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, StoreError> {
        PgConnection::connect(&self.database_url)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))
    }
}

impl StoreConnection for PgConnection {
    async fn ping(&mut self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&mut *self)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Probe(e.to_string()))
    }

    async fn close(self) {
        if let Err(err) = Connection::close(self).await {
            tracing::debug!(error = %err, "error while closing store connection");
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Query(err.to_string())
    }
}
