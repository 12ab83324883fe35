//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::domain::{EventBus, RateLimiter, SessionAuthority};
use crate::persistence::{PgAccountStore, PgSolutionStore};
use crate::service::{AuthLimits, SolutionService};
use crate::store::StorePool;

/// Session authority backed by the accounts table.
pub type Sessions = SessionAuthority<PgAccountStore>;

/// Solution service backed by the solutions table.
pub type Solutions = SolutionService<PgSolutionStore>;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session issuance and validation.
    pub sessions: Arc<Sessions>,
    /// Solution mutations, abuse limiting and event emission.
    pub solutions: Arc<Solutions>,
    /// Login and registration attempt caps.
    pub auth_limits: AuthLimits,
    /// Store connection pool, exposed for health reporting.
    pub pool: Arc<StorePool>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires the stores, the session authority and the solution service
    /// around one shared pool, limiter and event bus.
    #[must_use]
    pub fn new(
        pool: Arc<StorePool>,
        limiter: Arc<RateLimiter>,
        auth_limits: AuthLimits,
        event_bus: EventBus,
    ) -> Self {
        let accounts = PgAccountStore::new(Arc::clone(&pool));
        let solutions = PgSolutionStore::new(Arc::clone(&pool));
        Self {
            sessions: Arc::new(SessionAuthority::new(accounts)),
            solutions: Arc::new(SolutionService::new(solutions, limiter, event_bus.clone())),
            auth_limits,
            pool,
            event_bus,
        }
    }
}

impl FromRef<AppState> for EventBus {
    fn from_ref(state: &AppState) -> Self {
        state.event_bus.clone()
    }
}
