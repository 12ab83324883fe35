//! Service layer: business logic orchestration.
//!
//! [`SolutionService`] coordinates solution mutations and reads, checks the
//! abuse limiter, and emits events through the [`super::domain::EventBus`].
//! [`AuthLimits`] caps login and registration attempts.

pub mod auth_limits;
pub mod solution_service;

pub use auth_limits::AuthLimits;
pub use solution_service::SolutionService;
