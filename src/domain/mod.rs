//! Domain layer: the shared in-process resources every request touches.
//!
//! This module contains the abuse limiter, the single-session authority,
//! the live event bus with its event types, and the solution model the
//! request layer mutates.

pub mod event_bus;
pub mod live_event;
pub mod rate_limiter;
pub mod session;
pub mod solution;

pub use event_bus::{EventBus, Subscriber};
pub use live_event::{EventFrame, LiveEvent};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use session::{AuthError, CredentialStore, SessionAuthority, SessionCredential, StoredCredential};
pub use solution::{Listing, RankEntry, Role, Solution, SolutionDraft, SolutionPage, UserPoints};
