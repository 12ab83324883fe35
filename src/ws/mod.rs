//! WebSocket layer: live-update subscriptions.
//!
//! A client connecting to `/ws` is registered with the
//! [`EventBus`](crate::domain::EventBus), receives a `connected` frame, and
//! then every solution event published while it stays connected. Closing
//! the socket unregisters the subscription.

pub mod connection;
pub mod handler;
