//! Event Handler Contract
//!
//! Consumers of the event socket implement [`EventHandler`] to receive
//! security events and connection lifecycle notifications. Only
//! [`on_event`](EventHandler::on_event) is required; the lifecycle hooks
//! default to no-ops so a handler that only cares about events stays small.

use crate::message::{SecurityEvent, StatusUpdate};
use async_trait::async_trait;

/// Receiver for everything the event socket dispatches
///
/// Handlers are shared with the socket's session task, so implementations
/// must be `Send + Sync`; interior mutability goes through the usual sync
/// primitives.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every `security_event` frame, with the payload unchanged
    async fn on_event(&self, event: SecurityEvent);

    /// Called after the transport opens successfully
    async fn on_connect(&self) {}

    /// Called whenever the connection closes, cleanly or not, including
    /// failed connection attempts
    async fn on_disconnect(&self) {}

    /// Called for every `status_update` frame
    async fn on_status_update(&self, update: StatusUpdate) {
        let _ = update;
    }
}
