//! Alert delivery with per-channel isolation.
//!
//! Fired alerts go through the [`dispatcher::AlertDispatcher`], which fans
//! each alert out to every routed [`NotificationChannel`] concurrently.
//! Built-in channels are console, file (JSON lines), email (SMTP) and
//! webhook.

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod routing;
pub mod utils;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use hearth_common::types::Alert;

/// A notification delivery channel.
///
/// Each call is one attempt; the dispatcher does not retry. A suppressed
/// alert that fires again after its window is the natural retry.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the alert through this channel.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn send(&self, alert: &Alert) -> error::Result<()>;

    /// Returns the channel type name (e.g., `"email"`, `"webhook"`).
    fn channel_name(&self) -> &str;
}
