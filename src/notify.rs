//! Outbound notification boundary.
//!
//! Monitors hand a target name and a rendered message to a [`Notifier`].
//! Delivery is best effort: implementations log their own failures and never
//! report them back to the monitor.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API rejected request: {0}")]
    Api(String),

    #[error("no recipients configured for {0}")]
    NoRecipients(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &str, message: &str);
}

/// Writes notifications to the log. Used when no bot token is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, target: &str, message: &str) {
        info!(monitor = %target, "{}", message);
    }
}
