//! Outbound email.
//!
//! Delivery is a best-effort boundary: senders report success or failure as
//! a boolean and never propagate errors into the notification pipeline.

mod sendgrid;
mod templates;

pub use sendgrid::SendGridSender;
pub use templates::{batch_notification_email, release_notification_email, weekly_summary_email};

use async_trait::async_trait;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Returns whether the provider accepted the message. Failures are
    /// logged by the implementation, not surfaced as errors.
    async fn send(&self, message: &EmailMessage) -> bool;
}

/// Stand-in used when no delivery credentials are configured. Every send
/// fails, so attempts still show up in the notification log.
pub struct DisabledSender;

#[async_trait]
impl EmailSender for DisabledSender {
    async fn send(&self, message: &EmailMessage) -> bool {
        tracing::warn!(
            "Email delivery is not configured, dropping message to {}",
            message.to
        );
        false
    }
}
