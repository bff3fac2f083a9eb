//! Transport that logs messages instead of sending them.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::transport::{OutgoingMessage, SendReceipt, Transport, TransportError};

/// A transport that accepts every message and writes a log line for it.
///
/// Selected with `MAIL_TRANSPORT=log`. Useful in development and staging
/// where nothing may leave the process.
pub struct LogTransport;

impl LogTransport {
    /// Creates a new LogTransport instance.
    pub fn new() -> Self {
        debug!("Using LogTransport (outgoing mail is logged, not sent)");
        Self
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, message: OutgoingMessage) -> Result<SendReceipt, TransportError> {
        if message.to.trim().is_empty() {
            return Err(TransportError::InvalidAddress(message.to));
        }

        info!(
            to = %message.to,
            subject = %message.subject,
            html_bytes = message.html.len(),
            has_text = message.text.is_some(),
            "Mail logged"
        );

        Ok(SendReceipt::default())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
