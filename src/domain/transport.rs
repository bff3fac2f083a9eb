//! Outbound mail transport contract.
//!
//! The dispatch engine never talks to a mail gateway directly. It hands a
//! fully rendered [`OutgoingMessage`] to a [`Transport`] and interprets the
//! result: any `Err` is a per-recipient failure and never aborts a batch.

use async_trait::async_trait;
use thiserror::Error;

/// A rendered message ready to be handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
    /// One-click opt-out URL advertised in `List-Unsubscribe` headers.
    pub list_unsubscribe: Option<String>,
}

/// Gateway acknowledgement of an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Raw gateway response, if the transport exposes one.
    pub response: Option<String>,
}

/// Errors reported by a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The recipient address could not be parsed by the transport.
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    /// The message could not be assembled.
    #[error("failed to build message: {0}")]
    Build(String),

    /// The gateway answered and refused the message.
    #[error("gateway rejected message: {0}")]
    Rejected(String),

    /// The gateway could not be reached or timed out.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Hands rendered messages to an outbound mail gateway.
///
/// Each call owns its own timeout; a slow call only stalls the loop that made it.
///
/// # Implementations
///
/// - [`crate::infrastructure::mail::SmtpTransport`] - SMTP relay via lettre
/// - [`crate::infrastructure::mail::LogTransport`] - logs messages without sending
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the message was not accepted.
    async fn send(&self, message: OutgoingMessage) -> Result<SendReceipt, TransportError>;

    /// Checks whether the gateway is reachable.
    async fn health_check(&self) -> bool;
}
