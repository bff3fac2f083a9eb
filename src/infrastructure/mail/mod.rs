//! Mail transport implementations.
//!
//! - [`SmtpTransport`] - SMTP relay via lettre
//! - [`LogTransport`] - logs messages without sending them

pub mod log_transport;
pub mod smtp_transport;

pub use log_transport::LogTransport;
pub use smtp_transport::{SmtpSettings, SmtpTls, SmtpTransport};
