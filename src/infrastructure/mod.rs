//! Infrastructure layer for external integrations.
//!
//! Implements the contracts defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL and in-memory repository implementations
//! - [`mail`] - SMTP and logging mail transports
//! - [`throttle`] - Shared gateway rate limiter used by send loops

pub mod mail;
pub mod persistence;
pub mod throttle;
