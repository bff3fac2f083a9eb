//! Small helpers shared across layers.
//!
//! - [`html_text`] - Plain-text fallback from HTML bodies
//! - [`token_generator`] - Unsubscribe token generation and shape checks

pub mod html_text;
pub mod token_generator;
