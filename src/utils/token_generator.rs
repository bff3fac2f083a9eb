//! Unsubscribe token generation and shape checks.
//!
//! Tokens are URL-safe base64 of random bytes from the OS generator, so they
//! can be embedded in links without escaping.

use base64::Engine as _;
use thiserror::Error;

/// Random bytes per token before base64 encoding.
const TOKEN_LENGTH_BYTES: usize = 24;

/// Encoded token length (24 bytes -> 32 characters, no padding).
pub const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("system random number generator failed: {0}")]
    Entropy(String),
}

/// Generates a cryptographically secure unsubscribe token.
///
/// # Errors
///
/// Returns [`TokenError::Entropy`] if the OS random source is unavailable.
///
/// # Examples
///
/// ```ignore
/// let token = generate_unsubscribe_token()?;
/// assert_eq!(token.len(), 32);
/// ```
pub fn generate_unsubscribe_token() -> Result<String, TokenError> {
    let mut buffer = [0u8; TOKEN_LENGTH_BYTES];

    getrandom::fill(&mut buffer).map_err(|e| TokenError::Entropy(e.to_string()))?;

    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer))
}

/// Longest token the public endpoint will look up.
pub const MAX_TOKEN_INPUT_LENGTH: usize = 256;

/// Returns true if `token` is worth a lookup.
///
/// Only bounds the input. Tokens already stored on an account may predate
/// this generator and have any shape, so the store decides validity.
pub fn is_plausible(token: &str) -> bool {
    !token.trim().is_empty() && token.len() <= MAX_TOKEN_INPUT_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_token_shape() {
        let token = generate_unsubscribe_token().unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(is_plausible(&token));
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000)
            .map(|_| generate_unsubscribe_token().unwrap())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_is_plausible_only_bounds_input() {
        assert!(!is_plausible(""));
        assert!(!is_plausible("   "));
        assert!(!is_plausible(&"a".repeat(MAX_TOKEN_INPUT_LENGTH + 1)));
        assert!(is_plausible("short"));
        assert!(is_plausible(&"9f86d081".repeat(8)));
        assert!(is_plausible(&"a".repeat(MAX_TOKEN_INPUT_LENGTH)));
    }
}
