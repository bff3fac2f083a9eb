//! DTOs for the public unsubscribe endpoints.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    /// `false` for an unknown token; the caller gets a definite answer either way.
    pub unsubscribed: bool,
}
