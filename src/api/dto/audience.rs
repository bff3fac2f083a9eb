//! DTOs for audience preview.

use serde::Deserialize;

use crate::domain::entities::TargetingSpec;

/// Request body for `POST /api/audience/preview`.
#[derive(Debug, Deserialize)]
pub struct AudiencePreviewRequest {
    #[serde(default)]
    pub targeting: TargetingSpec,
}
