//! Application error type and its HTTP representation.
//!
//! Every fallible service and repository call returns [`AppError`]. Handlers
//! propagate it with `?` and Axum renders it through [`IntoResponse`] as:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "already_dispatched",
//!     "message": "Campaign has already been dispatched",
//!     "details": { "campaign_id": 7, "status": "sending" }
//!   }
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::entities::CampaignStatus;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Serializable error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

/// Stable codes for campaign state conflicts.
pub mod codes {
    pub const CAMPAIGN_LOCKED: &str = "campaign_locked";
    pub const ALREADY_DISPATCHED: &str = "already_dispatched";
    pub const CAMPAIGN_NOT_SENDING: &str = "campaign_not_sending";
}

#[derive(Debug)]
pub enum AppError {
    Validation {
        message: String,
        details: Value,
    },
    Unauthorized {
        message: String,
        details: Value,
    },
    NotFound {
        message: String,
        details: Value,
    },
    /// Operation rejected because of the campaign lifecycle state.
    StateConflict {
        code: &'static str,
        message: String,
        details: Value,
    },
    Conflict {
        message: String,
        details: Value,
    },
    /// The mail gateway refused or failed a synchronous send.
    Transport {
        message: String,
        details: Value,
    },
    Internal {
        message: String,
        details: Value,
    },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn unauthorized(message: impl Into<String>, details: Value) -> Self {
        Self::Unauthorized {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }

    pub fn transport(message: impl Into<String>, details: Value) -> Self {
        Self::Transport {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Content edits were attempted on a campaign that left `draft`.
    pub fn campaign_locked(campaign_id: i64, status: CampaignStatus) -> Self {
        Self::StateConflict {
            code: codes::CAMPAIGN_LOCKED,
            message: "Campaign is locked and can no longer be edited".to_string(),
            details: json!({ "campaign_id": campaign_id, "status": status }),
        }
    }

    /// Dispatch was requested for a campaign that is not a draft.
    pub fn already_dispatched(campaign_id: i64, status: CampaignStatus) -> Self {
        Self::StateConflict {
            code: codes::ALREADY_DISPATCHED,
            message: "Campaign has already been dispatched".to_string(),
            details: json!({ "campaign_id": campaign_id, "status": status }),
        }
    }

    /// Pause or resume was requested outside of `sending`.
    pub fn not_sending(campaign_id: i64, status: CampaignStatus) -> Self {
        Self::StateConflict {
            code: codes::CAMPAIGN_NOT_SENDING,
            message: "Campaign is not currently sending".to_string(),
            details: json!({ "campaign_id": campaign_id, "status": status }),
        }
    }

    pub fn campaign_not_found(campaign_id: i64) -> Self {
        Self::not_found(
            "Campaign not found",
            json!({ "campaign_id": campaign_id }),
        )
    }

    pub fn invalid_address(address: &str) -> Self {
        Self::bad_request(
            "Invalid email address",
            json!({ "address": address }),
        )
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::Unauthorized { .. } => "unauthorized",
            AppError::NotFound { .. } => "not_found",
            AppError::StateConflict { code, .. } => *code,
            AppError::Conflict { .. } => "conflict",
            AppError::Transport { .. } => "transport_error",
            AppError::Internal { .. } => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::StateConflict { .. } | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Transport { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::StateConflict { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Internal { message, .. } => message,
        }
    }

    fn details(&self) -> &Value {
        match self {
            AppError::Validation { details, .. }
            | AppError::Unauthorized { details, .. }
            | AppError::NotFound { details, .. }
            | AppError::StateConflict { details, .. }
            | AppError::Conflict { details, .. }
            | AppError::Transport { details, .. }
            | AppError::Internal { details, .. } => details,
        }
    }

    /// Converts the error into its serializable payload.
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code(),
            message: self.message().to_string(),
            details: self.details().clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.code(), details = %self.details(), "{}", self.message());
        }

        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error()
            && db.is_unique_violation()
        {
            return AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": db.constraint() }),
            );
        }

        if matches!(e, sqlx::Error::RowNotFound) {
            return AppError::not_found("Record not found", json!({}));
        }

        tracing::error!(error = %e, "Database error");
        AppError::internal("Database error", json!({}))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::bad_request(
            "Validation failed",
            serde_json::to_value(&errors).unwrap_or_else(|_| json!({})),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conflict_codes() {
        let locked = AppError::campaign_locked(3, CampaignStatus::Sending);
        assert_eq!(locked.code(), "campaign_locked");
        assert_eq!(locked.status_code(), StatusCode::CONFLICT);

        let dispatched = AppError::already_dispatched(3, CampaignStatus::Sent);
        assert_eq!(dispatched.code(), "already_dispatched");
        assert_eq!(dispatched.to_error_info().details["status"], "sent");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::invalid_address("nope").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::transport("rejected", json!({})).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::campaign_not_found(1).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_error_info_carries_message() {
        let info = AppError::internal("boom", json!({ "k": 1 })).to_error_info();
        assert_eq!(info.code, "internal_error");
        assert_eq!(info.message, "boom");
        assert_eq!(info.details["k"], 1);
    }
}
