//! Pagination and status-filter query parameters.

use serde::Deserialize;
use serde_json::json;
use serde_with::{DisplayFromStr, serde_as};

use crate::domain::entities::{CampaignStatus, DeliveryStatus, PageRequest};
use crate::error::AppError;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Pagination query parameters.
///
/// Uses `serde_with` to parse page numbers from query strings as integers.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<u32>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl PaginationParams {
    /// Validates the parameters and builds a page request.
    ///
    /// # Defaults
    ///
    /// - `page`: 1
    /// - `page_size`: 20
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if `page` is 0 or `page_size` is
    /// outside `1..=100`.
    pub fn to_page_request(&self) -> Result<PageRequest, AppError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page == 0 {
            return Err(AppError::bad_request(
                "Page must be greater than 0",
                json!({ "page": page }),
            ));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::bad_request(
                format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
                json!({ "page_size": page_size }),
            ));
        }

        Ok(PageRequest::new(page, page_size))
    }
}

/// Query for `GET /api/campaigns`.
#[derive(Debug, Deserialize)]
pub struct CampaignListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    pub status: Option<String>,
}

impl CampaignListQuery {
    /// Parses the optional status filter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an unknown status.
    pub fn status(&self) -> Result<Option<CampaignStatus>, AppError> {
        parse_status(self.status.as_deref())
    }
}

/// Query for `GET /api/campaigns/{id}/deliveries`.
#[derive(Debug, Deserialize)]
pub struct DeliveryListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    pub status: Option<String>,
}

impl DeliveryListQuery {
    /// Parses the optional status filter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an unknown status.
    pub fn status(&self) -> Result<Option<DeliveryStatus>, AppError> {
        parse_status(self.status.as_deref())
    }
}

fn parse_status<S>(raw: Option<&str>) -> Result<Option<S>, AppError>
where
    S: std::str::FromStr<Err = String>,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: String| AppError::bad_request(e, json!({ "status": s }))),
    }
}
