use std::fmt::Debug;

use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use serde::Deserialize;
use serde::Serialize;

use crate::utils::error_chain_fmt;

/// Every lead endpoint answers with this envelope, success or not.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LeadResponse {
    pub fn ok() -> HttpResponse {
        HttpResponse::Ok().json(Self {
            success: true,
            error: None,
        })
    }
}

/// Failure of a lead intake request. The `Display` string of each variant is
/// what the user sees; `Unexpected` is generic and its cause chain only goes
/// to the logs via `Debug`.
#[derive(thiserror::Error)]
pub enum IntakeError {
    /// Missing/invalid input. Nothing has been attempted yet.
    #[error("{0}")]
    Validation(String),
    /// The mailing-list provider refused the address; the provider's detail
    /// is passed through.
    #[error("{0}")]
    Rejected(String),
    #[error("Something went wrong. Please try again later.")]
    Unexpected(#[from] anyhow::Error),
}

impl Debug for IntakeError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for IntakeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(LeadResponse {
            success: false,
            error: Some(self.to_string()),
        })
    }
}

/// Installed via `JsonConfig`, so that bodies which are not JSON objects of
/// strings get the same envelope as a missing field, instead of actix's
/// plain-text 400.
pub fn json_error_handler(
    err: JsonPayloadError,
    _req: &HttpRequest,
) -> actix_web::Error {
    tracing::warn!(error.message = %err, "rejecting malformed request body");
    IntakeError::Validation("Invalid request body".to_string()).into()
}
