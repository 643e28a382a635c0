use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    /// Developer-facing detail; user-visible copy stays in `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid name or password")]
    Unauthorized,
    #[error("account is temporarily locked")]
    Locked,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("too many requests")]
    RateLimited,
    #[error("internal error")]
    Internal(Option<String>),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Conflict(reason) => ApiError::Conflict(reason),
            StoreError::Unauthorized => ApiError::Unauthorized,
            StoreError::Locked(_) => ApiError::Locked,
            // A relation-missing error only reaches the HTTP layer when the
            // fallback also failed; treat it like any other outage.
            StoreError::SchemaMissing(rel) => {
                ApiError::Internal(Some(format!("relation {rel} does not exist")))
            }
            StoreError::Unavailable(detail) => ApiError::Internal(Some(detail)),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Locked => StatusCode::LOCKED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let details = match self {
            ApiError::Internal(d) => d.clone(),
            _ => None,
        };
        HttpResponse::build(status).json(ApiErrorBody {
            error: self.to_string(),
            details,
        })
    }
}
