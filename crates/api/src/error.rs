use axum::{http::StatusCode, response::IntoResponse, Json};
use feed::{RefreshError, ResolveError, YoutubeError};
use serde::Serialize;

use crate::payments::PaymentsError;
use crate::state::RequestId;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    LimitReached(String),
    RateLimited,
    Upstream(String),
    Internal,
}

#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: String,
}

impl AppError {
    pub fn with_request_id(self, request_id: &str) -> ApiError {
        ApiError {
            error: self,
            request_id: request_id.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self.error {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::LimitReached(msg) => (StatusCode::FORBIDDEN, "limit_reached", msg),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests".to_string(),
            ),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Unexpected error".to_string(),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                    request_id: self.request_id,
                },
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl RequestId {
    pub fn error(&self, error: AppError) -> ApiError {
        error.with_request_id(&self.0)
    }

    /// Log an unexpected failure and hide it behind the generic message.
    pub fn internal(&self, err: impl std::fmt::Display) -> ApiError {
        tracing::error!(request_id = %self.0, error = %err, "Request failed");
        self.error(AppError::Internal)
    }

    pub fn youtube(&self, err: YoutubeError) -> ApiError {
        let error = match err {
            YoutubeError::NotFound => AppError::NotFound("Channel not found".to_string()),
            YoutubeError::QuotaExceeded => {
                tracing::warn!(request_id = %self.0, "YouTube quota exhausted");
                AppError::Upstream("YouTube quota exceeded, try again later".to_string())
            }
            YoutubeError::InvalidKey => {
                tracing::error!(request_id = %self.0, "YouTube rejected the API key");
                AppError::Upstream("YouTube is unavailable".to_string())
            }
            other => {
                tracing::warn!(request_id = %self.0, error = %other, "YouTube request failed");
                AppError::Upstream("YouTube request failed".to_string())
            }
        };
        self.error(error)
    }

    pub fn resolve(&self, err: ResolveError) -> ApiError {
        match err {
            ResolveError::EmptyInput => {
                self.error(AppError::BadRequest("input is required".to_string()))
            }
            ResolveError::UnsupportedUrl => self.error(AppError::BadRequest(
                "Paste a channel link, @handle or channel ID".to_string(),
            )),
            ResolveError::NotFound(_) => {
                self.error(AppError::NotFound("Channel not found".to_string()))
            }
            ResolveError::Source(e) => self.youtube(e),
        }
    }

    pub fn refresh(&self, err: RefreshError) -> ApiError {
        match err {
            RefreshError::NotFound(_) => self.error(AppError::NotFound(
                "Channel no longer exists on YouTube".to_string(),
            )),
            RefreshError::Source(e) => self.youtube(e),
            RefreshError::Database(e) => self.internal(e),
        }
    }

    pub fn payments(&self, err: PaymentsError) -> ApiError {
        tracing::warn!(request_id = %self.0, error = %err, "Payments request failed");
        self.error(AppError::Upstream(
            "Payments provider unavailable, try again later".to_string(),
        ))
    }
}
