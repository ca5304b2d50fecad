use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::RateLimitedResponse;

pub const EXCEEDED_MESSAGE: &str = "Too many requests. Please try again later.";

#[derive(Debug, Error)]
pub enum RateLimitError {
    // Caller should wait `retry_after` seconds before trying again
    #[error("rate limit exceeded, retry after {retry_after}s")]
    Exceeded {
        retry_after: u64,
        reset_at: DateTime<Utc>,
    },

    #[error("rate limit store failure: {0}")]
    Store(String),

    #[error("invalid rate limit configuration: {0}")]
    Config(String),

    #[error("pre-flight request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RateLimitError {
    pub fn is_exceeded(&self) -> bool {
        matches!(self, RateLimitError::Exceeded { .. })
    }
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        match self {
            RateLimitError::Exceeded {
                retry_after,
                reset_at,
            } => {
                let body = RateLimitedResponse {
                    allowed: false,
                    error: EXCEEDED_MESSAGE.to_string(),
                    retry_after,
                    reset_at: reset_at.timestamp_millis(),
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, retry_after.into());
                response
            }
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": other.to_string() })),
            )
                .into_response(),
        }
    }
}
