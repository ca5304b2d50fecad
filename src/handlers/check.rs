use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::RateLimitError;
use crate::identity::client_identifier;
use crate::metrics::CHECK_LATENCY;
use crate::models::{CheckRequest, CheckResponse};
use crate::rate_limit::Decision;
use crate::state::AppState;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

// X-RateLimit-* on every decision, reset in unix seconds
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(LIMIT_HEADER, decision.limit.into());
    headers.insert(REMAINING_HEADER, decision.remaining.into());
    headers.insert(RESET_HEADER, decision.reset_at.timestamp().into());
}

// 200 with the decision, or 429 with Retry-After
pub fn decision_response(decision: &Decision) -> Response {
    let mut response = match decision.into_result() {
        Ok(decision) => (
            StatusCode::OK,
            Json(CheckResponse {
                allowed: true,
                remaining: decision.remaining,
                reset_at: decision.reset_at.timestamp_millis(),
            }),
        )
            .into_response(),
        Err(exceeded) => exceeded.into_response(),
    };
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

// Body is parsed leniently, anything unreadable counts as the api category
pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();

    let request: CheckRequest = serde_json::from_slice(&body).unwrap_or_default();
    let category = request.category();
    let identifier = client_identifier(&headers);

    let decision = state.limiter.check_or_allow(category, &identifier);
    if decision.allowed {
        debug!(%category, %identifier, remaining = decision.remaining, "rate limit check passed");
    } else {
        let err = RateLimitError::Exceeded {
            retry_after: decision.retry_after,
            reset_at: decision.reset_at,
        };
        warn!(%category, %identifier, "{err}");
    }

    CHECK_LATENCY.observe(start_time.elapsed().as_secs_f64());

    decision_response(&decision)
}
