use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::handlers::{apply_rate_limit_headers, decision_response};
use crate::identity::client_identifier;
use crate::models::Category;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct RateGuard {
    limiter: Arc<RateLimiter>,
    category: Category,
}

impl RateGuard {
    pub fn new(limiter: Arc<RateLimiter>, category: Category) -> Self {
        Self { limiter, category }
    }
}

// Denied requests never reach the inner handler
pub async fn enforce(State(guard): State<RateGuard>, request: Request, next: Next) -> Response {
    let identifier = client_identifier(request.headers());
    let decision = guard.limiter.check_or_allow(guard.category, &identifier);

    if !decision.allowed {
        warn!(
            category = %guard.category,
            %identifier,
            path = %request.uri().path(),
            retry_after = decision.retry_after,
            "request rejected by rate limit"
        );
        return decision_response(&decision);
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}
