use std::sync::Arc;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter: Arc::new(limiter),
        }
    }
}
