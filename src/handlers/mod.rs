mod check;
mod health;
mod metrics;

pub use check::{apply_rate_limit_headers, check_handler, decision_response};
pub use health::health_handler;
pub use metrics::metrics_handler;
