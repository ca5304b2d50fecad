use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};


lazy_static! {
    pub static ref CHECKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limiter_checks_total",
        "Rate limit checks by category and outcome",
        &["category", "outcome"]
    )
    .unwrap();
    pub static ref FAIL_OPEN_TOTAL: IntCounter = register_int_counter!(
        "rate_limiter_fail_open_total",
        "Checks allowed because the limiter failed internally"
    )
    .unwrap();
    pub static ref TRACKED_KEYS: IntGauge =
        register_int_gauge!("rate_limiter_tracked_keys", "Current number of counters in the store").unwrap();
    pub static ref SWEPT_TOTAL: IntCounter =
        register_int_counter!("rate_limiter_swept_total", "Expired counters removed by sweeps").unwrap();
    pub static ref CHECK_LATENCY: Histogram = register_histogram!(
        "rate_limiter_check_latency_seconds",
        "Rate limit check handler latency in seconds"
    )
    .unwrap();
}
