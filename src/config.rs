use clap::Parser;
use std::time::Duration;

use crate::error::RateLimitError;
use crate::models::Category;
use crate::rate_limit::{DEFAULT_SWEEP_PROBABILITY, LimitConfig, Limits};

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "edge-rate-limiter")]
#[command(about = "Fixed-window rate limit check service")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "RATE_LIMITER_PORT", default_value_t = 8080)]
    pub port: u16,

    // Interface to bind
    #[arg(long, env = "RATE_LIMITER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    // Chance that a check also sweeps expired counters
    #[arg(long, env = "RATE_LIMITER_SWEEP_PROBABILITY", default_value_t = DEFAULT_SWEEP_PROBABILITY)]
    pub sweep_probability: f64,

    // Login attempts per window
    #[arg(long, env = "RATE_LIMIT_LOGIN_MAX", default_value_t = 5)]
    pub login_max: u32,

    // Login window in seconds
    #[arg(long, env = "RATE_LIMIT_LOGIN_WINDOW", default_value_t = 60)]
    pub login_window: u64,

    #[arg(long, env = "RATE_LIMIT_API_MAX", default_value_t = 100)]
    pub api_max: u32,

    #[arg(long, env = "RATE_LIMIT_API_WINDOW", default_value_t = 60)]
    pub api_window: u64,

    // AI recommendation calls per window
    #[arg(long, env = "RATE_LIMIT_AI_MAX", default_value_t = 20)]
    pub ai_max: u32,

    #[arg(long, env = "RATE_LIMIT_AI_WINDOW", default_value_t = 60)]
    pub ai_window: u64,

    // Approval links generated per window
    #[arg(long, env = "RATE_LIMIT_APPROVAL_MAX", default_value_t = 5)]
    pub approval_max: u32,

    #[arg(long, env = "RATE_LIMIT_APPROVAL_WINDOW", default_value_t = 60)]
    pub approval_window: u64,
}

impl Args {
    pub fn limits(&self) -> Result<Limits, RateLimitError> {
        let limit = |max, secs| LimitConfig::new(max, Duration::from_secs(secs));
        Ok(Limits::default()
            .with(Category::Login, limit(self.login_max, self.login_window)?)
            .with(Category::Api, limit(self.api_max, self.api_window)?)
            .with(Category::Ai, limit(self.ai_max, self.ai_window)?)
            .with(Category::Approval, limit(self.approval_max, self.approval_window)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn defaults_match_built_in_limits() {
        let args = Args::try_parse_from(["edge-rate-limiter"]).unwrap();
        assert_eq!(args.limits().unwrap(), Limits::default());
        assert_eq!(args.sweep_probability, DEFAULT_SWEEP_PROBABILITY);
    }

    #[test]
    fn overrides_single_category() {
        let args = Args::try_parse_from([
            "edge-rate-limiter",
            "--ai-max",
            "3",
            "--ai-window",
            "10",
        ])
        .unwrap();
        let limits = args.limits().unwrap();
        assert_eq!(limits.ai.max_requests, 3);
        assert_eq!(limits.ai.window, TimeDelta::seconds(10));
        assert_eq!(limits.login, Limits::default().login);
    }

    #[test]
    fn zero_window_is_rejected() {
        let args = Args::try_parse_from(["edge-rate-limiter", "--login-window", "0"]).unwrap();
        assert!(args.limits().is_err());
    }
}
