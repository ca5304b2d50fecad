use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::error::RateLimitError;
use crate::metrics::{CHECKS_TOTAL, FAIL_OPEN_TOTAL, SWEPT_TOTAL, TRACKED_KEYS};
use crate::models::Category;
use crate::store::{RateLimitStore, RateRecord};

pub const DEFAULT_SWEEP_PROBABILITY: f64 = 0.01;

// Max requests allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    pub max_requests: u32,
    pub window: TimeDelta,
}

impl LimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        if max_requests == 0 {
            return Err(RateLimitError::Config(
                "max requests must be at least 1".to_string(),
            ));
        }
        let window = TimeDelta::from_std(window)
            .ok()
            .filter(|w| *w > TimeDelta::zero())
            .ok_or_else(|| {
                RateLimitError::Config(format!("invalid window length {window:?}"))
            })?;
        Ok(Self {
            max_requests,
            window,
        })
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: TimeDelta::seconds(60),
        }
    }
}

// Limit table, one entry per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub login: LimitConfig,
    pub api: LimitConfig,
    pub ai: LimitConfig,
    pub approval: LimitConfig,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            login: LimitConfig::per_minute(5),
            api: LimitConfig::per_minute(100),
            ai: LimitConfig::per_minute(20),
            approval: LimitConfig::per_minute(5),
        }
    }
}

impl Limits {
    pub fn get(&self, category: Category) -> LimitConfig {
        match category {
            Category::Login => self.login,
            Category::Api => self.api,
            Category::Ai => self.ai,
            Category::Approval => self.approval,
        }
    }

    pub fn with(mut self, category: Category, config: LimitConfig) -> Self {
        match category {
            Category::Login => self.login = config,
            Category::Api => self.api = config,
            Category::Ai => self.ai = config,
            Category::Approval => self.approval = config,
        }
        self
    }
}

// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    // Whole seconds until the window resets, at least 1.
    pub retry_after: u64,
}

impl Decision {
    fn from_record(record: &RateRecord, limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            allowed: record.count <= limit,
            limit,
            remaining: limit.saturating_sub(record.count),
            reset_at: record.reset_at,
            retry_after: seconds_until(now, record.reset_at),
        }
    }

    fn fail_open(config: LimitConfig, now: DateTime<Utc>) -> Self {
        let record = RateRecord::fresh(now, config.window);
        Self {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests,
            reset_at: record.reset_at,
            retry_after: seconds_until(now, record.reset_at),
        }
    }

    pub fn into_result(self) -> Result<Self, RateLimitError> {
        if self.allowed {
            Ok(self)
        } else {
            Err(RateLimitError::Exceeded {
                retry_after: self.retry_after,
                reset_at: self.reset_at,
            })
        }
    }
}

fn seconds_until(now: DateTime<Utc>, then: DateTime<Utc>) -> u64 {
    let millis = (then - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}

// Fixed-window limiter over an injected store and clock.
#[derive(Debug)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    limits: Limits,
    sweep_probability: f64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>, limits: Limits) -> Self {
        Self {
            store,
            clock,
            limits,
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
        }
    }

    // Chance that a check also sweeps expired counters, clamped to [0, 1]
    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    pub fn check(
        &self,
        category: Category,
        identifier: &str,
    ) -> Result<Decision, RateLimitError> {
        let config = self.limits.get(category);
        let key = format!("{}:{}", category.as_str(), identifier);
        let now = self.clock.now();

        let record = self.store.hit(&key, now, config.window)?;
        let decision = Decision::from_record(&record, config.max_requests, now);

        let outcome = if decision.allowed { "allowed" } else { "denied" };
        CHECKS_TOTAL
            .with_label_values(&[category.as_str(), outcome])
            .inc();
        if !decision.allowed {
            debug!(%key, count = record.count, limit = config.max_requests, "rate limit exceeded");
        }

        self.maybe_sweep(now);
        Ok(decision)
    }

    // Like `check`, but an internal failure allows the request.
    pub fn check_or_allow(&self, category: Category, identifier: &str) -> Decision {
        match self.check(category, identifier) {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, %category, identifier, "rate limit check failed, allowing request");
                FAIL_OPEN_TOTAL.inc();
                CHECKS_TOTAL
                    .with_label_values(&[category.as_str(), "fail_open"])
                    .inc();
                Decision::fail_open(self.limits.get(category), self.clock.now())
            }
        }
    }

    fn maybe_sweep(&self, now: DateTime<Utc>) {
        if self.sweep_probability > 0.0 && rand::rng().random_bool(self.sweep_probability) {
            match self.store.sweep(now) {
                Ok(removed) => {
                    SWEPT_TOTAL.inc_by(removed as u64);
                    debug!(removed, "swept expired rate limit counters");
                }
                Err(e) => warn!(error = %e, "rate limit sweep failed"),
            }
        }
        TRACKED_KEYS.set(i64::try_from(self.store.len()).unwrap_or(i64::MAX));
    }
}
