use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::future::Future;
use tokio::time::Duration;
use tracing::warn;

use crate::error::RateLimitError;
use crate::models::{Category, CheckRequest, CheckResponse, RateLimitedResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Allowed {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Denied {
        retry_after: u64,
        reset_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct PreflightClient {
    client: reqwest::Client,
    check_url: String,
}

impl PreflightClient {
    // Accepts "host:port" or a full url
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        let base = base_url.trim().trim_end_matches('/');
        let base = if base.starts_with("http") {
            base.to_string()
        } else {
            format!("http://{}", base)
        };
        Self {
            client,
            check_url: format!("{}/rate-limit-check", base),
        }
    }

    pub fn check_url(&self) -> &str {
        &self.check_url
    }

    // forwarded_for goes out as X-Forwarded-For so the end user is counted, not this service
    pub async fn check(
        &self,
        category: Category,
        forwarded_for: Option<&str>,
    ) -> Result<CheckOutcome, RateLimitError> {
        let mut request = self
            .client
            .post(&self.check_url)
            .timeout(REQUEST_TIMEOUT)
            .json(&CheckRequest::for_category(category));
        if let Some(client_ip) = forwarded_for {
            request = request.header("x-forwarded-for", client_ip);
        }

        let res = request.send().await?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body: RateLimitedResponse = res.json().await?;
            return Ok(CheckOutcome::Denied {
                retry_after: body.retry_after,
                reset_at: DateTime::from_timestamp_millis(body.reset_at).unwrap_or_default(),
            });
        }

        let body: CheckResponse = res.error_for_status()?.json().await?;
        Ok(CheckOutcome::Allowed {
            remaining: body.remaining,
            reset_at: DateTime::from_timestamp_millis(body.reset_at).unwrap_or_default(),
        })
    }

    // Runs `action` unless the limiter denies it.
    pub async fn guard<F, Fut, T>(
        &self,
        category: Category,
        forwarded_for: Option<&str>,
        action: F,
    ) -> Result<T, RateLimitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.check(category, forwarded_for).await {
            Ok(CheckOutcome::Denied {
                retry_after,
                reset_at,
            }) => {
                return Err(RateLimitError::Exceeded {
                    retry_after,
                    reset_at,
                });
            }
            Ok(CheckOutcome::Allowed { .. }) => {}
            Err(e) => {
                warn!(error = %e, %category, "pre-flight rate limit check failed, proceeding");
            }
        }
        Ok(action().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_base_url() {
        assert_eq!(
            PreflightClient::new("localhost:8080").check_url(),
            "http://localhost:8080/rate-limit-check"
        );
        assert_eq!(
            PreflightClient::new("https://limits.internal/").check_url(),
            "https://limits.internal/rate-limit-check"
        );
    }
}
