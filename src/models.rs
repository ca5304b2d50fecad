use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RateLimitError;

// Endpoint category - picks which limit applies and prefixes the store key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Login,
    Api,
    Ai,
    Approval,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Login,
        Category::Api,
        Category::Ai,
        Category::Approval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Login => "login",
            Category::Api => "api",
            Category::Ai => "ai",
            Category::Approval => "approval",
        }
    }

    // Names match exactly, anything else gets the general api limit
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or(Category::Api)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Category::Login),
            "api" => Ok(Category::Api),
            "ai" => Ok(Category::Ai),
            "approval" => Ok(Category::Approval),
            other => Err(RateLimitError::Config(format!(
                "unknown endpoint category '{other}'"
            ))),
        }
    }
}

// Body of a rate limit check call
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct CheckRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl CheckRequest {
    pub fn for_category(category: Category) -> Self {
        Self {
            endpoint: Some(category.as_str().to_string()),
        }
    }

    pub fn category(&self) -> Category {
        self.endpoint
            .as_deref()
            .map(Category::from_name_or_default)
            .unwrap_or(Category::Api)
    }
}

// 200 response, resetAt is unix epoch millis
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: i64,
}

// 429 response
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub allowed: bool,
    pub error: String,
    pub retry_after: u64,
    pub reset_at: i64,
}
