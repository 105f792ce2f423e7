use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Videos at or below this duration are treated as shorts.
pub const SHORTS_MAX_DURATION_SECS: i32 = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "subscription_tier", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Unlimited,
}

impl Tier {
    /// Maximum number of subscribed channels, `None` when uncapped.
    pub const fn channel_limit(self) -> Option<i64> {
        match self {
            Tier::Free => Some(5),
            Tier::Pro => Some(25),
            Tier::Unlimited => None,
        }
    }

    pub fn allows_another_channel(self, current: i64) -> bool {
        match self.channel_limit() {
            Some(limit) => current < limit,
            None => true,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Unlimited => "unlimited",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "unlimited" => Ok(Tier::Unlimited),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

/// Local mirror of the payment provider's subscription state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "billing_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    None,
    Active,
    PastDue,
    Canceled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "api_key_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
}
