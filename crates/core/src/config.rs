use serde::Deserialize;

use crate::billing::ProductCatalog;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: String,
    pub focustube_env: String,
    pub api_bind: String,
    pub youtube_api_key: String,
    pub youtube_api_url: String,
    pub billing_api_url: String,
    pub billing_api_token: String,
    pub billing_webhook_secret: String,
    pub pro_product_id: String,
    pub unlimited_product_id: String,
    pub checkout_success_url: String,
    pub cors_origins: Vec<String>,
    pub rate_limit_free: u32,
    pub rate_limit_pro: u32,
    pub rate_limit_unlimited: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL", "FOCUSTUBE_DATABASE_URL")?;
        let redis_url = required("REDIS_URL", "FOCUSTUBE_REDIS_URL")?;
        let focustube_env = optional("FOCUSTUBE_ENV", "development");
        let api_bind = optional("FOCUSTUBE_API_BIND", "0.0.0.0:3000");
        let youtube_api_key = required_one("FOCUSTUBE_YOUTUBE_API_KEY")?;
        let youtube_api_url = optional(
            "FOCUSTUBE_YOUTUBE_API_URL",
            "https://www.googleapis.com/youtube/v3",
        );
        let billing_api_url = optional("FOCUSTUBE_BILLING_API_URL", "https://api.polar.sh");
        let billing_api_token = required_one("FOCUSTUBE_BILLING_API_TOKEN")?;
        let billing_webhook_secret = required_one("FOCUSTUBE_BILLING_WEBHOOK_SECRET")?;
        let pro_product_id = required_one("FOCUSTUBE_PRO_PRODUCT_ID")?;
        let unlimited_product_id = required_one("FOCUSTUBE_UNLIMITED_PRODUCT_ID")?;
        let checkout_success_url = optional(
            "FOCUSTUBE_CHECKOUT_SUCCESS_URL",
            "http://localhost:3000/billing/success",
        );
        let cors_origins = parse_list(&optional("FOCUSTUBE_CORS_ORIGINS", ""));

        Ok(Self {
            database_url,
            redis_url,
            focustube_env,
            api_bind,
            youtube_api_key,
            youtube_api_url,
            billing_api_url,
            billing_api_token,
            billing_webhook_secret,
            pro_product_id,
            unlimited_product_id,
            checkout_success_url,
            cors_origins,
            rate_limit_free: parsed("FOCUSTUBE_RATE_LIMIT_FREE", 60),
            rate_limit_pro: parsed("FOCUSTUBE_RATE_LIMIT_PRO", 600),
            rate_limit_unlimited: parsed("FOCUSTUBE_RATE_LIMIT_UNLIMITED", 6000),
        })
    }

    pub fn product_catalog(&self) -> ProductCatalog {
        ProductCatalog {
            pro_product_id: self.pro_product_id.clone(),
            unlimited_product_id: self.unlimited_product_id.clone(),
        }
    }
}

fn required(primary: &'static str, fallback: &'static str) -> Result<String, ConfigError> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .map_err(|_| ConfigError::Missing(primary))
}

fn required_one(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        assert_eq!(
            parse_list(" chrome-extension://abc , https://focustube.app,,"),
            vec!["chrome-extension://abc", "https://focustube.app"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_parsed_falls_back_on_garbage() {
        std::env::set_var("FOCUSTUBE_TEST_PARSED_GARBAGE", "sixty");
        assert_eq!(parsed("FOCUSTUBE_TEST_PARSED_GARBAGE", 60u32), 60);
        assert_eq!(parsed("FOCUSTUBE_TEST_PARSED_UNSET", 7i64), 7);
    }
}
