use std::sync::Arc;

use feed::YouTubeClient;
use focustube_core::config::Settings;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::payments::PaymentsClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: RedisClient,
    pub settings: Arc<Settings>,
    pub youtube: YouTubeClient,
    pub payments: PaymentsClient,
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[cfg(test)]
impl AppState {
    /// State wired to `db` with placeholder upstreams; nothing outbound is
    /// contacted unless a test points the clients at a mock server.
    pub fn for_tests(db: PgPool) -> Self {
        let settings = Settings {
            database_url: String::new(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            focustube_env: "test".to_string(),
            api_bind: "127.0.0.1:0".to_string(),
            youtube_api_key: "yt-test-key".to_string(),
            youtube_api_url: "http://127.0.0.1:9".to_string(),
            billing_api_url: "http://127.0.0.1:9".to_string(),
            billing_api_token: "billing-test-token".to_string(),
            // base64("focustube-test-secret")
            billing_webhook_secret: "whsec_Zm9jdXN0dWJlLXRlc3Qtc2VjcmV0".to_string(),
            pro_product_id: "prod_pro".to_string(),
            unlimited_product_id: "prod_unl".to_string(),
            checkout_success_url: "http://localhost/billing/success".to_string(),
            cors_origins: Vec::new(),
            rate_limit_free: 60,
            rate_limit_pro: 600,
            rate_limit_unlimited: 6000,
        };

        Self {
            db,
            redis: RedisClient::open(settings.redis_url.as_str()).unwrap(),
            youtube: YouTubeClient::new(&settings.youtube_api_url, &settings.youtube_api_key)
                .unwrap(),
            payments: PaymentsClient::new(&settings.billing_api_url, &settings.billing_api_token)
                .unwrap(),
            settings: Arc::new(settings),
        }
    }
}
