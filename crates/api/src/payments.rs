//! Payments provider REST client: hosted checkouts and customer portal sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PaymentsError {
    #[error("payments request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payments API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected payments response: {0}")]
    Decode(String),
}

#[derive(Clone)]
pub struct PaymentsClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct CheckoutRequest<'a> {
    products: [&'a str; 1],
    customer_email: &'a str,
    success_url: &'a str,
    metadata: CheckoutMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct CheckoutMetadata<'a> {
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct CustomerSessionRequest<'a> {
    customer_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CustomerSessionResponse {
    customer_portal_url: String,
}

impl PaymentsClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, PaymentsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Hosted checkout for one product. The user id travels in metadata and
    /// comes back on the subscription webhooks.
    pub async fn create_checkout(
        &self,
        product_id: &str,
        customer_email: &str,
        user_id: &str,
        success_url: &str,
    ) -> Result<String, PaymentsError> {
        let body = CheckoutRequest {
            products: [product_id],
            customer_email,
            success_url,
            metadata: CheckoutMetadata { user_id },
        };
        let response: CheckoutResponse = self.post("/v1/checkouts/", &body).await?;
        Ok(response.url)
    }

    pub async fn create_portal_session(&self, customer_id: &str) -> Result<String, PaymentsError> {
        let body = CustomerSessionRequest { customer_id };
        let response: CustomerSessionResponse =
            self.post("/v1/customer-sessions/", &body).await?;
        Ok(response.customer_portal_url)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, PaymentsError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(PaymentsError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| PaymentsError::Decode(e.to_string()))
    }
}

/// The provider answers errors with `{"detail": ...}` where detail is either
/// a string or a list of validation entries.
fn error_message(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());

    match detail {
        Some(serde_json::Value::String(message)) => message,
        Some(serde_json::Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| entry.get("msg").and_then(|msg| msg.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.chars().take(200).collect(),
    }
}
