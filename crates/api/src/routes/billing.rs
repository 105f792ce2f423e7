use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Extension, Json, Router,
};
use db::models::{Profile, Tier};
use focustube_core::auth::verify_webhook;
use focustube_core::billing::{plan_update, ProviderStatus, SubscriptionData, WebhookEvent};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::{
    error::{ApiResult, AppError},
    extract::ApiJson,
    middleware::auth::AuthContext,
    routes::me::load_profile,
    state::{AppState, RequestId},
};

const HEADER_ID: &str = "webhook-id";
const HEADER_TIMESTAMP: &str = "webhook-timestamp";
const HEADER_SIGNATURE: &str = "webhook-signature";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/billing/checkout", post(create_checkout))
        .route("/v1/billing/portal", post(create_portal))
        .with_state(state)
}

pub fn webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/billing", post(billing_webhook))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    tier: Tier,
}

#[derive(Debug, Serialize)]
struct RedirectResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: &'static str,
}

async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(payload): ApiJson<CheckoutRequest>,
) -> ApiResult<Json<RedirectResponse>> {
    let catalog = state.settings.product_catalog();
    let product_id = catalog.product_for(payload.tier).ok_or_else(|| {
        request_id.error(AppError::BadRequest(
            "tier must be pro or unlimited".to_string(),
        ))
    })?;

    let profile = load_profile(&state, &auth.user_id, &request_id).await?;
    let url = state
        .payments
        .create_checkout(
            product_id,
            &profile.email,
            &profile.id,
            &state.settings.checkout_success_url,
        )
        .await
        .map_err(|e| request_id.payments(e))?;

    tracing::info!(
        request_id = %request_id.0,
        user_id = %auth.user_id,
        tier = %payload.tier,
        "Checkout created"
    );
    Ok(Json(RedirectResponse { url }))
}

async fn create_portal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<RedirectResponse>> {
    let profile = load_profile(&state, &auth.user_id, &request_id).await?;
    let customer_id = profile.billing_customer_id.as_deref().ok_or_else(|| {
        request_id.error(AppError::BadRequest(
            "no billing account yet; start a checkout first".to_string(),
        ))
    })?;

    let url = state
        .payments
        .create_portal_session(customer_id)
        .await
        .map_err(|e| request_id.payments(e))?;

    Ok(Json(RedirectResponse { url }))
}

struct WebhookHeaders<'a> {
    id: &'a str,
    timestamp: &'a str,
    signature: &'a str,
}

fn webhook_headers(headers: &HeaderMap) -> Option<WebhookHeaders<'_>> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };
    Some(WebhookHeaders {
        id: get(HEADER_ID)?,
        timestamp: get(HEADER_TIMESTAMP)?,
        signature: get(HEADER_SIGNATURE)?,
    })
}

fn respond(status: &'static str) -> Json<WebhookResponse> {
    Json(WebhookResponse { status })
}

/// Payment provider callbacks. The ledger row and the profile update commit
/// together, so a failed update lets the provider's redelivery through.
async fn billing_webhook(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let webhook = webhook_headers(&headers).ok_or_else(|| {
        request_id.error(AppError::BadRequest("missing webhook headers".to_string()))
    })?;

    if let Err(e) = verify_webhook(
        &state.settings.billing_webhook_secret,
        webhook.id,
        webhook.timestamp,
        webhook.signature,
        &body,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(request_id = %request_id.0, webhook_id = %webhook.id, error = %e, "Webhook rejected");
        return Err(request_id.error(AppError::Unauthorized(
            "invalid webhook signature".to_string(),
        )));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| request_id.error(AppError::BadRequest(format!("invalid payload: {e}"))))?;

    let mut tx = state.db.begin().await.map_err(|e| request_id.internal(e))?;

    let first_delivery = db::queries::webhook_events::record(&mut *tx, webhook.id, &event.event_type)
        .await
        .map_err(|e| request_id.internal(e))?;
    if !first_delivery {
        tracing::info!(request_id = %request_id.0, webhook_id = %webhook.id, "Duplicate webhook");
        return Ok(respond("duplicate"));
    }

    let Some(event_status) = ProviderStatus::from_event_type(&event.event_type) else {
        tx.commit().await.map_err(|e| request_id.internal(e))?;
        tracing::debug!(request_id = %request_id.0, event_type = %event.event_type, "Ignoring webhook event");
        return Ok(respond("ignored"));
    };

    let data: SubscriptionData = serde_json::from_value(event.data).map_err(|e| {
        request_id.error(AppError::BadRequest(format!("invalid subscription payload: {e}")))
    })?;

    let Some(profile) = find_profile(&mut tx, &data)
        .await
        .map_err(|e| request_id.internal(e))?
    else {
        tracing::warn!(
            request_id = %request_id.0,
            webhook_id = %webhook.id,
            subscription_id = %data.id,
            "Webhook for unknown user"
        );
        tx.commit().await.map_err(|e| request_id.internal(e))?;
        return Ok(respond("ignored"));
    };

    let update = match plan_update(event_status, &data, &state.settings.product_catalog()) {
        Ok(Some(update)) => update,
        Ok(None) => {
            tx.commit().await.map_err(|e| request_id.internal(e))?;
            return Ok(respond("ignored"));
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id.0,
                webhook_id = %webhook.id,
                user_id = %profile.id,
                error = %e,
                "Webhook not applicable"
            );
            tx.commit().await.map_err(|e| request_id.internal(e))?;
            return Ok(respond("ignored"));
        }
    };

    db::queries::profiles::apply_billing(
        &mut *tx,
        &profile.id,
        update.tier,
        update.status,
        data.customer_id.as_deref(),
        Some(&data.id),
    )
    .await
    .map_err(|e| request_id.internal(e))?;

    tx.commit().await.map_err(|e| request_id.internal(e))?;

    tracing::info!(
        request_id = %request_id.0,
        webhook_id = %webhook.id,
        user_id = %profile.id,
        event_type = %event.event_type,
        tier = ?update.tier,
        status = ?update.status,
        "Billing updated"
    );
    Ok(respond("processed"))
}

/// The user id from checkout metadata, falling back to the billing customer.
async fn find_profile(
    conn: &mut PgConnection,
    data: &SubscriptionData,
) -> Result<Option<Profile>, sqlx::Error> {
    if let Some(user_id) = data.metadata.user_id.as_deref() {
        if let Some(profile) = db::queries::profiles::get_by_id(&mut *conn, user_id).await? {
            return Ok(Some(profile));
        }
    }
    match data.customer_id.as_deref() {
        Some(customer_id) => {
            db::queries::profiles::get_by_billing_customer(&mut *conn, customer_id).await
        }
        None => Ok(None),
    }
}
