use axum::{
    extract::State,
    routing::{get, patch},
    Extension, Json, Router,
};
use db::models::{BillingStatus, Profile, Tier};
use db::queries::profiles::SettingsUpdate;
use focustube_core::watch::MAX_DAILY_LIMIT_MINUTES;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::{ApiResult, AppError},
    extract::ApiJson,
    middleware::auth::AuthContext,
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/me", get(get_me))
        .route("/v1/settings", patch(update_settings))
        .with_state(state)
}

/// Only user-controlled preferences. Unknown fields, `tier` included, are
/// rejected rather than ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateSettingsRequest {
    timezone: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    daily_limit_minutes: Option<Option<i32>>,
    limit_enabled: Option<bool>,
    hide_shorts: Option<bool>,
}

/// Distinguishes an explicit `null` (clear) from an absent field (keep).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    id: String,
    email: String,
    tier: Tier,
    subscription_status: BillingStatus,
    timezone: String,
    daily_limit_minutes: Option<i32>,
    limit_enabled: bool,
    hide_shorts: bool,
    channel_count: i64,
    /// `None` means unlimited.
    channel_limit: Option<i64>,
    has_billing_account: bool,
}

impl ProfileResponse {
    fn new(profile: Profile, channel_count: i64) -> Self {
        Self {
            channel_limit: profile.tier.channel_limit(),
            has_billing_account: profile.billing_customer_id.is_some(),
            id: profile.id,
            email: profile.email,
            tier: profile.tier,
            subscription_status: profile.subscription_status,
            timezone: profile.timezone,
            daily_limit_minutes: profile.daily_limit_minutes,
            limit_enabled: profile.limit_enabled,
            hide_shorts: profile.hide_shorts,
            channel_count,
        }
    }
}

pub(crate) async fn load_profile(
    state: &AppState,
    user_id: &str,
    request_id: &RequestId,
) -> ApiResult<Profile> {
    db::queries::profiles::get_by_id(&state.db, user_id)
        .await
        .map_err(|e| request_id.internal(e))?
        .ok_or_else(|| request_id.error(AppError::NotFound("profile not found".to_string())))
}

async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = load_profile(&state, &auth.user_id, &request_id).await?;
    let channel_count = db::queries::subscriptions::count(&state.db, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;

    Ok(Json(ProfileResponse::new(profile, channel_count)))
}

async fn update_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(payload): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let update = validate_settings(payload).map_err(|msg| request_id.error(AppError::BadRequest(msg)))?;

    if let Some(timezone) = update.timezone.as_deref() {
        let known = db::queries::profiles::is_valid_timezone(&state.db, timezone)
            .await
            .map_err(|e| request_id.internal(e))?;
        if !known {
            return Err(request_id.error(AppError::BadRequest(format!(
                "unknown timezone: {timezone}"
            ))));
        }
    }

    let profile = db::queries::profiles::update_settings(&state.db, &auth.user_id, update)
        .await
        .map_err(|e| request_id.internal(e))?;
    let channel_count = db::queries::subscriptions::count(&state.db, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;

    tracing::info!(request_id = %request_id.0, user_id = %auth.user_id, "Settings updated");

    Ok(Json(ProfileResponse::new(profile, channel_count)))
}

fn validate_settings(payload: UpdateSettingsRequest) -> Result<SettingsUpdate, String> {
    if payload.timezone.is_none()
        && payload.daily_limit_minutes.is_none()
        && payload.limit_enabled.is_none()
        && payload.hide_shorts.is_none()
    {
        return Err("no settings to update".to_string());
    }

    let timezone = match payload.timezone {
        Some(tz) if tz.trim().is_empty() => return Err("timezone must not be empty".to_string()),
        Some(tz) => Some(tz.trim().to_string()),
        None => None,
    };

    if let Some(Some(minutes)) = payload.daily_limit_minutes {
        if !(1..=MAX_DAILY_LIMIT_MINUTES).contains(&minutes) {
            return Err(format!(
                "dailyLimitMinutes must be between 1 and {MAX_DAILY_LIMIT_MINUTES}"
            ));
        }
    }

    Ok(SettingsUpdate {
        timezone,
        daily_limit_minutes: payload.daily_limit_minutes,
        limit_enabled: payload.limit_enabled,
        hide_shorts: payload.hide_shorts,
    })
}
