use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use db::models::{Channel, SubscribeOutcome, SubscribedChannel, Tier};
use feed::refresh::{self, RefreshSummary};
use feed::resolve::resolve_channel;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult, AppError},
    extract::ApiJson,
    middleware::auth::AuthContext,
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/channels", post(add_channel).get(list_channels))
        .route("/v1/channels/refresh", post(refresh_all))
        .route("/v1/channels/{channel_id}", delete(remove_channel))
        .route("/v1/channels/{channel_id}/refresh", post(refresh_one))
        .route("/v1/channels/{channel_id}/categories", put(assign_categories))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddChannelRequest {
    input: String,
    #[serde(default)]
    category_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignCategoriesRequest {
    category_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResponse {
    channel_id: String,
    title: String,
    description: String,
    handle: Option<String>,
    thumbnail_url: Option<String>,
    subscriber_count: Option<i64>,
    video_count: Option<i64>,
    last_fetched_at: DateTime<Utc>,
}

impl From<Channel> for ChannelResponse {
    fn from(channel: Channel) -> Self {
        Self {
            channel_id: channel.channel_id,
            title: channel.title,
            description: channel.description,
            handle: channel.handle,
            thumbnail_url: channel.thumbnail_url,
            subscriber_count: channel.subscriber_count,
            video_count: channel.video_count,
            last_fetched_at: channel.last_fetched_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddChannelResponse {
    channel: ChannelResponse,
    videos_cached: u64,
    category_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribedChannelItem {
    channel_id: String,
    title: String,
    handle: Option<String>,
    thumbnail_url: Option<String>,
    subscriber_count: Option<i64>,
    last_fetched_at: DateTime<Utc>,
    subscribed_at: DateTime<Utc>,
    category_ids: Vec<String>,
}

impl From<SubscribedChannel> for SubscribedChannelItem {
    fn from(channel: SubscribedChannel) -> Self {
        Self {
            channel_id: channel.channel_id,
            title: channel.title,
            handle: channel.handle,
            thumbnail_url: channel.thumbnail_url,
            subscriber_count: channel.subscriber_count,
            last_fetched_at: channel.last_fetched_at,
            subscribed_at: channel.subscribed_at,
            category_ids: channel.category_ids,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelListResponse {
    items: Vec<SubscribedChannelItem>,
    count: usize,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshOneResponse {
    channel: ChannelResponse,
    videos_cached: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryAssignmentResponse {
    channel_id: String,
    category_ids: Vec<String>,
}

fn limit_message(tier: Tier, limit: i64) -> String {
    format!("The {tier} plan allows {limit} channels. Upgrade to add more.")
}

/// Sorted, de-duplicated, blank ids dropped.
fn normalize_ids(ids: Vec<String>) -> Vec<String> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every id must name one of the user's categories; checked before any write.
pub(crate) async fn ensure_categories_owned(
    state: &AppState,
    user_id: &str,
    ids: &[String],
    request_id: &RequestId,
) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }
    let owned = db::queries::categories::count_owned(&state.db, user_id, ids)
        .await
        .map_err(|e| request_id.internal(e))?;
    if owned != ids.len() as i64 {
        return Err(request_id.error(AppError::BadRequest("unknown category id".to_string())));
    }
    Ok(())
}

async fn ensure_subscribed(
    state: &AppState,
    user_id: &str,
    channel_id: &str,
    request_id: &RequestId,
) -> Result<(), ApiError> {
    let subscribed = db::queries::subscriptions::exists(&state.db, user_id, channel_id)
        .await
        .map_err(|e| request_id.internal(e))?;
    if !subscribed {
        return Err(request_id.error(AppError::NotFound("channel not subscribed".to_string())));
    }
    Ok(())
}

async fn add_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(payload): ApiJson<AddChannelRequest>,
) -> ApiResult<(StatusCode, Json<AddChannelResponse>)> {
    let input = payload.input.trim();
    if input.is_empty() {
        return Err(request_id.error(AppError::BadRequest("input is required".to_string())));
    }
    let category_ids = normalize_ids(payload.category_ids);
    ensure_categories_owned(&state, &auth.user_id, &category_ids, &request_id).await?;

    // Cheap capacity check before spending YouTube quota; the insert re-checks
    // under a row lock.
    let current = db::queries::subscriptions::count(&state.db, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;
    if !auth.tier.allows_another_channel(current) {
        let limit = auth.tier.channel_limit().unwrap_or(current);
        return Err(request_id.error(AppError::LimitReached(limit_message(auth.tier, limit))));
    }

    let metadata = resolve_channel(&state.youtube, input)
        .await
        .map_err(|e| request_id.resolve(e))?;

    let already = db::queries::subscriptions::exists(&state.db, &auth.user_id, &metadata.channel_id)
        .await
        .map_err(|e| request_id.internal(e))?;
    if already {
        return Err(request_id.error(AppError::Conflict(format!(
            "Already subscribed to {}",
            metadata.title
        ))));
    }

    let stored = refresh::store_channel(&state.db, &state.youtube, metadata)
        .await
        .map_err(|e| request_id.refresh(e))?;

    let outcome = db::queries::subscriptions::create_within_tier_limit(
        &state.db,
        &auth.user_id,
        &stored.channel.channel_id,
        &category_ids,
    )
    .await
    .map_err(|e| request_id.internal(e))?;

    match outcome {
        SubscribeOutcome::Created => {}
        SubscribeOutcome::AlreadySubscribed => {
            return Err(request_id.error(AppError::Conflict(format!(
                "Already subscribed to {}",
                stored.channel.title
            ))));
        }
        SubscribeOutcome::LimitReached { tier, limit } => {
            return Err(request_id.error(AppError::LimitReached(limit_message(tier, limit))));
        }
    }

    tracing::info!(
        request_id = %request_id.0,
        user_id = %auth.user_id,
        channel_id = %stored.channel.channel_id,
        videos = stored.videos_stored,
        "Channel added"
    );

    Ok((
        StatusCode::CREATED,
        Json(AddChannelResponse {
            channel: stored.channel.into(),
            videos_cached: stored.videos_stored,
            category_ids,
        }),
    ))
}

async fn list_channels(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<ChannelListResponse>> {
    let channels = db::queries::subscriptions::list_with_channels(&state.db, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;

    Ok(Json(ChannelListResponse {
        count: channels.len(),
        limit: auth.tier.channel_limit(),
        items: channels.into_iter().map(SubscribedChannelItem::from).collect(),
    }))
}

async fn remove_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(channel_id): Path<String>,
) -> ApiResult<StatusCode> {
    let removed = db::queries::subscriptions::delete(&state.db, &auth.user_id, &channel_id)
        .await
        .map_err(|e| request_id.internal(e))?;
    if !removed {
        return Err(request_id.error(AppError::NotFound("channel not subscribed".to_string())));
    }

    tracing::info!(request_id = %request_id.0, user_id = %auth.user_id, channel_id = %channel_id, "Channel removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_one(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(channel_id): Path<String>,
) -> ApiResult<Json<RefreshOneResponse>> {
    ensure_subscribed(&state, &auth.user_id, &channel_id, &request_id).await?;

    let stored = refresh::refresh_channel(&state.db, &state.youtube, &channel_id)
        .await
        .map_err(|e| request_id.refresh(e))?;

    Ok(Json(RefreshOneResponse {
        channel: stored.channel.into(),
        videos_cached: stored.videos_stored,
    }))
}

async fn refresh_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<RefreshSummary>> {
    let channel_ids = db::queries::subscriptions::list_channel_ids(&state.db, &auth.user_id)
        .await
        .map_err(|e| request_id.internal(e))?;

    let summary = refresh::refresh_serially(&state.db, &state.youtube, &channel_ids).await;

    tracing::info!(
        request_id = %request_id.0,
        user_id = %auth.user_id,
        refreshed = summary.refreshed,
        failed = summary.failed,
        "Subscribed channels refreshed"
    );
    Ok(Json(summary))
}

async fn assign_categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(channel_id): Path<String>,
    ApiJson(payload): ApiJson<AssignCategoriesRequest>,
) -> ApiResult<Json<CategoryAssignmentResponse>> {
    ensure_subscribed(&state, &auth.user_id, &channel_id, &request_id).await?;

    let category_ids = normalize_ids(payload.category_ids);
    ensure_categories_owned(&state, &auth.user_id, &category_ids, &request_id).await?;

    db::queries::categories::replace_for_channel(&state.db, &auth.user_id, &channel_id, &category_ids)
        .await
        .map_err(|e| request_id.internal(e))?;

    Ok(Json(CategoryAssignmentResponse {
        channel_id,
        category_ids,
    }))
}
