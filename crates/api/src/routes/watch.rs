use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use db::models::{HistoryItem, WatchState};
use focustube_core::watch::{clamp_delta, daily_status, is_completed, DailyStatus};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiResult, AppError},
    extract::ApiJson,
    middleware::auth::AuthContext,
    routes::feed::{next_cursor, page_size},
    routes::me::load_profile,
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/watch/today", get(today))
        .route("/v1/watch/{video_id}/progress", put(update_progress))
        .route(
            "/v1/watch/{video_id}/watched",
            post(mark_watched).delete(unmark_watched),
        )
        .route("/v1/history", get(history))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressRequest {
    progress_seconds: i32,
    /// Seconds actually watched since the previous report.
    #[serde(default)]
    watched_delta: i32,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    cursor: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchStateResponse {
    video_id: String,
    watched: bool,
    progress_seconds: i32,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl From<WatchState> for WatchStateResponse {
    fn from(state: WatchState) -> Self {
        Self {
            video_id: state.video_id,
            watched: state.watched,
            progress_seconds: state.progress_seconds,
            completed: state.completed,
            updated_at: state.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResponse {
    state: WatchStateResponse,
    today: DailyStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryItemResponse {
    video_id: String,
    title: Option<String>,
    channel_id: Option<String>,
    channel_title: Option<String>,
    thumbnail_url: Option<String>,
    duration_seconds: Option<i32>,
    progress_seconds: i32,
    watched: bool,
    completed: bool,
    updated_at: DateTime<Utc>,
}

impl From<HistoryItem> for HistoryItemResponse {
    fn from(item: HistoryItem) -> Self {
        Self {
            video_id: item.video_id,
            title: item.title,
            channel_id: item.channel_id,
            channel_title: item.channel_title,
            thumbnail_url: item.thumbnail_url,
            duration_seconds: item.duration_seconds,
            progress_seconds: item.progress_seconds,
            watched: item.watched,
            completed: item.completed,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    items: Vec<HistoryItemResponse>,
    next_cursor: Option<String>,
}

/// YouTube ids are 11 characters of `[A-Za-z0-9_-]`; anything close enough
/// is accepted so the cache never has to know the video first.
fn valid_video_id(video_id: &str) -> bool {
    (1..=64).contains(&video_id.len())
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

async fn today_status(
    state: &AppState,
    user_id: &str,
    watched_seconds: Option<i64>,
    request_id: &RequestId,
) -> ApiResult<DailyStatus> {
    let profile = load_profile(state, user_id, request_id).await?;
    let watched_seconds = match watched_seconds {
        Some(seconds) => seconds,
        None => db::queries::watch::today_seconds(&state.db, user_id)
            .await
            .map_err(|e| request_id.internal(e))?,
    };
    Ok(daily_status(watched_seconds, profile.daily_limit()))
}

async fn update_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(video_id): Path<String>,
    ApiJson(payload): ApiJson<ProgressRequest>,
) -> ApiResult<Json<ProgressResponse>> {
    if !valid_video_id(&video_id) {
        return Err(request_id.error(AppError::BadRequest("invalid video id".to_string())));
    }
    if payload.progress_seconds < 0 {
        return Err(request_id.error(AppError::BadRequest(
            "progressSeconds must not be negative".to_string(),
        )));
    }

    let duration = db::queries::videos::get_duration(&state.db, &video_id)
        .await
        .map_err(|e| request_id.internal(e))?
        .flatten();
    let completed = is_completed(payload.progress_seconds, duration);

    let watch_state = db::queries::watch::upsert_progress(
        &state.db,
        &auth.user_id,
        &video_id,
        payload.progress_seconds,
        completed,
    )
    .await
    .map_err(|e| request_id.internal(e))?;

    let delta = clamp_delta(payload.watched_delta);
    let watched_today = if delta > 0 {
        Some(
            db::queries::watch::add_session_seconds(&state.db, &auth.user_id, delta)
                .await
                .map_err(|e| request_id.internal(e))?,
        )
    } else {
        None
    };

    let today = today_status(&state, &auth.user_id, watched_today, &request_id).await?;
    if today.limit_reached {
        tracing::debug!(request_id = %request_id.0, user_id = %auth.user_id, "Daily limit reached");
    }

    Ok(Json(ProgressResponse {
        state: watch_state.into(),
        today,
    }))
}

async fn mark_watched(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<WatchStateResponse>> {
    if !valid_video_id(&video_id) {
        return Err(request_id.error(AppError::BadRequest("invalid video id".to_string())));
    }

    let watch_state = db::queries::watch::mark_watched(&state.db, &auth.user_id, &video_id)
        .await
        .map_err(|e| request_id.internal(e))?;

    Ok(Json(watch_state.into()))
}

async fn unmark_watched(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<WatchStateResponse>> {
    if !valid_video_id(&video_id) {
        return Err(request_id.error(AppError::BadRequest("invalid video id".to_string())));
    }

    let watch_state = db::queries::watch::unmark_watched(&state.db, &auth.user_id, &video_id)
        .await
        .map_err(|e| request_id.internal(e))?
        .ok_or_else(|| request_id.error(AppError::NotFound("video has no watch state".to_string())))?;

    Ok(Json(watch_state.into()))
}

async fn today(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<DailyStatus>> {
    let status = today_status(&state, &auth.user_id, None, &request_id).await?;
    Ok(Json(status))
}

async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<HistoryResponse>> {
    let limit = page_size(params.limit);

    let cursor = match params.cursor.filter(|c| !c.is_empty()) {
        Some(video_id) => {
            let updated_at = db::queries::watch::history_cursor(&state.db, &auth.user_id, &video_id)
                .await
                .map_err(|e| request_id.internal(e))?
                .ok_or_else(|| request_id.error(AppError::BadRequest("invalid cursor".to_string())))?;
            Some((updated_at, video_id))
        }
        None => None,
    };

    let items = db::queries::watch::list_history(&state.db, &auth.user_id, cursor, limit)
        .await
        .map_err(|e| request_id.internal(e))?;
    let next_cursor = next_cursor(items.iter().map(|item| item.video_id.as_str()), limit);

    Ok(Json(HistoryResponse {
        items: items.into_iter().map(HistoryItemResponse::from).collect(),
        next_cursor,
    }))
}
