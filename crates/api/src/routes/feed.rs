use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use db::models::FeedItem;
use db::queries::feed::FeedQuery;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiResult, AppError},
    middleware::auth::AuthContext,
    routes::me::load_profile,
    state::{AppState, RequestId},
};

pub const DEFAULT_PAGE_SIZE: i64 = 30;
pub const MAX_PAGE_SIZE: i64 = 100;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/feed", get(get_feed))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedParams {
    category_id: Option<String>,
    cursor: Option<String>,
    limit: Option<i64>,
    #[serde(default)]
    include_watched: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedItemResponse {
    video_id: String,
    channel_id: String,
    channel_title: String,
    title: String,
    thumbnail_url: Option<String>,
    published_at: DateTime<Utc>,
    duration_seconds: Option<i32>,
    view_count: Option<i64>,
    progress_seconds: i32,
    watched: bool,
}

impl From<FeedItem> for FeedItemResponse {
    fn from(item: FeedItem) -> Self {
        Self {
            video_id: item.video_id,
            channel_id: item.channel_id,
            channel_title: item.channel_title,
            title: item.title,
            thumbnail_url: item.thumbnail_url,
            published_at: item.published_at,
            duration_seconds: item.duration_seconds,
            view_count: item.view_count,
            progress_seconds: item.progress_seconds,
            watched: item.watched,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedResponse {
    items: Vec<FeedItemResponse>,
    next_cursor: Option<String>,
}

pub fn page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// A full page may have more behind it; a short page is the end.
pub fn next_cursor<'a>(ids: impl ExactSizeIterator<Item = &'a str>, limit: i64) -> Option<String> {
    let len = ids.len();
    if (len as i64) < limit {
        return None;
    }
    ids.last().map(str::to_string)
}

async fn get_feed(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<FeedParams>,
) -> ApiResult<Json<FeedResponse>> {
    let limit = page_size(params.limit);
    let profile = load_profile(&state, &auth.user_id, &request_id).await?;

    let category_id = params.category_id.filter(|id| !id.trim().is_empty());
    if let Some(id) = category_id.as_ref() {
        let owned = db::queries::categories::count_owned(
            &state.db,
            &auth.user_id,
            std::slice::from_ref(id),
        )
        .await
        .map_err(|e| request_id.internal(e))?;
        if owned == 0 {
            return Err(request_id.error(AppError::NotFound("category not found".to_string())));
        }
    }

    let cursor = match params.cursor.filter(|c| !c.is_empty()) {
        Some(video_id) => {
            let published_at = db::queries::feed::cursor_position(&state.db, &video_id)
                .await
                .map_err(|e| request_id.internal(e))?
                .ok_or_else(|| request_id.error(AppError::BadRequest("invalid cursor".to_string())))?;
            Some((published_at, video_id))
        }
        None => None,
    };

    let items = db::queries::feed::list(
        &state.db,
        &auth.user_id,
        FeedQuery {
            category_id,
            cursor,
            limit,
            include_watched: params.include_watched,
            hide_shorts: profile.hide_shorts,
        },
    )
    .await
    .map_err(|e| request_id.internal(e))?;

    let next_cursor = next_cursor(items.iter().map(|item| item.video_id.as_str()), limit);

    Ok(Json(FeedResponse {
        items: items.into_iter().map(FeedItemResponse::from).collect(),
        next_cursor,
    }))
}
