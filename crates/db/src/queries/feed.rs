//! Feed assembly: recent uploads of the channels a user subscribes to.
//!
//! Pages are keyed on `(published_at, video_id)` descending; the cursor a
//! client sends back is the last video id it received.

use crate::models::FeedItem;
use chrono::{DateTime, Utc};
use focustube_core::types::SHORTS_MAX_DURATION_SECS;
use sqlx::{PgPool, Postgres, QueryBuilder};

#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub category_id: Option<String>,
    pub cursor: Option<(DateTime<Utc>, String)>,
    pub limit: i64,
    pub include_watched: bool,
    pub hide_shorts: bool,
}

pub async fn cursor_position(
    pool: &PgPool,
    video_id: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT published_at FROM videos WHERE video_id = $1
        "#,
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await
}

pub async fn list(
    pool: &PgPool,
    user_id: &str,
    query: FeedQuery,
) -> Result<Vec<FeedItem>, sqlx::Error> {
    let mut qb = build_list(user_id, query);
    qb.build_query_as::<FeedItem>().fetch_all(pool).await
}

fn build_list(user_id: &str, query: FeedQuery) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT v.video_id, v.channel_id, c.title AS channel_title, v.title,
               v.thumbnail_url, v.published_at, v.duration_seconds, v.view_count,
               COALESCE(w.progress_seconds, 0) AS progress_seconds,
               COALESCE(w.watched, false) AS watched
        FROM videos v
        JOIN channel_subscriptions s ON s.channel_id = v.channel_id
        JOIN channels c ON c.channel_id = v.channel_id
        LEFT JOIN watch_states w ON w.user_id = s.user_id AND w.video_id = v.video_id
        WHERE s.user_id = "#,
    );
    qb.push_bind(user_id);

    if let Some(category_id) = query.category_id {
        qb.push(
            " AND EXISTS (SELECT 1 FROM category_channels cc \
             WHERE cc.user_id = s.user_id AND cc.channel_id = v.channel_id AND cc.category_id = ",
        )
        .push_bind(category_id)
        .push(")");
    }
    if let Some((published_at, video_id)) = query.cursor {
        qb.push(" AND (v.published_at, v.video_id) < (")
            .push_bind(published_at)
            .push(", ")
            .push_bind(video_id)
            .push(")");
    }
    if !query.include_watched {
        qb.push(" AND COALESCE(w.watched, false) = false");
    }
    if query.hide_shorts {
        qb.push(" AND (v.duration_seconds IS NULL OR v.duration_seconds > ")
            .push_bind(SHORTS_MAX_DURATION_SECS)
            .push(")");
    }

    qb.push(" ORDER BY v.published_at DESC, v.video_id DESC LIMIT ")
        .push_bind(query.limit);
    qb
}
