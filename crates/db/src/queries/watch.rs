use crate::models::{HistoryItem, WatchState};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Record resume progress. Completion is sticky: once a video is completed it
/// stays completed (and watched) even if the user scrubs back.
pub async fn upsert_progress(
    pool: &PgPool,
    user_id: &str,
    video_id: &str,
    progress_seconds: i32,
    completed: bool,
) -> Result<WatchState, sqlx::Error> {
    sqlx::query_as::<_, WatchState>(
        r#"
        INSERT INTO watch_states (user_id, video_id, progress_seconds, completed, watched)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (user_id, video_id) DO UPDATE
        SET progress_seconds = EXCLUDED.progress_seconds,
            completed = watch_states.completed OR EXCLUDED.completed,
            watched = watch_states.watched OR EXCLUDED.completed,
            updated_at = now()
        RETURNING user_id, video_id, watched, progress_seconds, completed, updated_at
        "#,
    )
    .bind(user_id)
    .bind(video_id)
    .bind(progress_seconds)
    .bind(completed)
    .fetch_one(pool)
    .await
}

pub async fn mark_watched(
    pool: &PgPool,
    user_id: &str,
    video_id: &str,
) -> Result<WatchState, sqlx::Error> {
    sqlx::query_as::<_, WatchState>(
        r#"
        INSERT INTO watch_states (user_id, video_id, watched)
        VALUES ($1, $2, true)
        ON CONFLICT (user_id, video_id) DO UPDATE
        SET watched = true, updated_at = now()
        RETURNING user_id, video_id, watched, progress_seconds, completed, updated_at
        "#,
    )
    .bind(user_id)
    .bind(video_id)
    .fetch_one(pool)
    .await
}

/// Unmarking resets progress too, so the video reappears fresh in the feed.
pub async fn unmark_watched(
    pool: &PgPool,
    user_id: &str,
    video_id: &str,
) -> Result<Option<WatchState>, sqlx::Error> {
    sqlx::query_as::<_, WatchState>(
        r#"
        UPDATE watch_states
        SET watched = false, completed = false, progress_seconds = 0, updated_at = now()
        WHERE user_id = $1 AND video_id = $2
        RETURNING user_id, video_id, watched, progress_seconds, completed, updated_at
        "#,
    )
    .bind(user_id)
    .bind(video_id)
    .fetch_optional(pool)
    .await
}

pub async fn history_cursor(
    pool: &PgPool,
    user_id: &str,
    video_id: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT updated_at FROM watch_states WHERE user_id = $1 AND video_id = $2
        "#,
    )
    .bind(user_id)
    .bind(video_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_history(
    pool: &PgPool,
    user_id: &str,
    cursor: Option<(DateTime<Utc>, String)>,
    limit: i64,
) -> Result<Vec<HistoryItem>, sqlx::Error> {
    let (cursor_time, cursor_id) = match cursor {
        Some((time, id)) => (Some(time), Some(id)),
        None => (None, None),
    };

    sqlx::query_as::<_, HistoryItem>(
        r#"
        SELECT w.video_id, v.title, v.channel_id, c.title AS channel_title,
               v.thumbnail_url, v.duration_seconds, w.progress_seconds,
               w.watched, w.completed, w.updated_at
        FROM watch_states w
        LEFT JOIN videos v ON v.video_id = w.video_id
        LEFT JOIN channels c ON c.channel_id = v.channel_id
        WHERE w.user_id = $1
          AND ($2::timestamptz IS NULL OR (w.updated_at, w.video_id) < ($2, $3))
        ORDER BY w.updated_at DESC, w.video_id DESC
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(cursor_time)
    .bind(cursor_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Add watched seconds to today's session, where "today" is the current date
/// in the profile's timezone. Returns the new total for today.
pub async fn add_session_seconds(
    pool: &PgPool,
    user_id: &str,
    seconds: i32,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO watch_sessions (user_id, session_date, watched_seconds)
        SELECT p.id, (now() AT TIME ZONE p.timezone)::date, $2
        FROM profiles p
        WHERE p.id = $1
        ON CONFLICT (user_id, session_date) DO UPDATE
        SET watched_seconds = watch_sessions.watched_seconds + EXCLUDED.watched_seconds,
            updated_at = now()
        RETURNING watched_seconds
        "#,
    )
    .bind(user_id)
    .bind(i64::from(seconds))
    .fetch_one(pool)
    .await
}

pub async fn today_seconds(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(
            (SELECT s.watched_seconds
             FROM watch_sessions s
             WHERE s.user_id = p.id
               AND s.session_date = (now() AT TIME ZONE p.timezone)::date),
            0
        )
        FROM profiles p
        WHERE p.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}
