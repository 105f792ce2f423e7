use crate::models::VideoUpsert;
use sqlx::{PgPool, QueryBuilder};

/// Insert or overwrite cache rows keyed by video id. Latest write wins.
pub async fn upsert_many(pool: &PgPool, videos: &[VideoUpsert]) -> Result<u64, sqlx::Error> {
    if videos.is_empty() {
        return Ok(0);
    }

    let mut qb = QueryBuilder::new(
        "INSERT INTO videos (video_id, channel_id, title, description, thumbnail_url, \
         published_at, duration_seconds, view_count, fetched_at) ",
    );
    qb.push_values(videos, |mut row, video| {
        row.push_bind(&video.video_id)
            .push_bind(&video.channel_id)
            .push_bind(&video.title)
            .push_bind(&video.description)
            .push_bind(&video.thumbnail_url)
            .push_bind(video.published_at)
            .push_bind(video.duration_seconds)
            .push_bind(video.view_count)
            .push("now()");
    });
    qb.push(
        r#"
        ON CONFLICT (video_id) DO UPDATE
        SET channel_id = EXCLUDED.channel_id,
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            thumbnail_url = EXCLUDED.thumbnail_url,
            published_at = EXCLUDED.published_at,
            duration_seconds = COALESCE(EXCLUDED.duration_seconds, videos.duration_seconds),
            view_count = COALESCE(EXCLUDED.view_count, videos.view_count),
            fetched_at = EXCLUDED.fetched_at
        "#,
    );

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// `None` when the video is not cached, `Some(None)` when its duration is unknown.
pub async fn get_duration(
    pool: &PgPool,
    video_id: &str,
) -> Result<Option<Option<i32>>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i32>>(
        r#"
        SELECT duration_seconds
        FROM videos
        WHERE video_id = $1
        "#,
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await
}
