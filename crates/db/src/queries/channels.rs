use crate::models::{Channel, ChannelUpsert};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

/// Insert or overwrite the shared cache row for a channel. Latest write wins.
pub async fn upsert<'e>(
    executor: impl PgExecutor<'e>,
    channel: &ChannelUpsert,
) -> Result<Channel, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        INSERT INTO channels
            (channel_id, title, description, handle, custom_url, thumbnail_url,
             uploads_playlist_id, subscriber_count, video_count, last_fetched_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        ON CONFLICT (channel_id) DO UPDATE
        SET title = EXCLUDED.title,
            description = EXCLUDED.description,
            handle = EXCLUDED.handle,
            custom_url = EXCLUDED.custom_url,
            thumbnail_url = EXCLUDED.thumbnail_url,
            uploads_playlist_id = EXCLUDED.uploads_playlist_id,
            subscriber_count = EXCLUDED.subscriber_count,
            video_count = EXCLUDED.video_count,
            last_fetched_at = EXCLUDED.last_fetched_at
        RETURNING channel_id, title, description, handle, custom_url, thumbnail_url,
                  uploads_playlist_id, subscriber_count, video_count, last_fetched_at
        "#,
    )
    .bind(&channel.channel_id)
    .bind(&channel.title)
    .bind(&channel.description)
    .bind(&channel.handle)
    .bind(&channel.custom_url)
    .bind(&channel.thumbnail_url)
    .bind(&channel.uploads_playlist_id)
    .bind(channel.subscriber_count)
    .bind(channel.video_count)
    .fetch_one(executor)
    .await
}

/// Channels somebody still subscribes to whose cache predates `fetched_before`,
/// oldest first.
pub async fn list_stale(
    pool: &PgPool,
    fetched_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT c.channel_id, c.title, c.description, c.handle, c.custom_url,
               c.thumbnail_url, c.uploads_playlist_id, c.subscriber_count,
               c.video_count, c.last_fetched_at
        FROM channels c
        WHERE c.last_fetched_at < $1
          AND EXISTS (
              SELECT 1 FROM channel_subscriptions s WHERE s.channel_id = c.channel_id
          )
        ORDER BY c.last_fetched_at ASC
        LIMIT $2
        "#,
    )
    .bind(fetched_before)
    .bind(limit)
    .fetch_all(pool)
    .await
}
