use crate::models::{SubscribeOutcome, SubscribedChannel, Tier};
use sqlx::PgPool;

pub async fn count(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM channel_subscriptions WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn exists(pool: &PgPool, user_id: &str, channel_id: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM channel_subscriptions WHERE user_id = $1 AND channel_id = $2
        )
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .fetch_one(pool)
    .await
}

/// Subscribe a user to a cached channel, enforcing the tier cap.
///
/// The profile row is locked for the duration of the transaction so two
/// concurrent adds cannot both pass the count check. Category assignments,
/// if any, are written in the same transaction; callers must have checked
/// that the categories belong to the user.
pub async fn create_within_tier_limit(
    pool: &PgPool,
    user_id: &str,
    channel_id: &str,
    category_ids: &[String],
) -> Result<SubscribeOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let tier = sqlx::query_scalar::<_, Tier>(
        r#"
        SELECT tier FROM profiles WHERE id = $1 FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let current = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM channel_subscriptions WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    if !tier.allows_another_channel(current) {
        return Ok(SubscribeOutcome::LimitReached {
            tier,
            limit: tier.channel_limit().unwrap_or(current),
        });
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO channel_subscriptions (user_id, channel_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, channel_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        return Ok(SubscribeOutcome::AlreadySubscribed);
    }

    if !category_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO category_channels (category_id, user_id, channel_id)
            SELECT id, $2, $3 FROM categories WHERE id = ANY($1) AND user_id = $2
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(category_ids)
        .bind(user_id)
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(SubscribeOutcome::Created)
}

/// Category assignments go with the subscription (FK cascade).
pub async fn delete(pool: &PgPool, user_id: &str, channel_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM channel_subscriptions
        WHERE user_id = $1 AND channel_id = $2
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_with_channels(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<SubscribedChannel>, sqlx::Error> {
    sqlx::query_as::<_, SubscribedChannel>(
        r#"
        SELECT c.channel_id, c.title, c.handle, c.thumbnail_url, c.subscriber_count,
               c.last_fetched_at, s.created_at AS subscribed_at,
               COALESCE(
                   array_agg(cc.category_id ORDER BY cc.category_id)
                       FILTER (WHERE cc.category_id IS NOT NULL),
                   '{}'
               ) AS category_ids
        FROM channel_subscriptions s
        JOIN channels c ON c.channel_id = s.channel_id
        LEFT JOIN category_channels cc
               ON cc.user_id = s.user_id AND cc.channel_id = s.channel_id
        WHERE s.user_id = $1
        GROUP BY c.channel_id, s.created_at
        ORDER BY lower(c.title) ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_channel_ids(pool: &PgPool, user_id: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT channel_id FROM channel_subscriptions
        WHERE user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
