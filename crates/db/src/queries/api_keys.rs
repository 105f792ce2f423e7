use crate::models::{ApiKey, KeyOwner};
use sqlx::PgPool;

pub async fn create(
    pool: &PgPool,
    id: &str,
    key_hash: &str,
    key_prefix: &str,
    user_id: &str,
    name: Option<&str>,
) -> Result<ApiKey, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (id, key_hash, key_prefix, user_id, name)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, key_hash, key_prefix, user_id, name, status,
                  last_used_at, expires_at, created_at
        "#,
    )
    .bind(id)
    .bind(key_hash)
    .bind(key_prefix)
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await
}

/// Look up an active key by hash together with the owner's tier, so a tier
/// change from billing applies on the very next request.
pub async fn find_owner(pool: &PgPool, key_hash: &str) -> Result<Option<KeyOwner>, sqlx::Error> {
    sqlx::query_as::<_, KeyOwner>(
        r#"
        SELECT k.id AS key_id, k.user_id, p.tier, k.expires_at
        FROM api_keys k
        JOIN profiles p ON p.id = k.user_id
        WHERE k.key_hash = $1 AND k.status = 'active'
        "#,
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<ApiKey>, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT id, key_hash, key_prefix, user_id, name, status,
               last_used_at, expires_at, created_at
        FROM api_keys
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Returns false when no key with that id belongs to the user.
pub async fn revoke(pool: &PgPool, id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE api_keys
        SET status = 'revoked'
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn touch_last_used(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE api_keys
        SET last_used_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
