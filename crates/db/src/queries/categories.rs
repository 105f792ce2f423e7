use crate::models::Category;
use sqlx::{PgPool, QueryBuilder};

pub async fn list(pool: &PgPool, user_id: &str) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        r#"
        SELECT id, user_id, name, color, position, created_at, updated_at
        FROM categories
        WHERE user_id = $1
        ORDER BY position ASC, created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// New categories go to the end of the user's list.
pub async fn create(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    name: &str,
    color: Option<&str>,
) -> Result<Category, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (id, user_id, name, color, position)
        VALUES (
            $1, $2, $3, $4,
            (SELECT COALESCE(MAX(position) + 1, 0) FROM categories WHERE user_id = $2)
        )
        RETURNING id, user_id, name, color, position, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(color)
    .fetch_one(pool)
    .await
}

/// `Ok(None)` when the category does not exist or belongs to someone else.
pub async fn update(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    name: Option<&str>,
    color: Option<&str>,
    position: Option<i32>,
) -> Result<Option<Category>, sqlx::Error> {
    let mut qb = QueryBuilder::new("UPDATE categories SET ");
    let mut set = qb.separated(", ");
    let mut updated = false;

    if let Some(value) = name {
        set.push("name = ").push_bind_unseparated(value);
        updated = true;
    }
    if let Some(value) = color {
        set.push("color = ").push_bind_unseparated(value);
        updated = true;
    }
    if let Some(value) = position {
        set.push("position = ").push_bind_unseparated(value);
        updated = true;
    }

    if !updated {
        return Err(sqlx::Error::Protocol("no fields to update".into()));
    }

    set.push("updated_at = now()");
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" AND user_id = ").push_bind(user_id);
    qb.push(" RETURNING id, user_id, name, color, position, created_at, updated_at");

    qb.build_query_as::<Category>().fetch_optional(pool).await
}

pub async fn delete(pool: &PgPool, id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM categories WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// How many of `ids` belong to the user. Callers compare with the number of
/// distinct ids they passed.
pub async fn count_owned(pool: &PgPool, user_id: &str, ids: &[String]) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM categories WHERE user_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(user_id)
    .bind(ids)
    .fetch_one(pool)
    .await
}

/// Replace the set of categories a subscribed channel is filed under.
pub async fn replace_for_channel(
    pool: &PgPool,
    user_id: &str,
    channel_id: &str,
    category_ids: &[String],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM category_channels WHERE user_id = $1 AND channel_id = $2
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(&mut *tx)
    .await?;

    if !category_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO category_channels (category_id, user_id, channel_id)
            SELECT id, $2, $3 FROM categories WHERE id = ANY($1) AND user_id = $2
            "#,
        )
        .bind(category_ids)
        .bind(user_id)
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
