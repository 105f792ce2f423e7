use crate::models::{BillingStatus, Profile, Tier};
use sqlx::{PgExecutor, PgPool, QueryBuilder};

const PROFILE_COLUMNS: &str = r#"
    id, email, tier, subscription_status, billing_customer_id,
    billing_subscription_id, timezone, daily_limit_minutes, limit_enabled,
    hide_shorts, created_at, updated_at
"#;

pub async fn create(
    pool: &PgPool,
    id: &str,
    email: &str,
    timezone: &str,
) -> Result<Profile, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        INSERT INTO profiles (id, email, timezone)
        VALUES ($1, $2, $3)
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(email)
    .bind(timezone)
    .fetch_one(pool)
    .await
}

pub async fn get_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        SELECT {PROFILE_COLUMNS}
        FROM profiles
        WHERE id = $1
        "#
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn get_by_billing_customer<'e>(
    executor: impl PgExecutor<'e>,
    customer_id: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        SELECT {PROFILE_COLUMNS}
        FROM profiles
        WHERE billing_customer_id = $1
        "#
    ))
    .bind(customer_id)
    .fetch_optional(executor)
    .await
}

/// Settings the user may change. Tier and billing columns are absent on
/// purpose: only [`apply_billing`] writes those.
#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate {
    pub timezone: Option<String>,
    /// `Some(None)` clears the limit.
    pub daily_limit_minutes: Option<Option<i32>>,
    pub limit_enabled: Option<bool>,
    pub hide_shorts: Option<bool>,
}

pub async fn update_settings(
    pool: &PgPool,
    id: &str,
    update: SettingsUpdate,
) -> Result<Profile, sqlx::Error> {
    let mut qb = QueryBuilder::new("UPDATE profiles SET ");
    let mut set = qb.separated(", ");
    let mut updated = false;

    if let Some(value) = update.timezone {
        set.push("timezone = ").push_bind_unseparated(value);
        updated = true;
    }
    if let Some(value) = update.daily_limit_minutes {
        set.push("daily_limit_minutes = ").push_bind_unseparated(value);
        updated = true;
    }
    if let Some(value) = update.limit_enabled {
        set.push("limit_enabled = ").push_bind_unseparated(value);
        updated = true;
    }
    if let Some(value) = update.hide_shorts {
        set.push("hide_shorts = ").push_bind_unseparated(value);
        updated = true;
    }

    if !updated {
        return Err(sqlx::Error::Protocol("no fields to update".into()));
    }

    set.push("updated_at = now()");
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" RETURNING ").push(PROFILE_COLUMNS);

    qb.build_query_as::<Profile>().fetch_one(pool).await
}

/// Write the outcome of a billing event. `tier: None` leaves the tier as is;
/// `None` ids leave the stored ids untouched.
pub async fn apply_billing<'e>(
    executor: impl PgExecutor<'e>,
    id: &str,
    tier: Option<Tier>,
    status: BillingStatus,
    customer_id: Option<&str>,
    subscription_id: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE profiles
        SET tier = COALESCE($2, tier),
            subscription_status = $3,
            billing_customer_id = COALESCE($4, billing_customer_id),
            billing_subscription_id = COALESCE($5, billing_subscription_id),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(tier)
    .bind(status)
    .bind(customer_id)
    .bind(subscription_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn is_valid_timezone(pool: &PgPool, timezone: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (SELECT 1 FROM pg_timezone_names WHERE name = $1)
        "#,
    )
    .bind(timezone)
    .fetch_one(pool)
    .await
}
