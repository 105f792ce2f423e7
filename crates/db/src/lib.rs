pub mod models;

pub mod queries {
    pub mod api_keys;
    pub mod categories;
    pub mod channels;
    pub mod feed;
    pub mod profiles;
    pub mod subscriptions;
    pub mod videos;
    pub mod watch;
    pub mod webhook_events;
}

use sqlx::PgPool;

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
