use sqlx::PgExecutor;

/// Claim a webhook id in the idempotency ledger.
///
/// Returns false when the id was already recorded. Run it inside the same
/// transaction as the profile update so a failed update releases the claim.
pub async fn record<'e>(
    executor: impl PgExecutor<'e>,
    webhook_id: &str,
    event_type: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO billing_webhook_events (webhook_id, event_type)
        VALUES ($1, $2)
        ON CONFLICT (webhook_id) DO NOTHING
        "#,
    )
    .bind(webhook_id)
    .bind(event_type)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}
