use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use feed::refresh::{refresh_serially, RefreshSummary};
use feed::ChannelSource;
use sqlx::PgPool;
use tracing::{info, warn};

/// Refresh up to `batch_size` subscribed channels whose cache is older than
/// `stale_after`, oldest first, one at a time.
pub async fn refresh_stale(
    pool: &PgPool,
    source: &dyn ChannelSource,
    stale_after: Duration,
    batch_size: i64,
) -> Result<RefreshSummary, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::zero());
    let stale = db::queries::channels::list_stale(pool, cutoff, batch_size).await?;
    if stale.is_empty() {
        return Ok(RefreshSummary::default());
    }

    let ids: Vec<String> = stale.into_iter().map(|channel| channel.channel_id).collect();
    Ok(refresh_serially(pool, source, &ids).await)
}

/// Tick every `interval` until `shutdown` resolves. A failed tick is logged
/// and the loop carries on.
pub async fn run_loop(
    pool: &PgPool,
    source: &dyn ChannelSource,
    interval: Duration,
    batch_size: i64,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // Polled across iterations; covers both the wait and the refresh itself.
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }

        tokio::select! {
            result = refresh_stale(pool, source, interval, batch_size) => match result {
                Ok(summary) if summary.refreshed + summary.failed > 0 => {
                    info!(refreshed = summary.refreshed, failed = summary.failed, "refresh tick finished");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "refresh tick failed"),
            },
            _ = &mut shutdown => break,
        }
    }

    info!("shutdown requested");
}
