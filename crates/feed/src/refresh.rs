use std::collections::HashSet;

use db::models::{Channel, ChannelUpsert, VideoUpsert};
use db::queries;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::RefreshError;
use crate::source::{ChannelMetadata, ChannelSource};

/// Uploads fetched per channel on add and on every refresh.
pub const RECENT_VIDEO_COUNT: u32 = 15;

#[derive(Debug)]
pub struct StoredChannel {
    pub channel: Channel,
    pub videos_stored: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

/// Write channel metadata to the cache and pull its recent uploads.
///
/// A failure to fetch uploads is logged and leaves the channel cached with
/// whatever videos it already had.
pub async fn store_channel(
    pool: &PgPool,
    source: &dyn ChannelSource,
    metadata: ChannelMetadata,
) -> Result<StoredChannel, RefreshError> {
    let uploads = metadata.uploads_playlist_id.clone();
    let channel = queries::channels::upsert(pool, &ChannelUpsert::from(metadata)).await?;

    let Some(playlist_id) = uploads else {
        tracing::debug!(channel_id = %channel.channel_id, "Channel has no uploads playlist");
        return Ok(StoredChannel {
            channel,
            videos_stored: 0,
        });
    };

    let videos = match source.recent_videos(&playlist_id, RECENT_VIDEO_COUNT).await {
        Ok(videos) => videos,
        Err(e) => {
            tracing::warn!(
                channel_id = %channel.channel_id,
                error = %e,
                "Failed to fetch recent uploads"
            );
            return Ok(StoredChannel {
                channel,
                videos_stored: 0,
            });
        }
    };

    let mut seen = HashSet::new();
    let rows: Vec<VideoUpsert> = videos
        .into_iter()
        .filter(|video| seen.insert(video.video_id.clone()))
        .map(VideoUpsert::from)
        .collect();
    let videos_stored = queries::videos::upsert_many(pool, &rows).await?;

    tracing::debug!(
        channel_id = %channel.channel_id,
        videos = videos_stored,
        "Channel cached"
    );

    Ok(StoredChannel {
        channel,
        videos_stored,
    })
}

/// Re-fetch one channel by id and overwrite its cache rows.
pub async fn refresh_channel(
    pool: &PgPool,
    source: &dyn ChannelSource,
    channel_id: &str,
) -> Result<StoredChannel, RefreshError> {
    let metadata = source
        .channels_by_ids(&[channel_id.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RefreshError::NotFound(channel_id.to_string()))?;

    store_channel(pool, source, metadata).await
}

/// Refresh channels one at a time. A failing channel is logged and counted;
/// it never stops the rest of the batch.
pub async fn refresh_serially(
    pool: &PgPool,
    source: &dyn ChannelSource,
    channel_ids: &[String],
) -> RefreshSummary {
    let mut summary = RefreshSummary::default();

    for channel_id in channel_ids {
        match refresh_channel(pool, source, channel_id).await {
            Ok(_) => summary.refreshed += 1,
            Err(e) => {
                tracing::warn!(channel_id = %channel_id, error = %e, "Channel refresh failed");
                summary.failed += 1;
            }
        }
    }

    summary
}
