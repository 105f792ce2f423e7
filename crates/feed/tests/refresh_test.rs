//! Cache writes through the refresh pipeline, backed by a per-test Postgres
//! database and an in-memory channel source.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use feed::refresh::{refresh_channel, refresh_serially, store_channel, RefreshSummary};
use feed::{ChannelMetadata, ChannelSource, RefreshError, VideoMetadata, YoutubeError};
use sqlx::PgPool;

#[derive(Default)]
struct StubSource {
    channels: HashMap<String, ChannelMetadata>,
    uploads: HashMap<String, Vec<VideoMetadata>>,
}

impl StubSource {
    fn with_channel(mut self, id: &str, videos: Vec<VideoMetadata>) -> Self {
        let metadata = channel(id);
        if let Some(playlist) = metadata.uploads_playlist_id.clone() {
            self.uploads.insert(playlist, videos);
        }
        self.channels.insert(id.to_string(), metadata);
        self
    }
}

#[async_trait]
impl ChannelSource for StubSource {
    async fn channels_by_ids(&self, ids: &[String]) -> Result<Vec<ChannelMetadata>, YoutubeError> {
        Ok(ids.iter().filter_map(|id| self.channels.get(id).cloned()).collect())
    }

    async fn channel_by_handle(
        &self,
        _handle: &str,
    ) -> Result<Option<ChannelMetadata>, YoutubeError> {
        Ok(None)
    }

    async fn channel_by_username(
        &self,
        _username: &str,
    ) -> Result<Option<ChannelMetadata>, YoutubeError> {
        Ok(None)
    }

    async fn search_channel_ids(
        &self,
        _query: &str,
        _max_results: u32,
    ) -> Result<Vec<String>, YoutubeError> {
        Ok(Vec::new())
    }

    async fn recent_videos(
        &self,
        uploads_playlist_id: &str,
        _max_results: u32,
    ) -> Result<Vec<VideoMetadata>, YoutubeError> {
        self.uploads
            .get(uploads_playlist_id)
            .cloned()
            .ok_or(YoutubeError::QuotaExceeded)
    }
}

fn channel(id: &str) -> ChannelMetadata {
    ChannelMetadata {
        channel_id: id.to_string(),
        title: format!("Channel {id}"),
        description: String::new(),
        custom_url: Some(format!("@{}", id.to_lowercase())),
        thumbnail_url: None,
        uploads_playlist_id: Some(format!("UU{id}")),
        subscriber_count: Some(42),
        video_count: Some(3),
    }
}

fn video(id: &str, channel_id: &str, day: u32) -> VideoMetadata {
    VideoMetadata {
        video_id: id.to_string(),
        channel_id: channel_id.to_string(),
        title: format!("Video {id}"),
        description: String::new(),
        thumbnail_url: None,
        published_at: Utc.with_ymd_and_hms(2026, 9, day, 8, 0, 0).unwrap(),
        duration_seconds: Some(420),
        view_count: Some(10),
    }
}

async fn cached_videos(pool: &PgPool, channel_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE channel_id = $1")
        .bind(channel_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_store_channel_caches_uploads_once(pool: PgPool) {
    let source = StubSource::default().with_channel(
        "UCone",
        vec![
            video("vidA", "UCone", 3),
            video("vidB", "UCone", 2),
            video("vidA", "UCone", 3),
        ],
    );

    let stored = store_channel(&pool, &source, channel("UCone")).await.unwrap();

    assert_eq!(stored.channel.channel_id, "UCone");
    assert_eq!(stored.channel.handle.as_deref(), Some("@ucone"));
    assert_eq!(stored.videos_stored, 2);
    assert_eq!(cached_videos(&pool, "UCone").await, 2);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_store_channel_keeps_channel_when_uploads_fail(pool: PgPool) {
    // No uploads registered, so the playlist lookup errors.
    let source = StubSource::default();

    let stored = store_channel(&pool, &source, channel("UCtwo")).await.unwrap();

    assert_eq!(stored.videos_stored, 0);
    assert_eq!(stored.channel.title, "Channel UCtwo");
    assert_eq!(cached_videos(&pool, "UCtwo").await, 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_channel_gone_upstream(pool: PgPool) {
    let source = StubSource::default();

    let err = refresh_channel(&pool, &source, "UCgone").await.unwrap_err();

    assert!(matches!(err, RefreshError::NotFound(id) if id == "UCgone"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_refresh_serially_counts_failures_and_continues(pool: PgPool) {
    let source = StubSource::default()
        .with_channel("UCa", vec![video("vidA1", "UCa", 1)])
        .with_channel("UCc", vec![video("vidC1", "UCc", 4)]);
    let ids = vec!["UCa".to_string(), "UCgone".to_string(), "UCc".to_string()];

    let summary = refresh_serially(&pool, &source, &ids).await;

    assert_eq!(
        summary,
        RefreshSummary {
            refreshed: 2,
            failed: 1
        }
    );
    assert_eq!(cached_videos(&pool, "UCa").await, 1);
    assert_eq!(cached_videos(&pool, "UCc").await, 1);
}
