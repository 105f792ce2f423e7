use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::{ChannelUpsert, VideoUpsert};

use crate::error::YoutubeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    /// `customUrl` as YouTube reports it, e.g. `@veritasium`.
    pub custom_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

impl ChannelMetadata {
    pub fn handle(&self) -> Option<&str> {
        self.custom_url
            .as_deref()
            .filter(|url| url.starts_with('@'))
    }

    /// Case-insensitive comparison against a vanity name, with or without `@`.
    pub fn matches_custom_url(&self, name: &str) -> bool {
        let wanted = name.trim_start_matches('@');
        self.custom_url
            .as_deref()
            .map(|url| url.trim_start_matches('@').eq_ignore_ascii_case(wanted))
            .unwrap_or(false)
    }
}

impl From<ChannelMetadata> for ChannelUpsert {
    fn from(channel: ChannelMetadata) -> Self {
        let handle = channel.handle().map(str::to_string);
        ChannelUpsert {
            channel_id: channel.channel_id,
            title: channel.title,
            description: channel.description,
            handle,
            custom_url: channel.custom_url,
            thumbnail_url: channel.thumbnail_url,
            uploads_playlist_id: channel.uploads_playlist_id,
            subscriber_count: channel.subscriber_count,
            video_count: channel.video_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: Option<i32>,
    pub view_count: Option<i64>,
}

impl From<VideoMetadata> for VideoUpsert {
    fn from(video: VideoMetadata) -> Self {
        VideoUpsert {
            video_id: video.video_id,
            channel_id: video.channel_id,
            title: video.title,
            description: video.description,
            thumbnail_url: video.thumbnail_url,
            published_at: video.published_at,
            duration_seconds: video.duration_seconds,
            view_count: video.view_count,
        }
    }
}

/// Lookups the resolver and refresh pipeline need from the video platform.
///
/// Channel lookups return `Ok(None)` / an empty list when nothing matches;
/// errors are reserved for failures of the platform itself.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    async fn channels_by_ids(&self, ids: &[String]) -> Result<Vec<ChannelMetadata>, YoutubeError>;

    async fn channel_by_handle(&self, handle: &str)
        -> Result<Option<ChannelMetadata>, YoutubeError>;

    async fn channel_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ChannelMetadata>, YoutubeError>;

    /// Channel ids for a free-text query, best match first.
    async fn search_channel_ids(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, YoutubeError>;

    /// Most recent uploads of a channel, newest first.
    async fn recent_videos(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<VideoMetadata>, YoutubeError>;
}
