//! YouTube Data API v3 client.
//!
//! Only the read endpoints FocusTube needs are wrapped: `channels`, `search`,
//! `playlistItems` and `videos`. Every request carries the server's API key.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::YoutubeError;
use crate::source::{ChannelMetadata, ChannelSource, VideoMetadata};

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// `videos.list` and `channels.list` accept at most 50 ids per call.
const MAX_IDS_PER_REQUEST: usize = 50;

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .expect("duration pattern compiles")
});

#[derive(Clone)]
pub struct YouTubeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, YoutubeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, YoutubeError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, resource))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| YoutubeError::Decode(e.to_string()))
    }

    async fn list_channels(
        &self,
        filter: (&str, &str),
    ) -> Result<Vec<ChannelMetadata>, YoutubeError> {
        let response: ListResponse<ChannelResource> = self
            .get(
                "channels",
                &[("part", "snippet,contentDetails,statistics"), filter],
            )
            .await?;
        Ok(response.items.into_iter().map(ChannelMetadata::from).collect())
    }

    async fn list_videos(&self, ids: &[String]) -> Result<Vec<VideoMetadata>, YoutubeError> {
        let mut videos = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk.join(",");
            let response: ListResponse<VideoResource> = self
                .get(
                    "videos",
                    &[
                        ("part", "snippet,contentDetails,statistics"),
                        ("id", &joined),
                    ],
                )
                .await?;
            videos.extend(response.items.into_iter().map(VideoMetadata::from));
        }
        Ok(videos)
    }
}

#[async_trait]
impl ChannelSource for YouTubeClient {
    async fn channels_by_ids(&self, ids: &[String]) -> Result<Vec<ChannelMetadata>, YoutubeError> {
        let mut channels = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk.join(",");
            channels.extend(self.list_channels(("id", &joined)).await?);
        }
        Ok(channels)
    }

    async fn channel_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<ChannelMetadata>, YoutubeError> {
        let handle = format!("@{}", handle.trim_start_matches('@'));
        Ok(self
            .list_channels(("forHandle", &handle))
            .await?
            .into_iter()
            .next())
    }

    async fn channel_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ChannelMetadata>, YoutubeError> {
        Ok(self
            .list_channels(("forUsername", username))
            .await?
            .into_iter()
            .next())
    }

    async fn search_channel_ids(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, YoutubeError> {
        let max_results = max_results.clamp(1, 50).to_string();
        let response: ListResponse<SearchResult> = self
            .get(
                "search",
                &[
                    ("part", "snippet"),
                    ("type", "channel"),
                    ("q", query),
                    ("maxResults", &max_results),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.id.channel_id)
            .collect())
    }

    async fn recent_videos(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<VideoMetadata>, YoutubeError> {
        let max_results = max_results.clamp(1, 50).to_string();
        let response: ListResponse<PlaylistItem> = self
            .get(
                "playlistItems",
                &[
                    ("part", "contentDetails"),
                    ("playlistId", uploads_playlist_id),
                    ("maxResults", &max_results),
                ],
            )
            .await?;

        let ids: Vec<String> = response
            .items
            .into_iter()
            .map(|item| item.content_details.video_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Private or deleted uploads still appear in the playlist but are
        // missing from videos.list.
        let mut videos = self.list_videos(&ids).await?;
        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(videos)
    }
}

/// Seconds in an ISO-8601 duration as YouTube formats them (`PT1H2M3S`,
/// `P1DT2H`, `P0D`). `None` for anything else.
pub fn parse_duration(value: &str) -> Option<i32> {
    let caps = ISO_DURATION.captures(value)?;
    let part = |index: usize, unit: i64| -> Option<i64> {
        match caps.get(index) {
            Some(m) => m.as_str().parse::<i64>().ok().map(|n| n * unit),
            None => Some(0),
        }
    };

    let total = part(1, 86_400)? + part(2, 3_600)? + part(3, 60)? + part(4, 1)?;
    i32::try_from(total).ok()
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorReason>,
    #[serde(default)]
    details: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: Option<String>,
}

/// Map a non-2xx response to an error kind using the structured reasons in
/// the body, falling back to the HTTP status.
pub fn classify_error(status: u16, body: &str) -> YoutubeError {
    let error = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or_default();

    let reasons: Vec<&str> = error
        .errors
        .iter()
        .chain(error.details.iter())
        .filter_map(|r| r.reason.as_deref())
        .collect();
    let has = |wanted: &[&str]| reasons.iter().any(|r| wanted.contains(r));

    if has(&["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"]) {
        return YoutubeError::QuotaExceeded;
    }
    if has(&["keyInvalid", "keyExpired", "API_KEY_INVALID", "accessNotConfigured"]) {
        return YoutubeError::InvalidKey;
    }
    if status == 404
        || has(&["channelNotFound", "playlistNotFound", "videoNotFound", "notFound"])
    {
        return YoutubeError::NotFound;
    }

    let message = if error.message.is_empty() {
        format!("HTTP {status}")
    } else {
        error.message
    };
    YoutubeError::Api { status, message }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ListResponse<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.high
            .or(self.medium)
            .or(self.default)
            .map(|thumbnail| thumbnail.url)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResource {
    id: String,
    snippet: ChannelSnippet,
    content_details: Option<ChannelContentDetails>,
    statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: String,
    custom_url: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    video_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
}

impl From<ChannelResource> for ChannelMetadata {
    fn from(resource: ChannelResource) -> Self {
        let (subscriber_count, video_count) = match resource.statistics {
            Some(stats) => {
                let subscribers = if stats.hidden_subscriber_count {
                    None
                } else {
                    parse_count(stats.subscriber_count.as_deref())
                };
                (subscribers, parse_count(stats.video_count.as_deref()))
            }
            None => (None, None),
        };

        ChannelMetadata {
            channel_id: resource.id,
            title: resource.snippet.title,
            description: resource.snippet.description,
            custom_url: resource.snippet.custom_url,
            thumbnail_url: resource.snippet.thumbnails.best(),
            uploads_playlist_id: resource
                .content_details
                .and_then(|details| details.related_playlists.uploads),
            subscriber_count,
            video_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: SearchResultId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultId {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    id: String,
    snippet: VideoSnippet,
    content_details: Option<VideoContentDetails>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    channel_id: String,
    title: String,
    #[serde(default)]
    description: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
}

impl From<VideoResource> for VideoMetadata {
    fn from(resource: VideoResource) -> Self {
        VideoMetadata {
            video_id: resource.id,
            channel_id: resource.snippet.channel_id,
            title: resource.snippet.title,
            description: resource.snippet.description,
            thumbnail_url: resource.snippet.thumbnails.best(),
            published_at: resource.snippet.published_at,
            duration_seconds: resource
                .content_details
                .and_then(|details| details.duration)
                .and_then(|duration| parse_duration(&duration)),
            view_count: resource
                .statistics
                .and_then(|stats| parse_count(stats.view_count.as_deref())),
        }
    }
}

fn parse_count(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT45S"), Some(45));
        assert_eq!(parse_duration("PT4M13S"), Some(253));
        assert_eq!(parse_duration("PT1H2M3S"), Some(3723));
        assert_eq!(parse_duration("PT2H"), Some(7200));
        assert_eq!(parse_duration("P1DT1S"), Some(86_401));
        assert_eq!(parse_duration("P0D"), Some(0));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("4:13"), None);
        assert_eq!(parse_duration("PT4.5S"), None);
        assert_eq!(parse_duration("P1W"), None);
    }

    #[test]
    fn test_classify_quota_error() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota.","errors":[{"message":"quota","domain":"youtube.quota","reason":"quotaExceeded"}]}}"#;
        assert!(matches!(classify_error(403, body), YoutubeError::QuotaExceeded));
    }

    #[test]
    fn test_classify_invalid_key_from_details() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","errors":[{"reason":"badRequest"}],"status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID"}]}}"#;
        assert!(matches!(classify_error(400, body), YoutubeError::InvalidKey));
    }

    #[test]
    fn test_classify_not_found() {
        let body = r#"{"error":{"code":404,"message":"The playlist identified with the request's playlistId parameter cannot be found.","errors":[{"reason":"playlistNotFound"}]}}"#;
        assert!(matches!(classify_error(404, body), YoutubeError::NotFound));
    }

    #[test]
    fn test_classify_unstructured_body_keeps_status() {
        match classify_error(502, "<html>Bad Gateway</html>") {
            YoutubeError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "HTTP 502");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_hidden_subscriber_count_is_dropped() {
        let resource: ChannelResource = serde_json::from_str(
            r#"{
                "id": "UC_x5XG1OV2P6uZZ5FSM9Ttw",
                "snippet": {"title": "Google for Developers", "customUrl": "@googledevelopers"},
                "statistics": {"subscriberCount": "0", "videoCount": "6123", "hiddenSubscriberCount": true}
            }"#,
        )
        .expect("valid channel resource");

        let channel = ChannelMetadata::from(resource);
        assert_eq!(channel.subscriber_count, None);
        assert_eq!(channel.video_count, Some(6123));
        assert_eq!(channel.uploads_playlist_id, None);
        assert_eq!(channel.thumbnail_url, None);
    }
}
