use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use focustube_core::watch::DailyLimit;

pub use focustube_core::types::{ApiKeyStatus, BillingStatus, Tier};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub tier: Tier,
    pub subscription_status: BillingStatus,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub timezone: String,
    pub daily_limit_minutes: Option<i32>,
    pub limit_enabled: bool,
    pub hide_shorts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn daily_limit(&self) -> DailyLimit {
        DailyLimit {
            enabled: self.limit_enabled,
            minutes: self.daily_limit_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub user_id: String,
    pub name: Option<String>,
    pub status: ApiKeyStatus,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An active key joined with its owner's current tier.
#[derive(Debug, Clone, FromRow)]
pub struct KeyOwner {
    pub key_id: String,
    pub user_id: String,
    pub tier: Tier,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub handle: Option<String>,
    pub custom_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
    pub last_fetched_at: DateTime<Utc>,
}

/// Channel metadata as fetched from YouTube, before it lands in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpsert {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub handle: Option<String>,
    pub custom_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Video {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: Option<i32>,
    pub view_count: Option<i64>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUpsert {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: Option<i32>,
    pub view_count: Option<i64>,
}

/// A user's subscription joined with the shared channel cache.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscribedChannel {
    pub channel_id: String,
    pub title: String,
    pub handle: Option<String>,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub last_fetched_at: DateTime<Utc>,
    pub subscribed_at: DateTime<Utc>,
    pub category_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WatchState {
    pub user_id: String,
    pub video_id: String,
    pub watched: bool,
    pub progress_seconds: i32,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedItem {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: Option<i32>,
    pub view_count: Option<i64>,
    pub progress_seconds: i32,
    pub watched: bool,
}

/// Watch state joined with whatever the video cache knows; the video may
/// never have been cached.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryItem {
    pub video_id: String,
    pub title: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub progress_seconds: i32,
    pub watched: bool,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    AlreadySubscribed,
    LimitReached { tier: Tier, limit: i64 },
}
