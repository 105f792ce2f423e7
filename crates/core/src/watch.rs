use serde::Serialize;

/// Share of a video's duration after which it counts as completed.
pub const COMPLETION_RATIO: f64 = 0.9;

/// Upper bound for a single progress report's watched-seconds delta.
pub const MAX_WATCH_DELTA_SECS: i32 = 300;

pub const MAX_DAILY_LIMIT_MINUTES: i32 = 24 * 60;

pub fn is_completed(progress_seconds: i32, duration_seconds: Option<i32>) -> bool {
    match duration_seconds {
        Some(duration) if duration > 0 => {
            f64::from(progress_seconds) >= f64::from(duration) * COMPLETION_RATIO
        }
        _ => false,
    }
}

pub fn clamp_delta(delta_seconds: i32) -> i32 {
    delta_seconds.clamp(0, MAX_WATCH_DELTA_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyLimit {
    pub enabled: bool,
    pub minutes: Option<i32>,
}

impl DailyLimit {
    pub fn limit_seconds(&self) -> Option<i64> {
        match (self.enabled, self.minutes) {
            (true, Some(minutes)) if minutes > 0 => Some(i64::from(minutes) * 60),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatus {
    pub watched_seconds: i64,
    pub limit_seconds: Option<i64>,
    pub remaining_seconds: Option<i64>,
    pub limit_reached: bool,
}

pub fn daily_status(watched_seconds: i64, limit: DailyLimit) -> DailyStatus {
    let watched_seconds = watched_seconds.max(0);
    match limit.limit_seconds() {
        Some(limit_seconds) => DailyStatus {
            watched_seconds,
            limit_seconds: Some(limit_seconds),
            remaining_seconds: Some((limit_seconds - watched_seconds).max(0)),
            limit_reached: watched_seconds >= limit_seconds,
        },
        None => DailyStatus {
            watched_seconds,
            limit_seconds: None,
            remaining_seconds: None,
            limit_reached: false,
        },
    }
}
