#[derive(Debug, thiserror::Error)]
pub enum YoutubeError {
    #[error("resource not found")]
    NotFound,
    #[error("YouTube API quota exceeded")]
    QuotaExceeded,
    #[error("YouTube API key rejected")]
    InvalidKey,
    #[error("YouTube API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("YouTube request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected YouTube response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("channel input is empty")]
    EmptyInput,
    #[error("not a channel link")]
    UnsupportedUrl,
    #[error("no channel matches {0:?}")]
    NotFound(String),
    #[error(transparent)]
    Source(#[from] YoutubeError),
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("channel {0} no longer exists on YouTube")]
    NotFound(String),
    #[error(transparent)]
    Source(#[from] YoutubeError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
