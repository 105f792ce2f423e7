//! YouTube-facing half of FocusTube: the Data API client, the channel
//! resolver behind "add channel", and the cache refresh pipeline.

pub mod error;
pub mod refresh;
pub mod resolve;
pub mod source;
pub mod youtube;

pub use error::{RefreshError, ResolveError, YoutubeError};
pub use source::{ChannelMetadata, ChannelSource, VideoMetadata};
pub use youtube::YouTubeClient;
