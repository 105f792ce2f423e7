//! Turn whatever the user pasted into a YouTube channel.
//!
//! Input is classified against a table of patterns (channel URLs, handles,
//! legacy usernames, vanity URLs, bare ids). Each class maps to an ordered
//! list of lookup strategies. A strategy that finds nothing hands over to the
//! next one; any other failure stops resolution, so quota problems are never
//! reported as "channel not found".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ResolveError, YoutubeError};
use crate::source::{ChannelMetadata, ChannelSource};

/// How many search hits are checked when matching a vanity URL.
const CUSTOM_URL_CANDIDATES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelQuery {
    /// `UC…` channel id.
    Id(String),
    /// `@handle`, stored without the `@`.
    Handle(String),
    /// Legacy `/user/<name>` URL.
    Username(String),
    /// `/c/<name>` or `youtube.com/<name>` vanity URL.
    CustomUrl(String),
    /// A single token that could be a handle or a username.
    BareName(String),
    /// Anything else: channel search.
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Id,
    Handle,
    Username,
    CustomUrl,
    Search,
}

impl ChannelQuery {
    pub fn term(&self) -> &str {
        match self {
            ChannelQuery::Id(term)
            | ChannelQuery::Handle(term)
            | ChannelQuery::Username(term)
            | ChannelQuery::CustomUrl(term)
            | ChannelQuery::BareName(term)
            | ChannelQuery::Search(term) => term,
        }
    }

    pub fn plan(&self) -> &'static [Strategy] {
        match self {
            ChannelQuery::Id(_) => &[Strategy::Id],
            ChannelQuery::Handle(_) => &[Strategy::Handle, Strategy::Search],
            ChannelQuery::Username(_) => &[Strategy::Username, Strategy::Handle, Strategy::Search],
            ChannelQuery::CustomUrl(_) => {
                &[Strategy::Handle, Strategy::CustomUrl, Strategy::Search]
            }
            ChannelQuery::BareName(_) => &[Strategy::Handle, Strategy::Username, Strategy::Search],
            ChannelQuery::Search(_) => &[Strategy::Search],
        }
    }
}

type Builder = fn(String) -> ChannelQuery;

const HOST: &str = r"^(?:https?://)?(?:(?i:www|m)\.)?(?i:youtube\.com)/";

/// First match wins.
static PATTERNS: Lazy<Vec<(Regex, Builder)>> = Lazy::new(|| {
    let table: [(String, Builder); 7] = [
        (r"^(UC[A-Za-z0-9_-]{22})$".to_string(), ChannelQuery::Id),
        (format!(r"{HOST}channel/(UC[A-Za-z0-9_-]{{22}})(?:[/?#].*)?$"), ChannelQuery::Id),
        (r"^@([A-Za-z0-9._-]{3,30})$".to_string(), ChannelQuery::Handle),
        (format!(r"{HOST}@([A-Za-z0-9._-]+)(?:[/?#].*)?$"), ChannelQuery::Handle),
        (format!(r"{HOST}user/([A-Za-z0-9._-]+)(?:[/?#].*)?$"), ChannelQuery::Username),
        (format!(r"{HOST}c/([^/?#\s]+)(?:[/?#].*)?$"), ChannelQuery::CustomUrl),
        (r"^([A-Za-z0-9._-]+)$".to_string(), ChannelQuery::BareName),
    ];

    table
        .into_iter()
        .map(|(pattern, build)| {
            let regex = Regex::new(&pattern)
                .unwrap_or_else(|e| panic!("channel pattern {pattern:?} is invalid: {e}"));
            (regex, build)
        })
        .collect()
});

/// `youtube.com/<name>` vanity links. Checked after [`PATTERNS`] so the
/// reserved first segments below can be told apart from channel names.
static VANITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{HOST}([A-Za-z0-9._-]+)/?(?:[?#].*)?$"))
        .expect("vanity pattern compiles")
});

static ANY_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?://|www\.|m\.|youtube\.com/|youtu\.be/)")
        .expect("url pattern compiles")
});

/// First path segments on youtube.com that never name a channel.
const RESERVED_PATHS: &[&str] = &[
    "watch", "results", "feed", "playlist", "shorts", "live", "embed", "hashtag",
    "channel", "user", "c", "account", "premium", "gaming", "music",
];

pub fn classify(input: &str) -> Result<ChannelQuery, ResolveError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ResolveError::EmptyInput);
    }

    for (regex, build) in PATTERNS.iter() {
        if let Some(caps) = regex.captures(input) {
            return Ok(build(caps[1].to_string()));
        }
    }

    if let Some(caps) = VANITY.captures(input) {
        let name = &caps[1];
        if RESERVED_PATHS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            return Err(ResolveError::UnsupportedUrl);
        }
        return Ok(ChannelQuery::CustomUrl(name.to_string()));
    }

    if ANY_URL.is_match(input) {
        return Err(ResolveError::UnsupportedUrl);
    }

    Ok(ChannelQuery::Search(input.to_string()))
}

/// Resolve user input to channel metadata, spending as few API calls as the
/// input allows.
pub async fn resolve_channel(
    source: &dyn ChannelSource,
    input: &str,
) -> Result<ChannelMetadata, ResolveError> {
    let query = classify(input)?;
    let term = query.term();

    for strategy in query.plan() {
        match run_strategy(source, *strategy, term).await {
            Ok(Some(channel)) => {
                tracing::debug!(
                    input = %input,
                    strategy = ?strategy,
                    channel_id = %channel.channel_id,
                    "Channel resolved"
                );
                return Ok(channel);
            }
            Ok(None) | Err(YoutubeError::NotFound) => {
                tracing::debug!(input = %input, strategy = ?strategy, "No match, trying next strategy");
            }
            Err(e) => return Err(ResolveError::Source(e)),
        }
    }

    Err(ResolveError::NotFound(input.trim().to_string()))
}

async fn run_strategy(
    source: &dyn ChannelSource,
    strategy: Strategy,
    term: &str,
) -> Result<Option<ChannelMetadata>, YoutubeError> {
    match strategy {
        Strategy::Id => Ok(source
            .channels_by_ids(&[term.to_string()])
            .await?
            .into_iter()
            .next()),
        Strategy::Handle => source.channel_by_handle(term).await,
        Strategy::Username => source.channel_by_username(term).await,
        Strategy::CustomUrl => {
            let ids = source.search_channel_ids(term, CUSTOM_URL_CANDIDATES).await?;
            if ids.is_empty() {
                return Ok(None);
            }
            Ok(source
                .channels_by_ids(&ids)
                .await?
                .into_iter()
                .find(|channel| channel.matches_custom_url(term)))
        }
        Strategy::Search => {
            let ids = source.search_channel_ids(term, 1).await?;
            match ids.into_iter().next() {
                Some(id) => Ok(source.channels_by_ids(&[id]).await?.into_iter().next()),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::source::VideoMetadata;

    const VERITASIUM: &str = "UCHnyfMqiRRG1u-2MsSQLbXA";

    fn channel(id: &str, custom_url: &str) -> ChannelMetadata {
        ChannelMetadata {
            channel_id: id.to_string(),
            title: custom_url.trim_start_matches('@').to_string(),
            description: String::new(),
            custom_url: Some(custom_url.to_string()),
            thumbnail_url: None,
            uploads_playlist_id: None,
            subscriber_count: None,
            video_count: None,
        }
    }

    #[derive(Default)]
    struct FakeSource {
        by_id: HashMap<String, ChannelMetadata>,
        by_handle: HashMap<String, String>,
        by_username: HashMap<String, String>,
        search: HashMap<String, Vec<String>>,
        quota_exhausted: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn with_channel(mut self, metadata: ChannelMetadata) -> Self {
            self.by_id.insert(metadata.channel_id.clone(), metadata);
            self
        }

        fn record(&self, call: String) -> Result<(), YoutubeError> {
            self.calls.lock().unwrap().push(call);
            if self.quota_exhausted {
                return Err(YoutubeError::QuotaExceeded);
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn lookup(&self, id: Option<&String>) -> Option<ChannelMetadata> {
            id.and_then(|id| self.by_id.get(id).cloned())
        }
    }

    #[async_trait]
    impl ChannelSource for FakeSource {
        async fn channels_by_ids(
            &self,
            ids: &[String],
        ) -> Result<Vec<ChannelMetadata>, YoutubeError> {
            self.record(format!("ids:{}", ids.join(",")))?;
            Ok(ids.iter().filter_map(|id| self.by_id.get(id).cloned()).collect())
        }

        async fn channel_by_handle(
            &self,
            handle: &str,
        ) -> Result<Option<ChannelMetadata>, YoutubeError> {
            self.record(format!("handle:{handle}"))?;
            Ok(self.lookup(self.by_handle.get(&handle.to_lowercase())))
        }

        async fn channel_by_username(
            &self,
            username: &str,
        ) -> Result<Option<ChannelMetadata>, YoutubeError> {
            self.record(format!("username:{username}"))?;
            Ok(self.lookup(self.by_username.get(username)))
        }

        async fn search_channel_ids(
            &self,
            query: &str,
            max_results: u32,
        ) -> Result<Vec<String>, YoutubeError> {
            self.record(format!("search:{query}"))?;
            Ok(self
                .search
                .get(query)
                .map(|ids| ids.iter().take(max_results as usize).cloned().collect())
                .unwrap_or_default())
        }

        async fn recent_videos(
            &self,
            _uploads_playlist_id: &str,
            _max_results: u32,
        ) -> Result<Vec<VideoMetadata>, YoutubeError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_classify_channel_ids() {
        assert_eq!(classify(VERITASIUM).unwrap(), ChannelQuery::Id(VERITASIUM.to_string()));
        assert_eq!(
            classify(&format!("https://www.youtube.com/channel/{VERITASIUM}/videos")).unwrap(),
            ChannelQuery::Id(VERITASIUM.to_string())
        );
        assert_eq!(
            classify(&format!("  youtube.com/channel/{VERITASIUM}?si=abc ")).unwrap(),
            ChannelQuery::Id(VERITASIUM.to_string())
        );
    }

    #[test]
    fn test_classify_handles_and_usernames() {
        assert_eq!(classify("@veritasium").unwrap(), ChannelQuery::Handle("veritasium".into()));
        assert_eq!(
            classify("https://m.youtube.com/@veritasium/featured").unwrap(),
            ChannelQuery::Handle("veritasium".into())
        );
        assert_eq!(
            classify("http://www.YouTube.com/user/1veritasium").unwrap(),
            ChannelQuery::Username("1veritasium".into())
        );
    }

    #[test]
    fn test_classify_vanity_urls() {
        assert_eq!(
            classify("https://www.youtube.com/c/Veritasium").unwrap(),
            ChannelQuery::CustomUrl("Veritasium".into())
        );
        assert_eq!(
            classify("youtube.com/veritasium/").unwrap(),
            ChannelQuery::CustomUrl("veritasium".into())
        );
    }

    #[test]
    fn test_classify_bare_tokens_and_free_text() {
        assert_eq!(classify("veritasium").unwrap(), ChannelQuery::BareName("veritasium".into()));
        assert_eq!(
            classify("  science videos with derek ").unwrap(),
            ChannelQuery::Search("science videos with derek".into())
        );
    }

    #[test]
    fn test_classify_rejects_empty_and_non_channel_links() {
        assert!(matches!(classify("   "), Err(ResolveError::EmptyInput)));
        assert!(matches!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Err(ResolveError::UnsupportedUrl)
        ));
        assert!(matches!(classify("https://youtu.be/dQw4w9WgXcQ"), Err(ResolveError::UnsupportedUrl)));
        assert!(matches!(
            classify("https://vimeo.com/channels/staffpicks"),
            Err(ResolveError::UnsupportedUrl)
        ));
    }

    #[test]
    fn test_plans_prefer_cheap_lookups() {
        assert_eq!(ChannelQuery::Id(String::new()).plan(), &[Strategy::Id]);
        assert_eq!(
            ChannelQuery::BareName(String::new()).plan(),
            &[Strategy::Handle, Strategy::Username, Strategy::Search]
        );
        assert_eq!(ChannelQuery::Search(String::new()).plan().last(), Some(&Strategy::Search));
    }

    #[tokio::test]
    async fn test_resolve_by_id_uses_single_lookup() {
        let source = FakeSource::default().with_channel(channel(VERITASIUM, "@veritasium"));

        let resolved = resolve_channel(&source, VERITASIUM).await.unwrap();

        assert_eq!(resolved.channel_id, VERITASIUM);
        assert_eq!(source.calls(), vec![format!("ids:{VERITASIUM}")]);
    }

    #[tokio::test]
    async fn test_bare_name_falls_through_to_username() {
        let mut source = FakeSource::default().with_channel(channel(VERITASIUM, "@veritasium"));
        source.by_username.insert("1veritasium".into(), VERITASIUM.into());

        let resolved = resolve_channel(&source, "1veritasium").await.unwrap();

        assert_eq!(resolved.channel_id, VERITASIUM);
        assert_eq!(
            source.calls(),
            vec!["handle:1veritasium".to_string(), "username:1veritasium".to_string()]
        );
    }

    #[tokio::test]
    async fn test_custom_url_matches_among_search_hits() {
        let other = "UCsXVk37bltHxD1rDPwtNM8Q";
        let mut source = FakeSource::default()
            .with_channel(channel(other, "@kurzgesagt"))
            .with_channel(channel(VERITASIUM, "@Veritasium"));
        source
            .search
            .insert("Veritasium".into(), vec![other.into(), VERITASIUM.into()]);

        let resolved = resolve_channel(&source, "https://www.youtube.com/c/Veritasium")
            .await
            .unwrap();

        assert_eq!(resolved.channel_id, VERITASIUM);
        assert_eq!(source.calls()[0], "handle:Veritasium");
        assert_eq!(source.calls()[1], "search:Veritasium");
    }

    #[tokio::test]
    async fn test_free_text_uses_first_search_hit() {
        let mut source = FakeSource::default().with_channel(channel(VERITASIUM, "@veritasium"));
        source.search.insert(
            "science videos with derek".into(),
            vec![VERITASIUM.into(), "UCsXVk37bltHxD1rDPwtNM8Q".into()],
        );

        let resolved = resolve_channel(&source, "science videos with derek")
            .await
            .unwrap();

        assert_eq!(resolved.channel_id, VERITASIUM);
    }

    #[tokio::test]
    async fn test_exhausted_plan_is_not_found() {
        let source = FakeSource::default();

        let err = resolve_channel(&source, "@nobody_here").await.unwrap_err();

        assert!(matches!(err, ResolveError::NotFound(ref input) if input == "@nobody_here"));
        assert_eq!(
            source.calls(),
            vec!["handle:nobody_here".to_string(), "search:nobody_here".to_string()]
        );
    }

    #[tokio::test]
    async fn test_quota_error_stops_resolution() {
        let source = FakeSource {
            quota_exhausted: true,
            ..FakeSource::default()
        };

        let err = resolve_channel(&source, "veritasium").await.unwrap_err();

        assert!(matches!(err, ResolveError::Source(YoutubeError::QuotaExceeded)));
        assert_eq!(source.calls().len(), 1);
    }
}
