use std::time::Duration;

use super::entry::{parse_feed, RawEntry};
use super::fetcher::{fetch_bytes, FetchError, FetchFailure};
use crate::util::{validate_feed_url, HostPolicy};

/// `limit` value meaning "take everything the source currently publishes".
pub const NO_LIMIT: usize = 0;

/// Connection settings for a [`FeedSource`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Upper bound on one URL's fetch, retries and body read included.
    pub timeout: Duration,
    /// Retries for 429, 5xx and truncated bodies.
    pub max_retries: u32,
    pub max_feed_bytes: usize,
    pub host_policy: HostPolicy,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            max_feed_bytes: 10 * 1024 * 1024,
            host_policy: HostPolicy::PublicOnly,
            user_agent: concat!("feedindex/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchSettings {
    /// Defaults with private hosts allowed, for mock servers on 127.0.0.1.
    pub fn for_local_testing() -> Self {
        Self {
            host_policy: HostPolicy::AllowPrivate,
            ..Self::default()
        }
    }
}

/// Feed source adapter: owns the target URL(s) and fetches entries from them.
///
/// `fetch` takes `&mut self`, so one instance never runs two fetches at once.
pub struct FeedSource {
    urls: Vec<String>,
    settings: FetchSettings,
    client: reqwest::Client,
}

impl FeedSource {
    pub fn new(settings: FetchSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self {
            urls: Vec::new(),
            settings,
            client,
        })
    }

    /// Stores the target URLs without fetching. Replaces any previous targets.
    pub fn configure<I, S>(&mut self, urls: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a single target URL.
    pub fn set_feed_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.urls = vec![url.into()];
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settings.timeout = timeout;
        self
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetches and parses every configured URL, in order.
    ///
    /// Entries keep source order across and within feeds. With `limit > 0`
    /// at most `limit` entries are returned and URLs past the limit are not
    /// requested. Any URL failing fails the whole fetch: a successful empty
    /// result always means the sources published nothing.
    pub async fn fetch(&mut self, limit: usize) -> Result<Vec<RawEntry>, FetchError> {
        if self.urls.is_empty() {
            return Err(FetchError::new("", FetchFailure::NotConfigured));
        }

        let mut entries = Vec::new();
        for url in &self.urls {
            if limit != NO_LIMIT && entries.len() >= limit {
                break;
            }

            let parsed_url = validate_feed_url(url, self.settings.host_policy)
                .map_err(|e| FetchError::new(url.as_str(), e.into()))?;
            let bytes = fetch_bytes(&self.client, parsed_url.as_str(), &self.settings)
                .await
                .map_err(|failure| FetchError::new(url.as_str(), failure))?;
            let parsed = parse_feed(&bytes)
                .map_err(|e| FetchError::new(url.as_str(), FetchFailure::Parse(e.to_string())))?;

            tracing::debug!(
                url = %url,
                entries = parsed.entries.len(),
                title = ?parsed.metadata.title,
                "Fetched feed"
            );

            let remaining = match limit {
                NO_LIMIT => usize::MAX,
                n => n - entries.len(),
            };
            entries.extend(parsed.entries.into_iter().take(remaining));
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss_with_items(channel: &str, ids: &[&str]) -> String {
        let items: String = ids
            .iter()
            .map(|id| format!("<item><guid>{id}</guid><title>Item {id}</title></item>"))
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{channel}</title>{items}</channel></rss>"#
        )
    }

    async fn serve(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn ids(entries: &[RawEntry]) -> Vec<&str> {
        entries.iter().filter_map(|e| e.id()).collect()
    }

    #[tokio::test]
    async fn test_fetch_without_url_is_not_configured() {
        let mut source = FeedSource::new(FetchSettings::for_local_testing()).unwrap();
        let err = source.fetch(NO_LIMIT).await.unwrap_err();
        assert!(matches!(err.failure, FetchFailure::NotConfigured));
    }

    #[tokio::test]
    async fn test_limit_takes_first_entries_in_source_order() {
        let server = MockServer::start().await;
        serve(&server, "/feed", rss_with_items("A", &["5", "3", "9", "1"])).await;

        let mut source = FeedSource::new(FetchSettings::for_local_testing()).unwrap();
        source.set_feed_url(format!("{}/feed", server.uri()));

        let entries = source.fetch(2).await.unwrap();
        assert_eq!(ids(&entries), ["5", "3"]);

        let entries = source.fetch(NO_LIMIT).await.unwrap();
        assert_eq!(ids(&entries), ["5", "3", "9", "1"]);
    }

    #[tokio::test]
    async fn test_multiple_urls_concatenate_in_order() {
        let server = MockServer::start().await;
        serve(&server, "/a", rss_with_items("A", &["a1", "a2"])).await;
        serve(&server, "/b", rss_with_items("B", &["b1"])).await;

        let mut source = FeedSource::new(FetchSettings::for_local_testing()).unwrap();
        source.configure([format!("{}/a", server.uri()), format!("{}/b", server.uri())]);

        let entries = source.fetch(NO_LIMIT).await.unwrap();
        assert_eq!(ids(&entries), ["a1", "a2", "b1"]);
        assert_eq!(entries[0].feed().title.as_deref(), Some("A"));
        assert_eq!(entries[2].feed().title.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_limit_reached_skips_remaining_urls() {
        let server = MockServer::start().await;
        serve(&server, "/a", rss_with_items("A", &["a1", "a2"])).await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut source = FeedSource::new(FetchSettings::for_local_testing()).unwrap();
        source.configure([format!("{}/a", server.uri()), format!("{}/b", server.uri())]);

        let entries = source.fetch(2).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_feed_is_success_not_error() {
        let server = MockServer::start().await;
        serve(&server, "/feed", rss_with_items("Empty", &[])).await;

        let mut source = FeedSource::new(FetchSettings::for_local_testing()).unwrap();
        source.set_feed_url(format!("{}/feed", server.uri()));

        assert!(source.fetch(NO_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_feed_reports_url_and_parse_failure() {
        let server = MockServer::start().await;
        serve(&server, "/feed", "<not valid xml".to_string()).await;

        let url = format!("{}/feed", server.uri());
        let mut source = FeedSource::new(FetchSettings::for_local_testing()).unwrap();
        source.set_feed_url(url.clone());

        let err = source.fetch(NO_LIMIT).await.unwrap_err();
        assert_eq!(err.url, url);
        assert!(matches!(err.failure, FetchFailure::Parse(_)));
    }

    #[tokio::test]
    async fn test_set_timeout_bounds_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_with_items("Slow", &["1"]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut source = FeedSource::new(FetchSettings::for_local_testing()).unwrap();
        source
            .set_feed_url(format!("{}/feed", server.uri()))
            .set_timeout(Duration::from_millis(200));

        let err = source.fetch(NO_LIMIT).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(source.settings().timeout, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_private_host_refused_by_default() {
        let mut source = FeedSource::new(FetchSettings::default()).unwrap();
        source.set_feed_url("http://127.0.0.1:9/feed");

        let err = source.fetch(NO_LIMIT).await.unwrap_err();
        assert!(matches!(err.failure, FetchFailure::InvalidUrl(_)));
    }
}
