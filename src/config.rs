//! Configuration file parser for the feed collection (TOML).
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchSettings;
use crate::pipeline::{PipelineConfig, DEFAULT_LIMIT};
use crate::util::HostPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// `url` accepts a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FeedUrls {
    One(String),
    Many(Vec<String>),
}

impl Default for FeedUrls {
    fn default() -> Self {
        FeedUrls::Many(Vec::new())
    }
}

impl FeedUrls {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            FeedUrls::One(url) => vec![url.clone()],
            FeedUrls::Many(urls) => urls.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FeedUrls::One(url) => url.trim().is_empty(),
            FeedUrls::Many(urls) => urls.is_empty(),
        }
    }
}

/// Collection configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed URL, or list of feed URLs fetched in order.
    pub url: FeedUrls,

    /// Entries per scheduling pass. 0 = everything the feed publishes.
    pub limit: usize,

    /// Fetch timeout in seconds.
    #[serde(alias = "timeout_secs")]
    pub timeout: u64,

    /// Retries for rate-limited, failing or truncated responses.
    pub max_retries: u32,

    /// Largest feed document accepted, in bytes.
    pub max_feed_bytes: usize,

    /// Allow feeds on localhost and private networks.
    pub allow_private_hosts: bool,

    pub user_agent: String,

    /// Concurrent consumers draining the queue.
    pub consumers: usize,

    /// SQLite file shared between producer and consumer processes.
    pub store_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            url: FeedUrls::default(),
            limit: DEFAULT_LIMIT,
            timeout: fetch.timeout.as_secs(),
            max_retries: fetch.max_retries,
            max_feed_bytes: fetch.max_feed_bytes,
            allow_private_hosts: false,
            user_agent: fetch.user_agent,
            consumers: 4,
            store_path: None,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "url",
        "limit",
        "timeout",
        "timeout_secs",
        "max_retries",
        "max_feed_bytes",
        "allow_private_hosts",
        "user_agent",
        "consumers",
        "store_path",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a huge or corrupted file
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(urls = ?config.url, limit = config.limit, "Loaded configuration");
        Ok(config)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig { limit: self.limit }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.max_retries,
            max_feed_bytes: self.max_feed_bytes,
            host_policy: if self.allow_private_hosts {
                HostPolicy::AllowPrivate
            } else {
                HostPolicy::PublicOnly
            },
            user_agent: self.user_agent.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("feedindex_config_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.url.is_empty());
        assert_eq!(config.limit, 50);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.max_retries, 3);
        assert!(!config.allow_private_hosts);
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedindex_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = temp_config("whitespace", "   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        cleanup(&path);
    }

    #[test]
    fn test_single_url_string() {
        let config = Config::parse("url = \"https://example.com/feed.xml\"\n").unwrap();
        assert_eq!(config.url.to_vec(), ["https://example.com/feed.xml"]);
        assert_eq!(config.limit, 50); // default
    }

    #[test]
    fn test_url_list_and_overrides() {
        let path = temp_config(
            "full",
            r#"
url = ["https://a.example.com/rss", "https://b.example.com/atom"]
limit = 0
timeout = 5
max_retries = 1
allow_private_hosts = true
consumers = 8
store_path = "/var/lib/feedindex/entries.db"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.url.to_vec(),
            ["https://a.example.com/rss", "https://b.example.com/atom"]
        );
        assert_eq!(config.pipeline(), PipelineConfig { limit: 0 });

        let fetch = config.fetch_settings();
        assert_eq!(fetch.timeout, Duration::from_secs(5));
        assert_eq!(fetch.max_retries, 1);
        assert_eq!(fetch.host_policy, HostPolicy::AllowPrivate);
        assert_eq!(config.consumers, 8);
        assert_eq!(config.store_path.as_deref(), Some("/var/lib/feedindex/entries.db"));

        cleanup(&path);
    }

    #[test]
    fn test_timeout_key_sets_fetch_timeout() {
        let config = Config::parse("url = \"https://example.com/feed\"\ntimeout = 5\n").unwrap();
        assert_eq!(config.timeout, 5);
        assert_eq!(config.fetch_settings().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_secs_still_accepted() {
        let config = Config::parse("timeout_secs = 12\n").unwrap();
        assert_eq!(config.fetch_settings().timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("limit = \"fifty\"\n").is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("limit = 3\ntotally_fake_key = true\n").unwrap();
        assert_eq!(config.limit, 3);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = temp_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }
}
