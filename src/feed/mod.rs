//! Feed source adapter for RSS/Atom feeds.
//!
//! - [`entry`] - entry model and parsing via the `feed-rs` crate
//! - [`fetcher`] - HTTP retrieval with timeout, retries and size limits
//! - [`source`] - [`FeedSource`], the configure/fetch adapter the pipeline calls
//!
//! ```ignore
//! let mut source = FeedSource::new(FetchSettings::default())?;
//! source.set_feed_url("https://example.com/feed.xml");
//! let entries = source.fetch(50).await?;
//! ```

mod entry;
mod fetcher;
mod source;

pub use entry::{parse_feed, FeedMetadata, ParsedFeed, RawEntry};
pub use fetcher::{FetchError, FetchFailure};
pub use source::{FeedSource, FetchSettings, NO_LIMIT};
