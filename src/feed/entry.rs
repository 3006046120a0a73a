use feed_rs::model::{Entry, Feed, Link, Text};
use feed_rs::parser;
use serde::{Deserialize, Serialize};

/// Channel-level metadata shared by every entry of one fetched feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// One entry as published by the source, plus the metadata of its feed.
///
/// Entries are never mutated once parsed. Every accessor is optional: an
/// absent value is `None`, never a placeholder, so callers can tell "the feed
/// did not say" apart from real content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    authors: Vec<String>,
    published: Option<String>,
    feed: FeedMetadata,
}

impl RawEntry {
    /// Creates an entry with the given identifier and nothing else.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Creates an entry that carries no identifier at all.
    pub fn without_id() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    /// Sets the publication timestamp text (RFC 3339 or RFC 2822).
    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = Some(published.into());
        self
    }

    pub fn with_feed(mut self, feed: FeedMetadata) -> Self {
        self.feed = feed;
        self
    }

    /// The identifier published by the source, trimmed.
    ///
    /// Returns `None` when the source gave none or only whitespace.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    /// Raw publication timestamp. Normalization happens in the document builder.
    pub fn published(&self) -> Option<&str> {
        self.published.as_deref()
    }

    pub fn feed(&self) -> &FeedMetadata {
        &self.feed
    }
}

/// Result of parsing one feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub metadata: FeedMetadata,
    /// Entries in the order the document lists them.
    pub entries: Vec<RawEntry>,
}

/// Parses RSS/Atom/JSON Feed bytes into entries, preserving document order.
///
/// The parser's fallback id generation is disabled: an entry without an id in
/// the document comes out with `id() == None`.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::Builder::new()
        .id_generator(|_links: &[Link], _title: &Option<Text>, _uri: Option<&str>| String::new())
        .build()
        .parse(bytes)?;

    let metadata = feed_metadata(&feed);
    let entries = feed
        .entries
        .into_iter()
        .map(|entry| raw_entry(entry, &metadata))
        .collect();

    Ok(ParsedFeed { metadata, entries })
}

fn feed_metadata(feed: &Feed) -> FeedMetadata {
    FeedMetadata {
        title: feed.title.as_ref().map(|t| t.content.clone()),
        description: feed.description.as_ref().map(|t| t.content.clone()),
        link: preferred_link(&feed.links),
    }
}

fn raw_entry(entry: Entry, feed: &FeedMetadata) -> RawEntry {
    let link = preferred_link(&entry.links);
    let published = entry.published.or(entry.updated).map(|dt| dt.to_rfc3339());
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body));
    let authors = entry
        .authors
        .into_iter()
        .map(|person| person.name)
        .filter(|name| !name.trim().is_empty())
        .collect();

    RawEntry {
        id: Some(entry.id).filter(|id| !id.is_empty()),
        title: entry.title.map(|t| t.content),
        link,
        description,
        authors,
        published,
        feed: feed.clone(),
    }
}

/// Picks the `alternate` link when one is marked, else the first link.
fn preferred_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}
