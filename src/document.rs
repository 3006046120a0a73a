//! Document builder: maps a feed entry onto the index schema.
//!
//! The schema is a fixed table of [`FieldKey`]s. Each key has a stable
//! internal name and the external name the index store expects; some
//! external names (`source-link`, `item-subject`) are not valid identifiers,
//! which is why the two are kept apart. [`IndexDocument::set`] records both
//! in one step.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

use crate::feed::{FeedMetadata, RawEntry};

/// Fixed output format for the `date` field.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Fields of an index document, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Source,
    Subject,
    SourceLink,
    Title,
    Link,
    Description,
    Creator,
    Date,
    ItemSubject,
}

impl FieldKey {
    pub const ALL: [FieldKey; 9] = [
        FieldKey::Source,
        FieldKey::Subject,
        FieldKey::SourceLink,
        FieldKey::Title,
        FieldKey::Link,
        FieldKey::Description,
        FieldKey::Creator,
        FieldKey::Date,
        FieldKey::ItemSubject,
    ];

    /// Name used inside this crate.
    pub fn internal_name(self) -> &'static str {
        match self {
            FieldKey::Source => "source",
            FieldKey::Subject => "subject",
            FieldKey::SourceLink => "source_link",
            FieldKey::Title => "title",
            FieldKey::Link => "link",
            FieldKey::Description => "description",
            FieldKey::Creator => "creator",
            FieldKey::Date => "date",
            FieldKey::ItemSubject => "item_subject",
        }
    }

    /// Name the index store's schema expects.
    pub fn external_name(self) -> &'static str {
        match self {
            FieldKey::SourceLink => "source-link",
            FieldKey::ItemSubject => "item-subject",
            other => other.internal_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::List(items) => items.serialize(serializer),
            FieldValue::Timestamp(ts) => {
                serializer.collect_str(&ts.format(DATE_FORMAT))
            }
        }
    }
}

/// One document field: its key, its external name and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: FieldKey,
    pub name: &'static str,
    pub value: FieldValue,
}

/// A finished document, fields kept in schema order.
///
/// Serializes as a JSON object keyed by external field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDocument {
    fields: Vec<Field>,
}

impl IndexDocument {
    /// Assigns `value` to `key` under the key's external name.
    pub fn set(&mut self, key: FieldKey, value: FieldValue) {
        let field = Field {
            key,
            name: key.external_name(),
            value,
        };
        match self.fields.iter_mut().find(|f| f.key == key) {
            Some(existing) => *existing = field,
            None => {
                let at = self
                    .fields
                    .iter()
                    .position(|f| schema_position(f.key) > schema_position(key))
                    .unwrap_or(self.fields.len());
                self.fields.insert(at, field);
            }
        }
    }

    pub fn get(&self, key: FieldKey) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    /// Looks a field up by its external name.
    pub fn get_by_name(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn schema_position(key: FieldKey) -> usize {
    FieldKey::ALL
        .iter()
        .position(|k| *k == key)
        .unwrap_or(FieldKey::ALL.len())
}

impl Serialize for IndexDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(field.name, &field.value)?;
        }
        map.end()
    }
}

/// An entry's publication date could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unparseable publication date {raw:?}")]
pub struct MalformedDateError {
    pub raw: String,
}

/// Output of [`build`]: the document, plus a date problem if there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDocument {
    pub document: IndexDocument,
    /// Set when the entry had a date that could not be parsed; the `date`
    /// field is then absent but the document is still complete otherwise.
    pub date_error: Option<MalformedDateError>,
}

/// Parses an RFC 3339 or RFC 2822 timestamp and converts it to UTC.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, MalformedDateError> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_rfc2822(trimmed))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MalformedDateError {
            raw: raw.to_string(),
        })
}

/// Formats a timestamp as `YYYY-MM-DDThh:mm:ssZ`.
pub fn format_date(ts: &DateTime<Utc>) -> String {
    ts.format(DATE_FORMAT).to_string()
}

/// Builds the index document for `entry` from its feed's metadata.
///
/// Pure: the same inputs always give the same document. Absent strings
/// become empty strings and an absent author list an empty list, so every
/// schema field is present except `date`, which is left out when the entry
/// has no date or an unparseable one.
pub fn build(feed: &FeedMetadata, entry: &RawEntry) -> BuiltDocument {
    let text = |value: Option<&str>| FieldValue::Text(value.unwrap_or_default().to_string());
    let feed_link = feed.link.as_deref();

    let mut document = IndexDocument::default();
    document.set(FieldKey::Source, text(feed.title.as_deref()));
    document.set(FieldKey::Subject, text(feed.description.as_deref()));
    document.set(FieldKey::SourceLink, text(feed_link));
    document.set(FieldKey::Title, text(entry.title()));
    document.set(FieldKey::Link, text(entry.link()));
    document.set(FieldKey::Description, text(entry.description()));
    document.set(FieldKey::Creator, FieldValue::List(entry.authors().to_vec()));

    let mut date_error = None;
    if let Some(raw) = entry.published() {
        match parse_date(raw) {
            Ok(ts) => document.set(FieldKey::Date, FieldValue::Timestamp(ts)),
            Err(e) => date_error = Some(e),
        }
    }

    // Kept for schema compatibility: duplicates source-link
    document.set(FieldKey::ItemSubject, text(feed_link));

    BuiltDocument {
        document,
        date_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed() -> FeedMetadata {
        FeedMetadata {
            title: Some("Example News".into()),
            description: Some("All the news".into()),
            link: Some("https://example.com/".into()),
        }
    }

    fn entry() -> RawEntry {
        RawEntry::new("abc123")
            .with_title("Hello")
            .with_link("http://x/1")
            .with_description("Body")
            .with_author("Jane")
            .with_published("2024-01-01T00:00:00Z")
    }

    #[test]
    fn test_entry_fields_round_trip() {
        let built = build(&feed(), &entry());
        let doc = &built.document;

        assert_eq!(doc.get(FieldKey::Title).and_then(FieldValue::as_text), Some("Hello"));
        assert_eq!(doc.get(FieldKey::Link).and_then(FieldValue::as_text), Some("http://x/1"));
        assert_eq!(
            doc.get(FieldKey::Creator).and_then(FieldValue::as_list),
            Some(&["Jane".to_string()][..])
        );
        let json = serde_json::to_value(doc).unwrap();
        assert_eq!(json["date"], "2024-01-01T00:00:00Z");
        assert!(built.date_error.is_none());
    }

    #[test]
    fn test_feed_fields_and_hyphenated_names() {
        let doc = build(&feed(), &entry()).document;

        assert_eq!(
            doc.names().collect::<Vec<_>>(),
            [
                "source",
                "subject",
                "source-link",
                "title",
                "link",
                "description",
                "creator",
                "date",
                "item-subject"
            ]
        );
        assert_eq!(
            doc.get_by_name("source-link").and_then(FieldValue::as_text),
            Some("https://example.com/")
        );
        assert_eq!(
            doc.get_by_name("item-subject").and_then(FieldValue::as_text),
            Some("https://example.com/")
        );
        assert_eq!(doc.get_by_name("source").and_then(FieldValue::as_text), Some("Example News"));
        assert_eq!(doc.get_by_name("subject").and_then(FieldValue::as_text), Some("All the news"));
        assert!(doc.get_by_name("source_link").is_none());
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = serde_json::to_vec(&build(&feed(), &entry()).document).unwrap();
        let second = serde_json::to_vec(&build(&feed(), &entry()).document).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_json_output_in_schema_order() {
        let json = serde_json::to_string(&build(&feed(), &entry()).document).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"source":"Example News","subject":"All the news","source-link":"https://example.com/","#,
                r#""title":"Hello","link":"http://x/1","description":"Body","creator":["Jane"],"#,
                r#""date":"2024-01-01T00:00:00Z","item-subject":"https://example.com/"}"#
            )
        );
    }

    #[test]
    fn test_missing_date_omits_field() {
        let doc = build(&feed(), &RawEntry::new("x")).document;
        assert!(doc.get(FieldKey::Date).is_none());
        assert_eq!(doc.len(), FieldKey::ALL.len() - 1);
    }

    #[test]
    fn test_malformed_date_omits_field_and_reports() {
        let built = build(&feed(), &RawEntry::new("x").with_published("not-a-real-date"));
        assert!(built.document.get(FieldKey::Date).is_none());
        assert_eq!(
            built.date_error,
            Some(MalformedDateError {
                raw: "not-a-real-date".into()
            })
        );
        // Everything else is still there
        assert!(built.document.get(FieldKey::Title).is_some());
    }

    #[test]
    fn test_rfc2822_and_offsets_normalized_to_utc() {
        let ts = parse_date("Tue, 02 Jan 2024 12:00:00 +0200").unwrap();
        assert_eq!(format_date(&ts), "2024-01-02T10:00:00Z");

        let ts = parse_date("2024-03-10T23:30:15.250-01:00").unwrap();
        assert_eq!(format_date(&ts), "2024-03-11T00:30:15Z");
    }

    #[test]
    fn test_absent_values_become_empty() {
        let doc = build(&FeedMetadata::default(), &RawEntry::new("x")).document;
        assert_eq!(doc.get(FieldKey::Source).and_then(FieldValue::as_text), Some(""));
        assert_eq!(doc.get(FieldKey::Title).and_then(FieldValue::as_text), Some(""));
        assert_eq!(doc.get(FieldKey::Creator).and_then(FieldValue::as_list), Some(&[][..]));
    }

    #[test]
    fn test_set_replaces_and_keeps_schema_order() {
        let mut doc = IndexDocument::default();
        doc.set(FieldKey::ItemSubject, FieldValue::Text("z".into()));
        doc.set(FieldKey::Source, FieldValue::Text("a".into()));
        doc.set(FieldKey::Source, FieldValue::Text("b".into()));

        assert_eq!(doc.names().collect::<Vec<_>>(), ["source", "item-subject"]);
        assert_eq!(doc.get(FieldKey::Source).and_then(FieldValue::as_text), Some("b"));
    }

    #[test]
    fn test_external_names_differ_only_where_needed() {
        for key in FieldKey::ALL {
            let renamed = key.internal_name() != key.external_name();
            assert_eq!(
                renamed,
                matches!(key, FieldKey::SourceLink | FieldKey::ItemSubject),
                "{:?}",
                key
            );
        }
    }
}
