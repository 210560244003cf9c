//! Report and section models.
//!
//! A [`Report`] is assembled once per session from the sections returned by
//! independent producers and is never mutated afterwards. Each producer
//! returns a [`Section`]: either the data it gathered or the reason it could
//! not gather it. Both shapes serialize into the same JSON mapping so the
//! collector always receives a stable report layout.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Report fields that carry metadata and can never be used as section names.
pub const RESERVED_FIELDS: [&str; 3] = ["timestamp", "url", "referrer"];

/// Result of a single best-effort producer.
///
/// Producers never fail outright. A producer that cannot read its data
/// returns [`Section::Unavailable`], which serializes as `{"error": reason}`
/// in place of the data.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Data gathered by the producer.
    Available(Value),
    /// Why the producer could not gather its data.
    Unavailable(String),
}

impl Section {
    /// An empty mapping, used for producers disabled by configuration.
    pub fn empty() -> Self {
        Self::Available(Value::Object(Map::new()))
    }

    /// Creates an unavailable section with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Returns `true` when the producer gathered data.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Returns `true` for an available section holding an empty mapping.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Available(Value::Object(map)) if map.is_empty())
    }

    /// Returns the gathered data, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    /// Returns the failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }
}

impl From<Value> for Section {
    fn from(value: Value) -> Self {
        Self::Available(value)
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Available(value) => value.serialize(serializer),
            Self::Unavailable(reason) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", reason)?;
                map.end()
            },
        }
    }
}

/// Page metadata attached to every report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageContext {
    /// Location the report describes.
    pub url: String,
    /// Location that led to `url`, empty when unknown.
    pub referrer: String,
}

impl PageContext {
    /// Creates a page context from explicit values.
    pub fn new(url: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self { url: url.into(), referrer: referrer.into() }
    }

    /// Describes the current working directory as a `file://` location.
    pub fn from_current_dir() -> Self {
        let url = std::env::current_dir()
            .map(|dir| format!("file://{}", dir.display()))
            .unwrap_or_else(|_| "file://unknown".to_string());
        Self { url, referrer: String::new() }
    }
}

/// Immutable snapshot of the environment, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    sections: BTreeMap<String, Section>,
    timestamp: DateTime<Utc>,
    context: PageContext,
}

impl Report {
    /// Starts building a report stamped with `timestamp`.
    pub fn builder(timestamp: DateTime<Utc>, context: PageContext) -> ReportBuilder {
        ReportBuilder { sections: BTreeMap::new(), timestamp, context }
    }

    /// Looks up a section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Iterates sections in name order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(name, section)| (name.as_str(), section))
    }

    /// Number of sections, excluding metadata fields.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Time the report was assembled.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// ISO-8601 form of the timestamp with millisecond precision.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Location the report describes.
    pub fn url(&self) -> &str {
        &self.context.url
    }

    /// Referring location, empty when unknown.
    pub fn referrer(&self) -> &str {
        &self.context.referrer
    }

    /// Serializes the report into its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if a section cannot be encoded.
    pub fn to_json_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Converts the report into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if a section cannot be encoded.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len() + RESERVED_FIELDS.len()))?;
        for (name, section) in &self.sections {
            map.serialize_entry(name, section)?;
        }
        map.serialize_entry("timestamp", &self.timestamp_iso())?;
        map.serialize_entry("url", &self.context.url)?;
        map.serialize_entry("referrer", &self.context.referrer)?;
        map.end()
    }
}

/// Accumulates sections before freezing them into a [`Report`].
#[derive(Debug)]
pub struct ReportBuilder {
    sections: BTreeMap<String, Section>,
    timestamp: DateTime<Utc>,
    context: PageContext,
}

impl ReportBuilder {
    /// Adds a named section.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ReservedSection` for metadata field names and
    /// `CoreError::DuplicateSection` if the name was already added.
    pub fn section(mut self, name: impl Into<String>, section: Section) -> Result<Self> {
        let name = name.into();
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return Err(CoreError::ReservedSection(name));
        }
        if self.sections.contains_key(&name) {
            return Err(CoreError::DuplicateSection(name));
        }
        self.sections.insert(name, section);
        Ok(self)
    }

    /// Freezes the report.
    pub fn build(self) -> Report {
        Report { sections: self.sections, timestamp: self.timestamp, context: self.context }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn unavailable_section_serializes_as_error_field() {
        let section = Section::unavailable("Storage API not supported");
        let value = serde_json::to_value(&section).unwrap();
        assert_eq!(value, json!({"error": "Storage API not supported"}));
    }

    #[test]
    fn empty_section_is_available_and_empty() {
        let section = Section::empty();
        assert!(section.is_available());
        assert!(section.is_empty());
        assert_eq!(serde_json::to_value(&section).unwrap(), json!({}));
    }

    #[test]
    fn report_flattens_sections_next_to_metadata() {
        let report = Report::builder(fixed_time(), PageContext::new("file:///srv", ""))
            .section("ip", Section::Available(json!("203.0.113.7")))
            .unwrap()
            .section("hardware", Section::unavailable("probe failed"))
            .unwrap()
            .build();

        let value = report.to_value().unwrap();
        assert_eq!(
            value,
            json!({
                "ip": "203.0.113.7",
                "hardware": {"error": "probe failed"},
                "timestamp": "2024-03-01T12:30:00.000Z",
                "url": "file:///srv",
                "referrer": "",
            })
        );
    }

    #[test]
    fn builder_rejects_duplicate_and_reserved_names() {
        let builder = Report::builder(fixed_time(), PageContext::default())
            .section("device", Section::empty())
            .unwrap();

        let duplicate = builder.section("device", Section::empty()).unwrap_err();
        assert_eq!(duplicate, CoreError::DuplicateSection("device".to_string()));

        let reserved = Report::builder(fixed_time(), PageContext::default())
            .section("timestamp", Section::empty())
            .unwrap_err();
        assert_eq!(reserved, CoreError::ReservedSection("timestamp".to_string()));
    }
}
