//! Source adapters: one external payload shape in, one `NormalizedCandidate` out.
//!
//! Adapters are the only place that knows about source-specific field names,
//! vocabularies and date formats.

pub mod gov;
pub mod rcl;
pub mod sejm;

use crate::classify::Classifier;
use crate::error::{Error, Result};
use crate::schema::{NormalizedCandidate, SourceKind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::macros::format_description;
use time::Date;
use tracing::debug;

pub use gov::GovAdapter;
pub use rcl::RclAdapter;
pub use sejm::SejmAdapter;

pub trait SourceAdapter {
    fn source(&self) -> SourceKind;

    /// Malformed payloads come back as `Error::Payload` and cost only this record.
    fn to_candidate(&self, raw: &Value) -> Result<NormalizedCandidate>;
}

pub fn for_source(source: SourceKind, classifier: Classifier) -> Box<dyn SourceAdapter> {
    match source {
        SourceKind::Gov => Box::new(GovAdapter::new(classifier)),
        SourceKind::Rcl => Box::new(RclAdapter::new(classifier)),
        SourceKind::Sejm => Box::new(SejmAdapter::new(classifier)),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(source: SourceKind, raw: &Value) -> Result<T> {
    T::deserialize(raw).map_err(|e| Error::payload(source, e.to_string()))
}

/// Trimmed, `None` when blank.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// ISO `YYYY-MM-DD` from the date formats the sources use (ISO, ISO datetime,
/// Polish `DD.MM.YYYY`). Anything else is dropped.
pub(crate) fn parse_date(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let iso = format_description!("[year]-[month]-[day]");
    let polish = format_description!("[day].[month].[year]");

    let head = raw.get(..10).unwrap_or(raw);
    let date = Date::parse(head, iso)
        .or_else(|_| Date::parse(raw, polish))
        .ok();

    match date.and_then(|d| d.format(iso).ok()) {
        Some(formatted) => Some(formatted),
        None => {
            debug!(raw, "Dropping unparseable date");
            None
        }
    }
}

/// Media type guessed from the URL's file extension.
pub(crate) fn media_type_for(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let media_type = match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "odt" => "application/vnd.oasis.opendocument.text",
        "rtf" => "application/rtf",
        "zip" => "application/zip",
        "html" | "htm" => "text/html",
        _ => return None,
    };
    Some(media_type.to_string())
}

pub(crate) fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_in_known_formats_become_iso() {
        assert_eq!(parse_date(Some("2025-03-01")), Some("2025-03-01".into()));
        assert_eq!(parse_date(Some("2025-03-01T10:15:00")), Some("2025-03-01".into()));
        assert_eq!(parse_date(Some("01.03.2025")), Some("2025-03-01".into()));
        assert_eq!(parse_date(Some("marzec 2025")), None);
        assert_eq!(parse_date(Some(" ")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn media_types_follow_extension() {
        assert_eq!(
            media_type_for("https://legislacja.gov.pl/docs/2/123/projekt.PDF?x=1").as_deref(),
            Some("application/pdf")
        );
        assert!(media_type_for("https://legislacja.gov.pl/projekt/123").is_none());
    }
}
