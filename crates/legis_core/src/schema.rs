use crate::error::{Error, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type DocumentId = i64;
pub type EventId = i64;

/// Closed string-backed enums stored as TEXT columns.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("unknown {}: {value}", stringify!($name))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Gov,  // government legislative work-plan registry
    Rcl,  // legislative-coordination portal
    Sejm, // parliamentary API
}

text_enum!(SourceKind { Gov => "gov", Rcl => "rcl", Sejm => "sejm" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Registry,
    Rcl,
    Sejm,
}

text_enum!(KeyKind { Registry => "registry", Rcl => "rcl", Sejm => "sejm" });

impl KeyKind {
    pub fn column(&self) -> &'static str {
        match self {
            KeyKind::Registry => "registry_number",
            KeyKind::Rcl => "rcl_number",
            KeyKind::Sejm => "sejm_number",
        }
    }
}

/// Source-issued identifier treated as proof of identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalKey {
    pub kind: KeyKind,
    pub value: String,
}

impl ExternalKey {
    pub fn new(kind: KeyKind, raw: &str) -> Self {
        Self {
            kind,
            value: normalize_key(raw),
        }
    }

    /// None when the raw value is blank.
    pub fn parse(kind: KeyKind, raw: &str) -> Option<Self> {
        let key = Self::new(kind, raw);
        (!key.value.is_empty()).then_some(key)
    }
}

/// "ud 123 " and "UD123" name the same registry entry.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Act,
    Regulation,
    Resolution,
    Other,
}

text_enum!(DocumentType {
    Act => "act",
    Regulation => "regulation",
    Resolution => "resolution",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Ministry,
    Government,
    Parliament,
}

text_enum!(Level {
    Ministry => "ministry",
    Government => "government",
    Parliament => "parliament",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Planned,
    Drafting,
    Consultation,
    Adopted,
    InParliament,
    Enacted,
    Rejected,
    Withdrawn,
}

text_enum!(Status {
    Planned => "planned",
    Drafting => "drafting",
    Consultation => "consultation",
    Adopted => "adopted",
    InParliament => "in_parliament",
    Enacted => "enacted",
    Rejected => "rejected",
    Withdrawn => "withdrawn",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Completed,
    InProgress,
    Pending,
}

text_enum!(EventStatus {
    Completed => "completed",
    InProgress => "in_progress",
    Pending => "pending",
});

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateAttachment {
    pub name: String,
    pub url: String,
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateEvent {
    pub date: Option<String>, // YYYY-MM-DD
    pub stage: String,
    pub description: Option<String>,
    pub status: EventStatus,
    #[serde(default)]
    pub attachments: Vec<CandidateAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateLink {
    pub url: String,
    pub description: Option<String>,
}

/// Common shape every source adapter produces.
///
/// Dictionary lists are `None` when the source does not supply that category at all;
/// `Some` replaces the stored associations wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedCandidate {
    pub source: SourceKind,
    pub source_id: String,
    pub title: String,
    pub strong_key: Option<ExternalKey>,
    pub registry_number: Option<String>,
    #[serde(default)]
    pub linked_keys: Vec<ExternalKey>,
    pub status: Status,
    pub doc_type: DocumentType,
    pub level: Option<Level>,
    pub summary: Option<String>,
    pub tag_names: Option<Vec<String>>,
    pub sector_names: Option<Vec<String>>,
    pub stakeholder_names: Option<Vec<String>>,
    #[serde(default)]
    pub timeline_events: Vec<CandidateEvent>,
    #[serde(default)]
    pub links: Vec<CandidateLink>,
}

impl NormalizedCandidate {
    /// Minimal record; adapters fill in the rest.
    pub fn new(source: SourceKind, source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source,
            source_id: source_id.into(),
            title: title.into(),
            strong_key: None,
            registry_number: None,
            linked_keys: Vec::new(),
            status: Status::Planned,
            doc_type: DocumentType::Other,
            level: None,
            summary: None,
            tag_names: None,
            sector_names: None,
            stakeholder_names: None,
            timeline_events: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Every strong key the record carries, in lookup order.
    pub fn identity_keys(&self) -> Vec<ExternalKey> {
        let mut keys = Vec::new();
        if let Some(key) = &self.strong_key {
            keys.push(key.clone());
        }
        if let Some(key) = self
            .registry_number
            .as_deref()
            .and_then(|raw| ExternalKey::parse(KeyKind::Registry, raw))
        {
            keys.push(key);
        }
        keys.extend(self.linked_keys.iter().cloned());

        let mut seen = Vec::new();
        keys.retain(|key| {
            if seen.contains(key) {
                false
            } else {
                seen.push(key.clone());
                true
            }
        });
        keys
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| Err(Error::contract(self.source, &self.source_id, reason));

        if self.source_id.trim().is_empty() {
            return fail("missing source identifier");
        }
        if self.title.trim().is_empty() {
            return fail("missing title");
        }
        if self
            .strong_key
            .as_ref()
            .is_some_and(|key| key.value.trim().is_empty())
        {
            return fail("blank strong key");
        }
        for event in &self.timeline_events {
            if event.stage.trim().is_empty() {
                return fail("timeline event without stage label");
            }
            if event.attachments.iter().any(|a| a.url.trim().is_empty()) {
                return fail("attachment without url");
            }
        }
        if self.links.iter().any(|link| link.url.trim().is_empty()) {
            return fail("external link without url");
        }
        Ok(())
    }
}

/// Canonical stored document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    pub id: DocumentId,
    pub registry_number: Option<String>,
    pub rcl_number: Option<String>,
    pub sejm_number: Option<String>,
    pub title: String,
    pub doc_type: DocumentType,
    pub level: Option<Level>,
    pub status: Status,
    pub summary: Option<String>,
    pub last_source: SourceKind,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn key(&self, kind: KeyKind) -> Option<&str> {
        match kind {
            KeyKind::Registry => self.registry_number.as_deref(),
            KeyKind::Rcl => self.rcl_number.as_deref(),
            KeyKind::Sejm => self.sejm_number.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Strong,
    Fuzzy,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionResult {
    pub matched_document_id: Option<DocumentId>,
    pub confidence: Confidence,
    pub matched_by: Option<KeyKind>,
    pub distance: Option<usize>,
    /// Several candidates tied at the minimum distance; first-seen won.
    pub ambiguous: bool,
}

impl ResolutionResult {
    pub fn none() -> Self {
        Self {
            matched_document_id: None,
            confidence: Confidence::None,
            matched_by: None,
            distance: None,
            ambiguous: false,
        }
    }

    pub fn strong(document_id: DocumentId, kind: KeyKind) -> Self {
        Self {
            matched_document_id: Some(document_id),
            confidence: Confidence::Strong,
            matched_by: Some(kind),
            distance: None,
            ambiguous: false,
        }
    }

    pub fn fuzzy(document_id: DocumentId, distance: usize, ambiguous: bool) -> Self {
        Self {
            matched_document_id: Some(document_id),
            confidence: Confidence::Fuzzy,
            matched_by: None,
            distance: Some(distance),
            ambiguous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_values_are_canonicalized() {
        assert_eq!(ExternalKey::new(KeyKind::Registry, " ud 123 ").value, "UD123");
        assert!(ExternalKey::parse(KeyKind::Rcl, "   ").is_none());
    }

    #[test]
    fn identity_keys_follow_lookup_order_without_repeats() {
        let mut c = NormalizedCandidate::new(SourceKind::Rcl, "r1", "Projekt");
        c.strong_key = Some(ExternalKey::new(KeyKind::Rcl, "RM-1"));
        c.registry_number = Some("ud7".into());
        c.linked_keys = vec![ExternalKey::new(KeyKind::Registry, "UD7")];

        let keys = c.identity_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].kind, KeyKind::Rcl);
        assert_eq!(keys[1].value, "UD7");
    }

    #[test]
    fn blank_title_is_a_contract_error() {
        let c = NormalizedCandidate::new(SourceKind::Gov, "UD1", "  ");
        let err = c.validate().unwrap_err();
        assert!(err.is_record_scoped());
        assert!(err.to_string().contains("UD1"));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), *status);
        }
    }
}
