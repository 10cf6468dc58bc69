//! Government legislative work-plan registry ("wykaz prac legislacyjnych").

use super::{clean, decode, non_empty, parse_date, SourceAdapter};
use crate::classify::{first_match, Classifier, Rule};
use crate::error::{Error, Result};
use crate::schema::{
    CandidateEvent, CandidateLink, EventStatus, ExternalKey, KeyKind, Level, NormalizedCandidate,
    SourceKind, Status,
};
use serde::Deserialize;
use serde_json::Value;

pub const REGISTRY_STAGE: &str = "Wpis do wykazu prac legislacyjnych";

#[derive(Debug, Deserialize)]
struct WorkPlanEntry {
    numer_projektu: String,
    tytul: String,
    rodzaj: Option<String>,
    istota: Option<String>,
    organ: Option<String>,
    status: Option<String>,
    data_wpisu: Option<String>,
    url: Option<String>,
}

pub struct GovAdapter {
    classifier: Classifier,
    status_rules: Vec<Rule<Status>>,
}

impl GovAdapter {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            status_rules: vec![
                Rule::new(&["wycofan"], Status::Withdrawn),
                Rule::new(&["uchwalon", "opublikowan"], Status::Enacted),
                Rule::new(&["sejm"], Status::InParliament),
                Rule::new(&["przyjęt"], Status::Adopted),
                Rule::new(&["konsultac", "uzgodnie", "opiniowan"], Status::Consultation),
                Rule::new(&["przygotowaniu", "opracowan"], Status::Drafting),
            ],
        }
    }
}

impl SourceAdapter for GovAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Gov
    }

    fn to_candidate(&self, raw: &Value) -> Result<NormalizedCandidate> {
        let entry: WorkPlanEntry = decode(SourceKind::Gov, raw)?;

        let key = ExternalKey::parse(KeyKind::Registry, &entry.numer_projektu)
            .ok_or_else(|| Error::payload(SourceKind::Gov, "empty numer_projektu"))?;

        let summary = clean(entry.istota.as_deref());
        let type_hint = format!(
            "{} {}",
            entry.rodzaj.as_deref().unwrap_or_default(),
            entry.tytul
        );
        let sector_text = format!("{} {}", entry.tytul, summary.as_deref().unwrap_or_default());

        let mut candidate = NormalizedCandidate::new(SourceKind::Gov, &key.value, entry.tytul.trim());
        candidate.doc_type = self.classifier.document_type(&type_hint);
        candidate.level = Some(Level::Government);
        candidate.status = entry
            .status
            .as_deref()
            .and_then(|s| first_match(&self.status_rules, s).copied())
            .unwrap_or(Status::Planned);
        candidate.summary = summary;
        candidate.sector_names = non_empty(self.classifier.sectors(&sector_text));
        candidate.stakeholder_names = clean(entry.organ.as_deref()).map(|organ| vec![organ]);
        candidate.timeline_events = vec![CandidateEvent {
            date: parse_date(entry.data_wpisu.as_deref()),
            stage: REGISTRY_STAGE.to_string(),
            description: Some(format!("Numer projektu {}", key.value)),
            status: EventStatus::Completed,
            attachments: Vec::new(),
        }];
        if let Some(url) = clean(entry.url.as_deref()) {
            candidate.links.push(CandidateLink {
                url,
                description: Some("Wykaz prac legislacyjnych".to_string()),
            });
        }
        candidate.strong_key = Some(key);
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DocumentType;
    use serde_json::json;

    #[test]
    fn work_plan_entry_maps_to_candidate() {
        let adapter = GovAdapter::new(Classifier::default());
        let c = adapter
            .to_candidate(&json!({
                "numer_projektu": "ud 123",
                "tytul": " Projekt ustawy o zmianie ustawy o podatku akcyzowym ",
                "istota": "Podwyższenie stawek akcyzy.",
                "organ": "Minister Finansów",
                "status": "Projekt w uzgodnieniach międzyresortowych",
                "data_wpisu": "01.02.2025",
                "url": "https://www.gov.pl/web/premier/projekt-ud123"
            }))
            .unwrap();

        assert_eq!(c.strong_key, Some(ExternalKey::new(KeyKind::Registry, "UD123")));
        assert_eq!(c.source_id, "UD123");
        assert_eq!(c.title, "Projekt ustawy o zmianie ustawy o podatku akcyzowym");
        assert_eq!(c.doc_type, DocumentType::Act);
        assert_eq!(c.status, Status::Consultation);
        assert_eq!(c.sector_names, Some(vec!["Finanse publiczne".to_string()]));
        assert_eq!(c.stakeholder_names, Some(vec!["Minister Finansów".to_string()]));
        assert!(c.tag_names.is_none());
        assert_eq!(c.timeline_events[0].date.as_deref(), Some("2025-02-01"));
        assert_eq!(c.links.len(), 1);
    }

    #[test]
    fn missing_number_is_a_payload_error() {
        let adapter = GovAdapter::new(Classifier::default());
        let err = adapter
            .to_candidate(&json!({ "numer_projektu": " ", "tytul": "Projekt" }))
            .unwrap_err();
        assert!(err.is_record_scoped());

        let err = adapter.to_candidate(&json!({ "tytul": "Projekt" })).unwrap_err();
        assert!(err.is_record_scoped());
    }

    #[test]
    fn unknown_status_defaults_to_planned() {
        let adapter = GovAdapter::new(Classifier::default());
        let c = adapter
            .to_candidate(&json!({ "numer_projektu": "UD9", "tytul": "Projekt ustawy o sporcie" }))
            .unwrap();
        assert_eq!(c.status, Status::Planned);
        assert!(c.sector_names.is_none());
        assert!(c.stakeholder_names.is_none());
    }
}
