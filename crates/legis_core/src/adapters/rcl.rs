//! Legislative-coordination portal (RCL) project pages.

use super::{clean, decode, media_type_for, non_empty, parse_date, SourceAdapter};
use crate::classify::{first_match, Classifier, Rule};
use crate::error::{Error, Result};
use crate::normalize::normalize_title;
use crate::schema::{
    CandidateAttachment, CandidateEvent, CandidateLink, DocumentType, EventStatus, ExternalKey,
    KeyKind, Level, NormalizedCandidate, SourceKind, Status,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RclProject {
    id: String,
    numer: Option<String>,
    tytul: String,
    numer_wykazu: Option<String>,
    rodzaj: Option<String>,
    wnioskodawca: Option<String>,
    url: Option<String>,
    #[serde(default)]
    etapy: Vec<RclStage>,
}

#[derive(Debug, Deserialize)]
struct RclStage {
    nazwa: String,
    data: Option<String>,
    opis: Option<String>,
    #[serde(default)]
    zakonczony: bool,
    #[serde(default)]
    pliki: Vec<RclFile>,
}

#[derive(Debug, Deserialize)]
struct RclFile {
    nazwa: String,
    url: String,
}

pub struct RclAdapter {
    classifier: Classifier,
    status_rules: Vec<Rule<Status>>,
}

impl RclAdapter {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            status_rules: vec![
                Rule::new(&["wycofan"], Status::Withdrawn),
                Rule::new(&["sejm"], Status::InParliament),
                Rule::new(&["przyjęt"], Status::Adopted),
                Rule::new(&["konsultac", "uzgodnie", "opiniowan"], Status::Consultation),
            ],
        }
    }
}

impl SourceAdapter for RclAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Rcl
    }

    fn to_candidate(&self, raw: &Value) -> Result<NormalizedCandidate> {
        let project: RclProject = decode(SourceKind::Rcl, raw)?;
        let source_id = clean(Some(project.id.as_str()))
            .ok_or_else(|| Error::payload(SourceKind::Rcl, "empty project id"))?;

        let type_hint = format!(
            "{} {}",
            project.rodzaj.as_deref().unwrap_or_default(),
            project.tytul
        );
        let doc_type = self.classifier.document_type(&type_hint);
        let applicant = clean(project.wnioskodawca.as_deref());

        let mut candidate = NormalizedCandidate::new(SourceKind::Rcl, source_id, project.tytul.trim());
        candidate.strong_key = project
            .numer
            .as_deref()
            .and_then(|n| ExternalKey::parse(KeyKind::Rcl, n));
        candidate.registry_number = clean(project.numer_wykazu.as_deref());
        candidate.doc_type = doc_type;
        candidate.level = Some(level_for(doc_type, applicant.as_deref()));
        candidate.status = project
            .etapy
            .last()
            .and_then(|stage| first_match(&self.status_rules, &stage.nazwa).copied())
            .unwrap_or(Status::Drafting);
        candidate.sector_names = non_empty(self.classifier.sectors(&project.tytul));
        candidate.stakeholder_names = applicant.map(|a| vec![a]);
        candidate.timeline_events = project.etapy.iter().map(stage_event).collect();
        if let Some(url) = clean(project.url.as_deref()) {
            candidate.links.push(CandidateLink {
                url,
                description: Some("Rządowy Proces Legislacyjny".to_string()),
            });
        }
        Ok(candidate)
    }
}

/// Ministerial regulations sit below the cabinet level.
fn level_for(doc_type: DocumentType, applicant: Option<&str>) -> Level {
    let ministerial = applicant.is_some_and(|a| normalize_title(a).starts_with("minister"));
    if doc_type == DocumentType::Regulation && ministerial {
        Level::Ministry
    } else {
        Level::Government
    }
}

fn stage_event(stage: &RclStage) -> CandidateEvent {
    CandidateEvent {
        date: parse_date(stage.data.as_deref()),
        stage: stage.nazwa.trim().to_string(),
        description: clean(stage.opis.as_deref()),
        status: if stage.zakonczony {
            EventStatus::Completed
        } else {
            EventStatus::InProgress
        },
        attachments: stage
            .pliki
            .iter()
            .filter(|f| !f.url.trim().is_empty())
            .map(|f| CandidateAttachment {
                name: f.nazwa.trim().to_string(),
                url: f.url.trim().to_string(),
                media_type: media_type_for(&f.url),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "12390001",
            "numer": "RM-0610-12-25",
            "tytul": "Projekt rozporządzenia Ministra Zdrowia w sprawie recept",
            "numer_wykazu": "MZ 512",
            "wnioskodawca": "Minister Zdrowia",
            "url": "https://legislacja.gov.pl/projekt/12390001",
            "etapy": [
                {
                    "nazwa": "Projekt",
                    "data": "2025-01-10",
                    "zakonczony": true,
                    "pliki": [{ "nazwa": "Projekt", "url": "https://legislacja.gov.pl/docs/1/projekt.docx" }]
                },
                { "nazwa": "Konsultacje publiczne", "data": "2025-02-01", "zakonczony": false }
            ]
        })
    }

    #[test]
    fn project_page_maps_to_candidate() {
        let c = RclAdapter::new(Classifier::default()).to_candidate(&sample()).unwrap();

        assert_eq!(c.source_id, "12390001");
        assert_eq!(c.strong_key, Some(ExternalKey::new(KeyKind::Rcl, "RM-0610-12-25")));
        assert_eq!(c.registry_number.as_deref(), Some("MZ 512"));
        assert_eq!(c.doc_type, DocumentType::Regulation);
        assert_eq!(c.level, Some(Level::Ministry));
        assert_eq!(c.status, Status::Consultation);
        assert_eq!(c.timeline_events.len(), 2);
        assert_eq!(c.timeline_events[0].status, EventStatus::Completed);
        assert_eq!(c.timeline_events[1].status, EventStatus::InProgress);
        let attachment = &c.timeline_events[0].attachments[0];
        assert_eq!(
            attachment.media_type.as_deref(),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        );
        assert_eq!(c.sector_names, Some(vec!["Zdrowie".to_string()]));
    }

    #[test]
    fn acts_stay_at_government_level() {
        assert_eq!(level_for(DocumentType::Act, Some("Minister Zdrowia")), Level::Government);
        assert_eq!(level_for(DocumentType::Regulation, Some("Prezes Rady Ministrów")), Level::Government);
    }

    #[test]
    fn no_stages_means_drafting() {
        let c = RclAdapter::new(Classifier::default())
            .to_candidate(&json!({ "id": "1", "tytul": "Projekt ustawy o sporcie" }))
            .unwrap();
        assert_eq!(c.status, Status::Drafting);
        assert!(c.strong_key.is_none());
        assert!(c.timeline_events.is_empty());
    }
}
