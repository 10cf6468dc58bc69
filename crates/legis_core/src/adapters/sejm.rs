//! Parliamentary API legislative processes.

use super::{clean, decode, parse_date, SourceAdapter};
use crate::classify::{first_match, Classifier, Rule};
use crate::error::{Error, Result};
use crate::schema::{
    CandidateAttachment, CandidateEvent, CandidateLink, EventStatus, ExternalKey, KeyKind, Level,
    NormalizedCandidate, SourceKind, Status,
};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

pub const URGENT_TAG: &str = "Pilny";
pub const EU_TAG: &str = "Prawo UE";

/// The API is not consistent about numbers vs numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Ident {
    Number(u64),
    Text(String),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Number(n) => write!(f, "{n}"),
            Ident::Text(s) => f.write_str(s.trim()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Process {
    number: Ident,
    term: Option<Ident>,
    title: String,
    description: Option<String>,
    document_type: Option<String>,
    rcl_num: Option<String>,
    urgency_status: Option<String>,
    #[serde(rename = "UE", alias = "ue")]
    ue: Option<String>,
    passed: Option<bool>,
    #[serde(default)]
    stages: Vec<Stage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stage {
    stage_name: String,
    date: Option<String>,
    print_number: Option<Ident>,
    #[serde(default)]
    children: Vec<Stage>,
}

pub struct SejmAdapter {
    classifier: Classifier,
    status_rules: Vec<Rule<Status>>,
}

impl SejmAdapter {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            status_rules: vec![
                Rule::new(&["odrzuc"], Status::Rejected),
                Rule::new(&["wycofan"], Status::Withdrawn),
                Rule::new(&["dziennik ustaw", "publikacj"], Status::Enacted),
            ],
        }
    }

    fn status_for(&self, process: &Process, stages: &[&Stage]) -> Status {
        let from_stage = stages
            .last()
            .and_then(|stage| first_match(&self.status_rules, &stage.stage_name).copied());
        match (from_stage, process.passed) {
            (Some(status), _) => status,
            (None, Some(true)) => Status::Enacted,
            (None, _) => Status::InParliament,
        }
    }
}

impl SourceAdapter for SejmAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Sejm
    }

    fn to_candidate(&self, raw: &Value) -> Result<NormalizedCandidate> {
        let process: Process = decode(SourceKind::Sejm, raw)?;

        let number = process.number.to_string();
        if number.is_empty() {
            return Err(Error::payload(SourceKind::Sejm, "empty process number"));
        }
        let term = process
            .term
            .as_ref()
            .map(Ident::to_string)
            .filter(|t| !t.is_empty());
        let qualified = match &term {
            Some(term) => format!("{term}/{number}"),
            None => number.clone(),
        };

        let mut stages = Vec::new();
        flatten_stages(&process.stages, &mut stages);

        let type_hint = format!(
            "{} {}",
            process.document_type.as_deref().unwrap_or_default(),
            process.title
        );

        let mut candidate = NormalizedCandidate::new(SourceKind::Sejm, &qualified, process.title.trim());
        candidate.strong_key = ExternalKey::parse(KeyKind::Sejm, &qualified);
        candidate.linked_keys = process
            .rcl_num
            .as_deref()
            .and_then(|n| ExternalKey::parse(KeyKind::Rcl, n))
            .into_iter()
            .collect();
        candidate.doc_type = self.classifier.document_type(&type_hint);
        candidate.level = Some(Level::Parliament);
        candidate.status = self.status_for(&process, &stages);
        candidate.summary = clean(process.description.as_deref());
        candidate.tag_names = Some(tags_for(&process));
        candidate.timeline_events = stages
            .iter()
            .map(|stage| stage_event(stage, term.as_deref()))
            .collect();
        if let Some(term) = &term {
            candidate.links.push(CandidateLink {
                url: format!("https://www.sejm.gov.pl/Sejm{term}.nsf/PrzebiegProc.xsp?nr={number}"),
                description: Some("Przebieg procesu legislacyjnego".to_string()),
            });
        }
        Ok(candidate)
    }
}

fn flatten_stages<'a>(stages: &'a [Stage], out: &mut Vec<&'a Stage>) {
    for stage in stages {
        out.push(stage);
        flatten_stages(&stage.children, out);
    }
}

fn tags_for(process: &Process) -> Vec<String> {
    let mut tags = Vec::new();
    if process
        .urgency_status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("URGENT"))
    {
        tags.push(URGENT_TAG.to_string());
    }
    if process
        .ue
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty() && !s.eq_ignore_ascii_case("NO"))
    {
        tags.push(EU_TAG.to_string());
    }
    tags
}

fn stage_event(stage: &Stage, term: Option<&str>) -> CandidateEvent {
    let date = parse_date(stage.date.as_deref());
    let attachments = match (&stage.print_number, term) {
        (Some(print), Some(term)) => {
            let print = print.to_string();
            vec![CandidateAttachment {
                name: format!("Druk nr {print}"),
                url: format!("https://api.sejm.gov.pl/sejm/term{term}/prints/{print}/{print}.pdf"),
                media_type: Some("application/pdf".to_string()),
            }]
        }
        _ => Vec::new(),
    };
    CandidateEvent {
        status: if date.is_some() {
            EventStatus::Completed
        } else {
            EventStatus::Pending
        },
        date,
        stage: stage.stage_name.trim().to_string(),
        description: None,
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DocumentType;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "number": 123,
            "term": 10,
            "title": "Rządowy projekt ustawy o zmianie ustawy o podatku akcyzowym",
            "description": "projekt dotyczy stawek akcyzy",
            "documentType": "projekt ustawy",
            "rclNum": "RM-10-15-25",
            "urgencyStatus": "URGENT",
            "UE": "NO",
            "stages": [
                { "stageName": "Projekt wpłynął do Sejmu", "date": "2025-02-20", "printNumber": "123" },
                {
                    "stageName": "I czytanie w komisjach",
                    "date": "2025-03-01",
                    "children": [{ "stageName": "Skierowano do I czytania" }]
                }
            ]
        })
    }

    #[test]
    fn process_maps_to_candidate() {
        let c = SejmAdapter::new(Classifier::default()).to_candidate(&sample()).unwrap();

        assert_eq!(c.source_id, "10/123");
        assert_eq!(c.strong_key, Some(ExternalKey::new(KeyKind::Sejm, "10/123")));
        assert_eq!(c.linked_keys, vec![ExternalKey::new(KeyKind::Rcl, "RM-10-15-25")]);
        assert_eq!(c.doc_type, DocumentType::Act);
        assert_eq!(c.level, Some(Level::Parliament));
        assert_eq!(c.status, Status::InParliament);
        assert_eq!(c.tag_names, Some(vec![URGENT_TAG.to_string()]));
        assert!(c.sector_names.is_none());

        let stages: Vec<&str> = c.timeline_events.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(
            stages,
            vec!["Projekt wpłynął do Sejmu", "I czytanie w komisjach", "Skierowano do I czytania"]
        );
        assert_eq!(c.timeline_events[2].status, EventStatus::Pending);
        assert_eq!(
            c.timeline_events[0].attachments[0].url,
            "https://api.sejm.gov.pl/sejm/term10/prints/123/123.pdf"
        );
        assert_eq!(c.links.len(), 1);
    }

    #[test]
    fn passed_process_is_enacted() {
        let c = SejmAdapter::new(Classifier::default())
            .to_candidate(&json!({ "number": "77", "title": "Projekt ustawy", "passed": true }))
            .unwrap();
        assert_eq!(c.status, Status::Enacted);
        assert_eq!(c.source_id, "77");
        assert!(c.links.is_empty());
        assert_eq!(c.tag_names, Some(Vec::new()));
    }

    #[test]
    fn rejection_stage_wins() {
        let c = SejmAdapter::new(Classifier::default())
            .to_candidate(&json!({
                "number": "5",
                "title": "Poselski projekt ustawy",
                "stages": [{ "stageName": "Sejm odrzucił projekt", "date": "2025-01-01" }]
            }))
            .unwrap();
        assert_eq!(c.status, Status::Rejected);
    }

    #[test]
    fn string_term_is_accepted() {
        let c = SejmAdapter::new(Classifier::default())
            .to_candidate(&json!({
                "number": "412",
                "term": "10",
                "title": "Projekt ustawy o ochronie ludności",
                "stages": [{ "stageName": "Skierowano do I czytania", "printNumber": 412 }]
            }))
            .unwrap();
        assert_eq!(c.source_id, "10/412");
        assert_eq!(
            c.timeline_events[0].attachments[0].url,
            "https://api.sejm.gov.pl/sejm/term10/prints/412/412.pdf"
        );
        assert_eq!(c.links.len(), 1);
    }
}
