//! Table-driven keyword classifier.
//!
//! Rules are evaluated in order against normalized text. Document type takes the
//! first matching rule; sectors collect every match. The built-in tables cover common
//! Polish legislative vocabulary and can be replaced with a YAML rules file:
//!
//! ```yaml
//! document_types:
//!   - { keywords: ["rozporządzeni"], label: regulation }
//! sectors:
//!   - { keywords: ["szpital", "zdrowi"], label: Zdrowie }
//! ```

use crate::error::Result;
use crate::normalize::normalize_title;
use crate::schema::DocumentType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule<L> {
    pub keywords: Vec<String>,
    pub label: L,
}

impl<L> Rule<L> {
    pub fn new(keywords: &[&str], label: L) -> Self {
        Self {
            keywords: keywords.iter().map(|k| normalize_title(k)).collect(),
            label,
        }
    }

    /// `text` must already be normalized.
    pub fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(k.as_str()))
    }
}

/// Label of the first rule matching `text`.
pub fn first_match<'a, L>(rules: &'a [Rule<L>], text: &str) -> Option<&'a L> {
    let text = normalize_title(text);
    rules.iter().find(|r| r.matches(&text)).map(|r| &r.label)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    #[serde(default = "default_type_rules")]
    pub document_types: Vec<Rule<DocumentType>>,
    #[serde(default = "default_sector_rules")]
    pub sectors: Vec<Rule<String>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            document_types: default_type_rules(),
            sectors: default_sector_rules(),
        }
    }
}

impl Classifier {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let mut classifier: Classifier = serde_yaml::from_str(&raw)?;
        // Keywords from files are matched the same way as built-in ones.
        for rule in &mut classifier.document_types {
            rule.keywords = rule.keywords.iter().map(|k| normalize_title(k)).collect();
        }
        for rule in &mut classifier.sectors {
            rule.keywords = rule.keywords.iter().map(|k| normalize_title(k)).collect();
        }
        info!(
            path = %path.display(),
            type_rules = classifier.document_types.len(),
            sector_rules = classifier.sectors.len(),
            "Loaded classifier rules"
        );
        Ok(classifier)
    }

    pub fn document_type(&self, text: &str) -> DocumentType {
        first_match(&self.document_types, text)
            .copied()
            .unwrap_or(DocumentType::Other)
    }

    pub fn sectors(&self, text: &str) -> Vec<String> {
        let text = normalize_title(text);
        let mut out: Vec<String> = Vec::new();
        for rule in self.sectors.iter().filter(|r| r.matches(&text)) {
            if !out.contains(&rule.label) {
                out.push(rule.label.clone());
            }
        }
        out
    }
}

fn default_type_rules() -> Vec<Rule<DocumentType>> {
    vec![
        Rule::new(&["rozporządzeni"], DocumentType::Regulation),
        Rule::new(&["uchwał"], DocumentType::Resolution),
        Rule::new(&["ustaw", "kodeks"], DocumentType::Act),
    ]
}

fn default_sector_rules() -> Vec<Rule<String>> {
    let table: &[(&[&str], &str)] = &[
        (&["zdrowi", "szpital", "lecznict", "leków", "pacjent"], "Zdrowie"),
        (&["podat", "budżet", "finans", "akcyz", "rachunkow"], "Finanse publiczne"),
        (&["energ", "klimat", "gazow", "elektro"], "Energetyka i klimat"),
        (&["oświat", "szkoł", "edukac", "nauczyciel", "szkolnictw"], "Edukacja"),
        (&["rolni", "rolnych", "żywnoś", "weterynar"], "Rolnictwo"),
        (&["transport", "drogow", "kolej", "lotnicz"], "Transport"),
        (&["cyfryz", "telekomunik", "informatyz", "elektroniczn"], "Cyfryzacja"),
        (&["obron", "wojsk", "siłach zbrojnych"], "Obronność"),
        (&["zatrudni", "emerytu", "ubezpieczeń społecznych", "pomocy społecznej"], "Praca i polityka społeczna"),
        (&["środowisk", "odpad", "przyrod", "wodne"], "Środowisko"),
        (&["karn", "sądow", "prokurat", "więzien"], "Sprawiedliwość"),
    ];
    table
        .iter()
        .map(|(keywords, label)| Rule::new(keywords, (*label).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regulation_wins_over_act_keyword() {
        let c = Classifier::default();
        assert_eq!(
            c.document_type("Projekt rozporządzenia Ministra Zdrowia w sprawie ustawy"),
            DocumentType::Regulation
        );
        assert_eq!(c.document_type("Projekt ustawy o podatku"), DocumentType::Act);
        assert_eq!(c.document_type("Obwieszczenie"), DocumentType::Other);
    }

    #[test]
    fn sectors_collect_all_matches_in_rule_order() {
        let c = Classifier::default();
        let sectors = c.sectors("Projekt ustawy o podatku od szpitali i ochronie środowiska");
        assert_eq!(
            sectors,
            vec!["Zdrowie", "Finanse publiczne", "Środowisko"]
        );
    }

    #[test]
    fn matching_ignores_case() {
        let c = Classifier::default();
        assert_eq!(c.sectors("KODEKS KARNY"), vec!["Sprawiedliwość"]);
    }

    #[test]
    fn rules_load_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        fs::write(
            &path,
            "document_types:\n  - { keywords: [\"Obwieszczeni\"], label: other }\n\
             sectors:\n  - { keywords: [\"Sport\"], label: Sport }\n",
        )
        .unwrap();

        let c = Classifier::load_from_file(&path).unwrap();
        assert_eq!(c.sectors("Ustawa o sporcie"), vec!["Sport"]);
        assert_eq!(c.document_type("Projekt ustawy"), DocumentType::Other);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let c: Classifier = serde_yaml::from_str("sectors: []\n").unwrap();
        assert!(c.sectors("szpital").is_empty());
        assert_eq!(c.document_type("ustawa"), DocumentType::Act);
    }
}
