//! Field merge policy for a resolved record.
//!
//! - scalars (title, type, level, status, summary): last writer wins, optionally
//!   gated by a configured source precedence; absent optional values never null a
//!   stored one
//! - dictionary associations: replaced wholesale by a source that supplies the
//!   category, untouched otherwise
//! - external keys: only ever added into an empty slot

use crate::db::{self, now_timestamp};
use crate::dictionary::{replace_associations, DictionaryKind};
use crate::error::Result;
use crate::normalize::normalize_title;
use crate::schema::{
    Document, DocumentId, ExternalKey, KeyKind, NormalizedCandidate, ResolutionResult, SourceKind,
};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Highest authority first. Empty means plain last-writer-wins.
    #[serde(default)]
    pub precedence: Vec<SourceKind>,
}

impl MergePolicy {
    pub fn last_writer_wins() -> Self {
        Self::default()
    }

    pub fn with_precedence(precedence: Vec<SourceKind>) -> Self {
        Self { precedence }
    }

    fn rank(&self, source: SourceKind) -> usize {
        self.precedence
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.precedence.len())
    }

    /// Whether `incoming` may replace scalar fields last written by `stored`.
    pub fn may_overwrite(&self, stored: SourceKind, incoming: SourceKind) -> bool {
        self.precedence.is_empty() || self.rank(incoming) <= self.rank(stored)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub document_id: DocumentId,
    pub action: MergeAction,
    pub keys_added: Vec<KeyKind>,
    pub scalars_written: bool,
}

pub fn upsert_document(
    conn: &Connection,
    resolution: &ResolutionResult,
    candidate: &NormalizedCandidate,
    policy: &MergePolicy,
) -> Result<MergeOutcome> {
    let existing = match resolution.matched_document_id {
        Some(id) => db::get_document(conn, id)?,
        None => None,
    };

    match existing {
        Some(doc) => update_document(conn, &doc, candidate, policy),
        None => create_document(conn, candidate),
    }
}

/// One value per key kind, first occurrence wins.
fn keys_by_kind(candidate: &NormalizedCandidate) -> Vec<ExternalKey> {
    let mut out: Vec<ExternalKey> = Vec::new();
    for key in candidate.identity_keys() {
        if !out.iter().any(|k| k.kind == key.kind) {
            out.push(key);
        }
    }
    out
}

fn key_value(keys: &[ExternalKey], kind: KeyKind) -> Option<&str> {
    keys.iter()
        .find(|k| k.kind == kind)
        .map(|k| k.value.as_str())
}

fn create_document(conn: &Connection, candidate: &NormalizedCandidate) -> Result<MergeOutcome> {
    let keys = keys_by_kind(candidate);
    let now = now_timestamp();

    conn.execute(
        r#"
        INSERT INTO documents (
          registry_number, rcl_number, sejm_number,
          title, title_normalized, doc_type, level, status, summary,
          last_source, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
        "#,
        params![
            key_value(&keys, KeyKind::Registry),
            key_value(&keys, KeyKind::Rcl),
            key_value(&keys, KeyKind::Sejm),
            candidate.title.trim(),
            normalize_title(&candidate.title),
            candidate.doc_type,
            candidate.level,
            candidate.status,
            candidate.summary,
            candidate.source,
            now
        ],
    )?;
    let document_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO document_votes (document_id, upvotes, downvotes) VALUES (?1, 0, 0)",
        params![document_id],
    )?;

    apply_dictionaries(conn, document_id, candidate)?;

    debug!(
        document_id,
        source = %candidate.source,
        source_id = %candidate.source_id,
        "Created document"
    );
    Ok(MergeOutcome {
        document_id,
        action: MergeAction::Created,
        keys_added: keys.iter().map(|k| k.kind).collect(),
        scalars_written: true,
    })
}

fn update_document(
    conn: &Connection,
    doc: &Document,
    candidate: &NormalizedCandidate,
    policy: &MergePolicy,
) -> Result<MergeOutcome> {
    let now = now_timestamp();
    let scalars_written = policy.may_overwrite(doc.last_source, candidate.source);

    if scalars_written {
        conn.execute(
            r#"
            UPDATE documents SET
              title = ?1,
              title_normalized = ?2,
              doc_type = ?3,
              level = COALESCE(?4, level),
              status = ?5,
              summary = COALESCE(?6, summary),
              last_source = ?7,
              updated_at = ?8
            WHERE id = ?9
            "#,
            params![
                candidate.title.trim(),
                normalize_title(&candidate.title),
                candidate.doc_type,
                candidate.level,
                candidate.status,
                candidate.summary,
                candidate.source,
                now,
                doc.id
            ],
        )?;
    } else {
        debug!(
            document_id = doc.id,
            stored = %doc.last_source,
            incoming = %candidate.source,
            "Lower-precedence source, keeping stored fields"
        );
        conn.execute(
            "UPDATE documents SET updated_at = ?1 WHERE id = ?2",
            params![now, doc.id],
        )?;
    }

    let keys_added = add_missing_keys(conn, doc, candidate)?;
    apply_dictionaries(conn, doc.id, candidate)?;

    Ok(MergeOutcome {
        document_id: doc.id,
        action: MergeAction::Updated,
        keys_added,
        scalars_written,
    })
}

fn add_missing_keys(
    conn: &Connection,
    doc: &Document,
    candidate: &NormalizedCandidate,
) -> Result<Vec<KeyKind>> {
    let mut added = Vec::new();

    for key in keys_by_kind(candidate) {
        match doc.key(key.kind) {
            Some(stored) if stored == key.value => {}
            Some(stored) => {
                warn!(
                    document_id = doc.id,
                    kind = %key.kind,
                    stored,
                    incoming = %key.value,
                    source_id = %candidate.source_id,
                    "Document already holds a different key, keeping it"
                );
            }
            None => {
                if let Some(owner) = db::find_by_key(conn, key.kind, &key.value)? {
                    warn!(
                        document_id = doc.id,
                        owner = owner.id,
                        kind = %key.kind,
                        value = %key.value,
                        "Key already claimed by another document, not moving it"
                    );
                    continue;
                }
                let sql = format!(
                    "UPDATE documents SET {col} = ?1 WHERE id = ?2 AND {col} IS NULL",
                    col = key.kind.column()
                );
                if conn.execute(&sql, params![key.value, doc.id])? > 0 {
                    added.push(key.kind);
                }
            }
        }
    }
    Ok(added)
}

fn apply_dictionaries(
    conn: &Connection,
    document_id: DocumentId,
    candidate: &NormalizedCandidate,
) -> Result<()> {
    let categories = [
        (DictionaryKind::Tag, &candidate.tag_names),
        (DictionaryKind::Sector, &candidate.sector_names),
        (DictionaryKind::Stakeholder, &candidate.stakeholder_names),
    ];
    for (kind, names) in categories {
        if let Some(names) = names {
            replace_associations(conn, document_id, kind, names)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_precedence_is_last_writer_wins() {
        let policy = MergePolicy::last_writer_wins();
        assert!(policy.may_overwrite(SourceKind::Sejm, SourceKind::Gov));
        assert!(policy.may_overwrite(SourceKind::Gov, SourceKind::Sejm));
    }

    #[test]
    fn precedence_blocks_lower_ranked_sources() {
        let policy = MergePolicy::with_precedence(vec![SourceKind::Sejm, SourceKind::Rcl]);
        assert!(policy.may_overwrite(SourceKind::Rcl, SourceKind::Sejm));
        assert!(policy.may_overwrite(SourceKind::Rcl, SourceKind::Rcl));
        assert!(!policy.may_overwrite(SourceKind::Sejm, SourceKind::Rcl));
        // unlisted ranks last
        assert!(!policy.may_overwrite(SourceKind::Rcl, SourceKind::Gov));
        assert!(policy.may_overwrite(SourceKind::Gov, SourceKind::Gov));
    }
}
