//! Decides which stored document, if any, an incoming record refers to.
//!
//! Strong keys are tried first and win outright, even when the titles have drifted
//! apart. Otherwise the title goes through the candidate prefilter and the closest
//! similar candidate wins; ties go to the oldest document.

use crate::candidates::find_candidates;
use crate::db;
use crate::error::Result;
use crate::schema::{Document, DocumentId, ExternalKey, NormalizedCandidate, ResolutionResult};
use crate::similarity::{are_similar, distance};
use rusqlite::Connection;
use tracing::{debug, warn};

pub fn resolve(conn: &Connection, candidate: &NormalizedCandidate) -> Result<ResolutionResult> {
    let keys = candidate.identity_keys();

    if let Some(result) = resolve_by_keys(conn, &keys)? {
        debug!(
            source = %candidate.source,
            source_id = %candidate.source_id,
            document_id = ?result.matched_document_id,
            matched_by = ?result.matched_by,
            "Resolved by strong key"
        );
        return Ok(result);
    }

    let result = resolve_by_title(conn, &candidate.title, &keys)?;
    if result.ambiguous {
        warn!(
            source = %candidate.source,
            source_id = %candidate.source_id,
            document_id = ?result.matched_document_id,
            title = %candidate.title,
            "Ambiguous title match, picked the oldest candidate"
        );
    }
    debug!(
        source = %candidate.source,
        source_id = %candidate.source_id,
        confidence = ?result.confidence,
        document_id = ?result.matched_document_id,
        "Resolved by title"
    );
    Ok(result)
}

/// First key (in the given order) that some document already claims.
pub fn resolve_by_keys(conn: &Connection, keys: &[ExternalKey]) -> Result<Option<ResolutionResult>> {
    for key in keys {
        if let Some(doc) = db::find_by_key(conn, key.kind, &key.value)? {
            return Ok(Some(ResolutionResult::strong(doc.id, key.kind)));
        }
    }
    Ok(None)
}

/// Fuzzy fallback. Candidates already bound to a different key of a kind the record
/// carries belong to another project and are skipped.
pub fn resolve_by_title(
    conn: &Connection,
    title: &str,
    keys: &[ExternalKey],
) -> Result<ResolutionResult> {
    let mut best: Option<(DocumentId, usize)> = None;
    let mut tied = false;

    for doc in find_candidates(conn, title)? {
        if has_conflicting_key(&doc, keys) {
            debug!(document_id = doc.id, "Skipping candidate bound to another key");
            continue;
        }
        if !are_similar(title, &doc.title) {
            continue;
        }

        let d = distance(title, &doc.title);
        match best {
            Some((_, best_d)) if d > best_d => {}
            Some((_, best_d)) if d == best_d => tied = true,
            _ => {
                best = Some((doc.id, d));
                tied = false;
            }
        }
    }

    Ok(match best {
        Some((id, d)) => ResolutionResult::fuzzy(id, d, tied),
        None => ResolutionResult::none(),
    })
}

fn has_conflicting_key(doc: &Document, keys: &[ExternalKey]) -> bool {
    keys.iter().any(|key| {
        doc.key(key.kind)
            .is_some_and(|stored| stored != key.value)
    })
}
