//! Cheap substring prefilter in front of the edit-distance comparison.

use crate::db::{document_from_row, DOCUMENT_COLUMNS};
use crate::error::Result;
use crate::normalize::normalize_title;
use crate::schema::Document;
use rusqlite::{params_from_iter, Connection};

const EDGE_PROBE_LEN: usize = 15;
const MIDDLE_PROBE_MIN_TITLE_LEN: usize = 40;
const MIDDLE_PROBE_LEN: usize = 20;

/// Distinctive fragments of the normalized title: prefix, suffix and (for long titles)
/// a window around the midpoint. Short titles probe with themselves.
pub fn probes(title: &str) -> Vec<String> {
    let chars: Vec<char> = normalize_title(title).chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }
    if len <= EDGE_PROBE_LEN {
        return vec![chars.iter().collect()];
    }

    let mut out: Vec<String> = vec![
        chars[..EDGE_PROBE_LEN].iter().collect(),
        chars[len - EDGE_PROBE_LEN..].iter().collect(),
    ];
    if len > MIDDLE_PROBE_MIN_TITLE_LEN {
        let start = len / 2 - MIDDLE_PROBE_LEN / 2;
        out.push(chars[start..start + MIDDLE_PROBE_LEN].iter().collect());
    }
    out.dedup();
    out
}

/// Every stored document whose normalized title contains any probe, or is itself
/// contained in the incoming title (a truncated stored form), oldest first.
pub fn find_candidates(conn: &Connection, title: &str) -> Result<Vec<Document>> {
    let mut params = probes(title);
    if params.is_empty() {
        return Ok(Vec::new());
    }

    let mut predicates = (1..=params.len())
        .map(|i| format!("instr(title_normalized, ?{i}) > 0"))
        .collect::<Vec<_>>();
    params.push(normalize_title(title));
    predicates.push(format!("instr(?{}, title_normalized) > 0", params.len()));

    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE {} ORDER BY id",
        predicates.join(" OR ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), document_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
