//! Shared taxonomy entities (tags, sectors, stakeholders).
//!
//! Names are unique by their normalized form; the first spelling seen is kept for
//! display. Creation is `INSERT OR IGNORE` followed by a lookup, so two writers racing
//! on the same name both end up with the one row the UNIQUE index let through.

use crate::error::{Error, Result};
use crate::normalize::normalize_name;
use crate::schema::DocumentId;
use rusqlite::{params, Connection};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type EntityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryKind {
    Tag,
    Sector,
    Stakeholder,
}

impl DictionaryKind {
    fn table(&self) -> &'static str {
        match self {
            DictionaryKind::Tag => "tags",
            DictionaryKind::Sector => "sectors",
            DictionaryKind::Stakeholder => "stakeholders",
        }
    }

    fn link_table(&self) -> &'static str {
        match self {
            DictionaryKind::Tag => "document_tags",
            DictionaryKind::Sector => "document_sectors",
            DictionaryKind::Stakeholder => "document_stakeholders",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntity {
    pub id: EntityId,
    pub name: String,
}

pub fn get_or_create(conn: &Connection, kind: DictionaryKind, name: &str) -> Result<DictionaryEntity> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return Err(Error::InvalidInput(format!("blank {kind:?} name")));
    }

    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (name, name_normalized) VALUES (?1, ?2)",
            kind.table()
        ),
        params![name.trim(), normalized],
    )?;

    let entity = conn.query_row(
        &format!("SELECT id, name FROM {} WHERE name_normalized = ?1", kind.table()),
        params![normalized],
        |row| {
            Ok(DictionaryEntity {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )?;
    Ok(entity)
}

/// Replace a document's associations of one kind with exactly `names`.
/// Blank names are skipped.
pub fn replace_associations(
    conn: &Connection,
    document_id: DocumentId,
    kind: DictionaryKind,
    names: &[String],
) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {} WHERE document_id = ?1", kind.link_table()),
        params![document_id],
    )?;

    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let entity = get_or_create(conn, kind, name)?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (document_id, entity_id) VALUES (?1, ?2)",
                kind.link_table()
            ),
            params![document_id, entity.id],
        )?;
    }
    Ok(())
}

/// Display names associated with a document, alphabetical.
pub fn names_for(conn: &Connection, document_id: DocumentId, kind: DictionaryKind) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT e.name FROM {} e JOIN {} l ON l.entity_id = e.id \
         WHERE l.document_id = ?1 ORDER BY e.name",
        kind.table(),
        kind.link_table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![document_id], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

pub fn count(conn: &Connection, kind: DictionaryKind) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", kind.table()), [], |row| {
        row.get(0)
    })?)
}
