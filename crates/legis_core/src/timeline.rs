//! Append-if-absent writes for timeline events, attachments and external links.
//!
//! Each write is preceded by a point lookup on the row's natural key. The UNIQUE
//! indexes behind those keys stay the final word: a concurrent writer slipping in
//! between lookup and insert surfaces as a constraint violation, which the
//! reconciler retries as an update.

use crate::error::Result;
use crate::schema::{CandidateAttachment, CandidateEvent, DocumentId, EventId};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: EventId,
    pub inserted: bool,
}

pub fn event_exists(conn: &Connection, document_id: DocumentId, stage: &str) -> Result<bool> {
    Ok(find_event_id(conn, document_id, stage)?.is_some())
}

pub fn attachment_exists(conn: &Connection, event_id: EventId, url: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM attachments WHERE event_id = ?1 AND url = ?2",
            params![event_id, url.trim()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn link_exists(conn: &Connection, document_id: DocumentId, url: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM external_links WHERE document_id = ?1 AND url = ?2",
            params![document_id, url.trim()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn find_event_id(conn: &Connection, document_id: DocumentId, stage: &str) -> Result<Option<EventId>> {
    Ok(conn
        .query_row(
            "SELECT id FROM timeline_events WHERE document_id = ?1 AND stage = ?2",
            params![document_id, stage.trim()],
            |row| row.get(0),
        )
        .optional()?)
}

/// Insert the event unless the document already has one with the same stage label.
/// An existing event is left as stored, even if the incoming date differs.
pub fn upsert_timeline_event(
    conn: &Connection,
    document_id: DocumentId,
    event: &CandidateEvent,
) -> Result<Upserted> {
    if let Some(id) = find_event_id(conn, document_id, &event.stage)? {
        return Ok(Upserted { id, inserted: false });
    }

    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM timeline_events WHERE document_id = ?1",
        params![document_id],
        |row| row.get(0),
    )?;

    conn.execute(
        r#"
        INSERT INTO timeline_events (document_id, stage, event_date, description, status, position)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            document_id,
            event.stage.trim(),
            event.date,
            event.description,
            event.status,
            position
        ],
    )?;
    Ok(Upserted {
        id: conn.last_insert_rowid(),
        inserted: true,
    })
}

/// Returns true when a new row was written.
pub fn upsert_attachment(
    conn: &Connection,
    event_id: EventId,
    attachment: &CandidateAttachment,
) -> Result<bool> {
    if attachment_exists(conn, event_id, &attachment.url)? {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO attachments (event_id, name, url, media_type) VALUES (?1, ?2, ?3, ?4)",
        params![
            event_id,
            attachment.name.trim(),
            attachment.url.trim(),
            attachment.media_type
        ],
    )?;
    Ok(true)
}

/// Returns true when a new row was written.
pub fn upsert_external_link(
    conn: &Connection,
    document_id: DocumentId,
    url: &str,
    description: Option<&str>,
) -> Result<bool> {
    if link_exists(conn, document_id, url)? {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO external_links (document_id, url, description) VALUES (?1, ?2, ?3)",
        params![document_id, url.trim(), description],
    )?;
    Ok(true)
}
