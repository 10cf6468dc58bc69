use crate::error::Result;
use crate::schema::{Document, DocumentId, KeyKind, SourceKind};
use crate::sync::SyncReport;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

pub fn open(db_path: impl AsRef<Path>) -> Result<Connection> {
    let db_path = db_path.as_ref();
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init(&conn)?;
    info!(path = %db_path.display(), "Document store opened");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          registry_number TEXT UNIQUE,
          rcl_number TEXT UNIQUE,
          sejm_number TEXT UNIQUE,
          title TEXT NOT NULL,
          title_normalized TEXT NOT NULL,
          doc_type TEXT NOT NULL,
          level TEXT,
          status TEXT NOT NULL,
          summary TEXT,
          last_source TEXT NOT NULL,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS document_votes (
          document_id INTEGER PRIMARY KEY REFERENCES documents(id),
          upvotes INTEGER NOT NULL DEFAULT 0,
          downvotes INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS timeline_events (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          document_id INTEGER NOT NULL REFERENCES documents(id),
          stage TEXT NOT NULL,
          event_date TEXT,
          description TEXT,
          status TEXT NOT NULL,
          position INTEGER NOT NULL,
          UNIQUE(document_id, stage)
        );

        CREATE TABLE IF NOT EXISTS attachments (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          event_id INTEGER NOT NULL REFERENCES timeline_events(id),
          name TEXT NOT NULL,
          url TEXT NOT NULL,
          media_type TEXT,
          UNIQUE(event_id, url)
        );

        CREATE TABLE IF NOT EXISTS external_links (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          document_id INTEGER NOT NULL REFERENCES documents(id),
          url TEXT NOT NULL,
          description TEXT,
          UNIQUE(document_id, url)
        );

        CREATE TABLE IF NOT EXISTS tags (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          name_normalized TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS sectors (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          name_normalized TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS stakeholders (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          name_normalized TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS document_tags (
          document_id INTEGER NOT NULL REFERENCES documents(id),
          entity_id INTEGER NOT NULL REFERENCES tags(id),
          PRIMARY KEY (document_id, entity_id)
        );
        CREATE TABLE IF NOT EXISTS document_sectors (
          document_id INTEGER NOT NULL REFERENCES documents(id),
          entity_id INTEGER NOT NULL REFERENCES sectors(id),
          PRIMARY KEY (document_id, entity_id)
        );
        CREATE TABLE IF NOT EXISTS document_stakeholders (
          document_id INTEGER NOT NULL REFERENCES documents(id),
          entity_id INTEGER NOT NULL REFERENCES stakeholders(id),
          PRIMARY KEY (document_id, entity_id)
        );

        CREATE TABLE IF NOT EXISTS sync_runs (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          source TEXT NOT NULL,
          started_at TEXT NOT NULL,
          finished_at TEXT NOT NULL,
          cancelled INTEGER NOT NULL,
          report_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sync_runs_source ON sync_runs(source, finished_at);
        "#,
    )?;
    Ok(())
}

pub fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.to_string())
}

pub(crate) const DOCUMENT_COLUMNS: &str = "id, registry_number, rcl_number, sejm_number, title, \
     doc_type, level, status, summary, last_source, created_at, updated_at";

pub(crate) fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        registry_number: row.get(1)?,
        rcl_number: row.get(2)?,
        sejm_number: row.get(3)?,
        title: row.get(4)?,
        doc_type: row.get(5)?,
        level: row.get(6)?,
        status: row.get(7)?,
        summary: row.get(8)?,
        last_source: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn get_document(conn: &Connection, id: DocumentId) -> Result<Option<Document>> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], document_from_row)
        .optional()?)
}

/// Point lookup on one of the UNIQUE external-key columns.
pub fn find_by_key(conn: &Connection, kind: KeyKind, value: &str) -> Result<Option<Document>> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE {} = ?1",
        kind.column()
    );
    Ok(conn
        .query_row(&sql, params![value], document_from_row)
        .optional()?)
}

pub fn count_documents(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEventRow {
    pub id: i64,
    pub stage: String,
    pub event_date: Option<String>,
    pub description: Option<String>,
    pub status: String,
}

pub fn list_timeline(conn: &Connection, document_id: DocumentId) -> Result<Vec<TimelineEventRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, stage, event_date, description, status
        FROM timeline_events
        WHERE document_id = ?1
        ORDER BY position
        "#,
    )?;
    let rows = stmt.query_map(params![document_id], |row| {
        Ok(TimelineEventRow {
            id: row.get(0)?,
            stage: row.get(1)?,
            event_date: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_attachments(conn: &Connection, event_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM attachments WHERE event_id = ?1",
        params![event_id],
        |row| row.get(0),
    )?)
}

pub fn count_links(conn: &Connection, document_id: DocumentId) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM external_links WHERE document_id = ?1",
        params![document_id],
        |row| row.get(0),
    )?)
}

/// (upvotes, downvotes) for a document, if its counter exists.
pub fn vote_counts(conn: &Connection, document_id: DocumentId) -> Result<Option<(i64, i64)>> {
    Ok(conn
        .query_row(
            "SELECT upvotes, downvotes FROM document_votes WHERE document_id = ?1",
            params![document_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?)
}

pub fn record_sync_run(
    conn: &Connection,
    source: SourceKind,
    started_at: &str,
    report: &SyncReport,
) -> Result<()> {
    let report_json = serde_json::to_string(report)?;
    conn.execute(
        r#"
        INSERT INTO sync_runs (source, started_at, finished_at, cancelled, report_json)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            source,
            started_at,
            now_timestamp(),
            report.cancelled,
            report_json
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SyncRunRow {
    pub source: SourceKind,
    pub started_at: String,
    pub finished_at: String,
    pub report: SyncReport,
}

/// Most recent finished run for each source that has one.
pub fn latest_sync_runs(conn: &Connection) -> Result<Vec<SyncRunRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT source, started_at, finished_at, report_json
        FROM sync_runs r
        WHERE id = (SELECT MAX(id) FROM sync_runs WHERE source = r.source)
        ORDER BY source
        "#,
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, SourceKind>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut runs = Vec::new();
    for r in rows {
        let (source, started_at, finished_at, report_json) = r?;
        runs.push(SyncRunRow {
            source,
            started_at,
            finished_at,
            report: serde_json::from_str(&report_json)?,
        });
    }
    Ok(runs)
}
