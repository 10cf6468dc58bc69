//! Applies one candidate record end to end: resolve, merge, timeline, links.
//!
//! Each record runs in its own IMMEDIATE transaction, so a record is either fully
//! merged or not at all. A UNIQUE violation means another writer created the same
//! row first; the transaction is rolled back and the record is re-resolved, which
//! turns the retry into an update.

use crate::error::Result;
use crate::merge::{upsert_document, MergeAction, MergePolicy};
use crate::resolver;
use crate::schema::{DocumentId, NormalizedCandidate, ResolutionResult};
use crate::timeline::{upsert_attachment, upsert_external_link, upsert_timeline_event};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, warn};

pub const MAX_CONFLICT_RETRIES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub document_id: DocumentId,
    pub action: MergeAction,
    pub resolution: ResolutionResult,
    pub events_added: usize,
    pub attachments_added: usize,
    pub links_added: usize,
    pub retries: usize,
}

pub struct Reconciler<'c> {
    conn: &'c mut Connection,
    policy: MergePolicy,
}

impl<'c> Reconciler<'c> {
    pub fn new(conn: &'c mut Connection, policy: MergePolicy) -> Self {
        Self { conn, policy }
    }

    pub fn connection(&self) -> &Connection {
        &*self.conn
    }

    /// Dry run: which document would this record land on.
    pub fn resolve(&self, candidate: &NormalizedCandidate) -> Result<ResolutionResult> {
        resolver::resolve(&*self.conn, candidate)
    }

    pub fn reconcile(&mut self, candidate: &NormalizedCandidate) -> Result<ReconcileOutcome> {
        self.reconcile_from(candidate, None)
    }

    /// Applies a resolution obtained earlier, e.g. from [`Reconciler::resolve`].
    /// If rows written since then make it stale, the resulting constraint conflict
    /// is retried with a fresh resolution.
    pub fn reconcile_resolved(
        &mut self,
        candidate: &NormalizedCandidate,
        resolution: ResolutionResult,
    ) -> Result<ReconcileOutcome> {
        self.reconcile_from(candidate, Some(resolution))
    }

    fn reconcile_from(
        &mut self,
        candidate: &NormalizedCandidate,
        mut resolution: Option<ResolutionResult>,
    ) -> Result<ReconcileOutcome> {
        candidate.validate()?;

        let mut attempt = 0;
        loop {
            match self.apply_once(candidate, resolution.take()) {
                Ok(mut outcome) => {
                    outcome.retries = attempt;
                    return Ok(outcome);
                }
                Err(e) if e.is_constraint_violation() && attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(
                        source = %candidate.source,
                        source_id = %candidate.source_id,
                        attempt,
                        error = %e,
                        "Constraint conflict, retrying record as update"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn apply_once(
        &mut self,
        candidate: &NormalizedCandidate,
        resolution: Option<ResolutionResult>,
    ) -> Result<ReconcileOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let resolution = match resolution {
            Some(resolution) => resolution,
            None => resolver::resolve(&tx, candidate)?,
        };
        let merged = upsert_document(&tx, &resolution, candidate, &self.policy)?;
        let document_id = merged.document_id;

        let mut events_added = 0;
        let mut attachments_added = 0;
        for event in &candidate.timeline_events {
            let stored = upsert_timeline_event(&tx, document_id, event)?;
            if stored.inserted {
                events_added += 1;
            }
            for attachment in &event.attachments {
                if upsert_attachment(&tx, stored.id, attachment)? {
                    attachments_added += 1;
                }
            }
        }

        let mut links_added = 0;
        for link in &candidate.links {
            if upsert_external_link(&tx, document_id, &link.url, link.description.as_deref())? {
                links_added += 1;
            }
        }

        tx.commit()?;

        debug!(
            document_id,
            action = ?merged.action,
            confidence = ?resolution.confidence,
            events_added,
            attachments_added,
            links_added,
            "Record reconciled"
        );
        Ok(ReconcileOutcome {
            document_id,
            action: merged.action,
            resolution,
            events_added,
            attachments_added,
            links_added,
            retries: 0,
        })
    }
}
