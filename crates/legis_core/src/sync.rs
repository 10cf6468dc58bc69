//! Sequential sync passes over one source.
//!
//! A pass pulls raw payloads from a feed one at a time, pacing consecutive fetches,
//! converts each through the source adapter and reconciles it before reading the
//! next. Cancellation is only observed between records.

use crate::adapters::SourceAdapter;
use crate::db::now_timestamp;
use crate::error::{Error, Result};
use crate::merge::MergeAction;
use crate::reconcile::Reconciler;
use crate::schema::{Confidence, SourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Source of raw upstream payloads for one sync pass.
pub trait RecordFeed {
    /// `None` when exhausted; `Some(Err)` for a record that could not be fetched.
    fn fetch_next(&mut self) -> Option<Result<Value>>;
}

/// In-memory feed, mostly for tests and replays.
#[derive(Debug, Default)]
pub struct VecFeed {
    items: std::collections::VecDeque<Result<Value>>,
}

impl VecFeed {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: items.into_iter().map(Ok).collect(),
        }
    }

    pub fn push_error(&mut self, error: Error) {
        self.items.push_back(Err(error));
    }
}

impl RecordFeed for VecFeed {
    fn fetch_next(&mut self) -> Option<Result<Value>> {
        self.items.pop_front()
    }
}

/// Payloads saved to disk as a JSON array (or an object with an `items` array).
pub struct JsonFileFeed {
    items: std::vec::IntoIter<Value>,
}

impl JsonFileFeed {
    pub fn open(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let items = match serde_json::from_str::<Value>(&raw)? {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "{} has no items array",
                        path.display()
                    )));
                }
            },
            _ => {
                return Err(Error::InvalidInput(format!(
                    "{} is not a JSON array",
                    path.display()
                )));
            }
        };
        Ok(Self {
            items: items.into_iter(),
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.len() == 0
    }
}

impl RecordFeed for JsonFileFeed {
    fn fetch_next(&mut self) -> Option<Result<Value>> {
        self.items.next().map(Ok)
    }
}

/// Minimum spacing between consecutive requests to one source.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub source_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub ambiguous: usize,
    pub skipped: usize,
    pub failed: usize,
    pub events_added: usize,
    pub attachments_added: usize,
    pub links_added: usize,
    pub conflicts_retried: usize,
    pub cancelled: bool,
    #[serde(default)]
    pub failures: Vec<RecordFailure>,
}

pub struct SyncRunner<'c> {
    reconciler: Reconciler<'c>,
    pacer: Pacer,
    cancel: Arc<AtomicBool>,
}

impl<'c> SyncRunner<'c> {
    pub fn new(reconciler: Reconciler<'c>, pacer: Pacer) -> Self {
        Self {
            reconciler,
            pacer,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Setting the flag stops the pass before the next record.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn run(&mut self, adapter: &dyn SourceAdapter, feed: &mut dyn RecordFeed) -> SyncReport {
        let source = adapter.source();
        let mut report = SyncReport::default();
        info!(%source, "Sync pass started");

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                report.cancelled = true;
                info!(%source, processed = report.fetched, "Sync pass cancelled");
                break;
            }

            self.pacer.wait();
            let raw = match feed.fetch_next() {
                None => break,
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    warn!(%source, error = %e, "Fetch failed, skipping record");
                    report.skipped += 1;
                    report.failures.push(RecordFailure {
                        source_id: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            report.fetched += 1;

            let candidate = match adapter.to_candidate(&raw) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(%source, error = %e, "Malformed payload, skipping record");
                    report.skipped += 1;
                    report.failures.push(RecordFailure {
                        source_id: raw_identifier(&raw),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.reconciler.reconcile(&candidate) {
                Ok(outcome) => {
                    match outcome.action {
                        MergeAction::Created => report.created += 1,
                        MergeAction::Updated => report.updated += 1,
                    }
                    if outcome.resolution.confidence == Confidence::Fuzzy && outcome.resolution.ambiguous {
                        report.ambiguous += 1;
                    }
                    report.events_added += outcome.events_added;
                    report.attachments_added += outcome.attachments_added;
                    report.links_added += outcome.links_added;
                    report.conflicts_retried += outcome.retries;
                }
                Err(e @ Error::Contract { .. }) => {
                    error!(%source, source_id = %candidate.source_id, error = %e, "Record rejected");
                    report.failed += 1;
                    report.failures.push(RecordFailure {
                        source_id: Some(candidate.source_id.clone()),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(%source, source_id = %candidate.source_id, error = %e, "Record not stored, skipping");
                    report.skipped += 1;
                    report.failures.push(RecordFailure {
                        source_id: Some(candidate.source_id.clone()),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            %source,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            ambiguous = report.ambiguous,
            "Sync pass finished"
        );
        report
    }
}

/// Best-effort identifier of an unparseable payload, for the failure report.
fn raw_identifier(raw: &Value) -> Option<String> {
    ["numer_projektu", "numer", "id", "number"]
        .iter()
        .find_map(|field| match raw.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub running: bool,
    pub last_started: Option<String>,
    pub last_finished: Option<String>,
    pub last_report: Option<SyncReport>,
}

/// Per-source run state. Different sources run independently; the same source
/// cannot be started twice at once.
#[derive(Debug, Default)]
pub struct SyncScheduler {
    states: Mutex<HashMap<SourceKind, SyncState>>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self, source: SourceKind) -> Result<SyncTicket<'_>> {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(source).or_default();
        if state.running {
            return Err(Error::AlreadyRunning(source));
        }
        let started_at = now_timestamp();
        state.running = true;
        state.last_started = Some(started_at.clone());
        Ok(SyncTicket {
            scheduler: self,
            source,
            started_at,
            report: None,
        })
    }

    pub fn state(&self, source: SourceKind) -> SyncState {
        let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.get(&source).cloned().unwrap_or_default()
    }

    fn release(&self, source: SourceKind, report: Option<&SyncReport>) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(source).or_default();
        state.running = false;
        if let Some(report) = report {
            state.last_finished = Some(now_timestamp());
            state.last_report = Some(report.clone());
        }
    }
}

/// Held for the duration of one pass; dropping it without `finish` frees the
/// source without recording a result.
pub struct SyncTicket<'a> {
    scheduler: &'a SyncScheduler,
    source: SourceKind,
    started_at: String,
    report: Option<SyncReport>,
}

impl SyncTicket<'_> {
    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    pub fn finish(mut self, report: &SyncReport) {
        self.report = Some(report.clone());
    }
}

impl Drop for SyncTicket<'_> {
    fn drop(&mut self) {
        self.scheduler.release(self.source, self.report.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_source_cannot_run_twice() {
        let scheduler = SyncScheduler::new();
        let ticket = scheduler.try_begin(SourceKind::Rcl).unwrap();
        assert!(matches!(
            scheduler.try_begin(SourceKind::Rcl),
            Err(Error::AlreadyRunning(SourceKind::Rcl))
        ));
        // other sources are independent
        let other = scheduler.try_begin(SourceKind::Sejm).unwrap();
        drop(other);
        drop(ticket);
        assert!(scheduler.try_begin(SourceKind::Rcl).is_ok());
    }

    #[test]
    fn finish_records_the_report() {
        let scheduler = SyncScheduler::new();
        let ticket = scheduler.try_begin(SourceKind::Gov).unwrap();
        let report = SyncReport {
            fetched: 3,
            created: 2,
            ..SyncReport::default()
        };
        ticket.finish(&report);

        let state = scheduler.state(SourceKind::Gov);
        assert!(!state.running);
        assert!(state.last_started.is_some());
        assert!(state.last_finished.is_some());
        assert_eq!(state.last_report, Some(report));
    }

    #[test]
    fn pacer_spaces_calls() {
        let mut pacer = Pacer::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn raw_identifier_reads_known_fields() {
        assert_eq!(
            raw_identifier(&serde_json::json!({ "number": 12 })),
            Some("12".to_string())
        );
        assert_eq!(raw_identifier(&serde_json::json!({ "x": 1 })), None);
    }
}
