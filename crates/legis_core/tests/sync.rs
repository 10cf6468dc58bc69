use legis_core::adapters::for_source;
use legis_core::classify::Classifier;
use legis_core::db;
use legis_core::error::Error;
use legis_core::sync::{JsonFileFeed, Pacer, RecordFeed, SyncRunner, VecFeed};
use legis_core::schema::{ExternalKey, KeyKind, NormalizedCandidate};
use legis_core::{MergePolicy, Reconciler, SourceKind};
use serde_json::{json, Value};
use std::fs;
use std::sync::atomic::Ordering;

fn sejm_process(number: u64, title: &str) -> Value {
    json!({
        "number": number,
        "term": 10,
        "title": title,
        "documentType": "projekt ustawy",
        "passed": false,
        "stages": [
            { "stageName": "Skierowanie do I czytania", "date": "2025-03-01" }
        ]
    })
}

#[test]
fn pass_counts_created_updated_and_skipped() {
    let mut conn = db::open_in_memory().unwrap();
    let adapter = for_source(SourceKind::Sejm, Classifier::default());
    let mut feed = VecFeed::new(vec![
        sejm_process(101, "Projekt ustawy o ochronie ludności"),
        json!({ "title": "brak numeru" }),
        sejm_process(102, "Projekt ustawy o zmianie ustawy o szkolnictwie wyższym"),
        sejm_process(101, "Projekt ustawy o ochronie ludności"),
    ]);
    feed.push_error(Error::InvalidInput("connection reset".to_string()));

    let report = {
        let reconciler = Reconciler::new(&mut conn, MergePolicy::default());
        let mut runner = SyncRunner::new(reconciler, Pacer::unpaced());
        runner.run(adapter.as_ref(), &mut feed)
    };

    assert_eq!(report.fetched, 4);
    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 0);
    assert!(!report.cancelled);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(db::count_documents(&conn).unwrap(), 2);
}

#[test]
fn tied_title_matches_are_counted_as_ambiguous() {
    let title = "Projekt ustawy o ochronie ludności";
    let mut conn = db::open_in_memory().unwrap();
    let adapter = for_source(SourceKind::Sejm, Classifier::default());
    let mut feed = VecFeed::new(vec![sejm_process(9, title)]);

    let report = {
        let mut reconciler = Reconciler::new(&mut conn, MergePolicy::default());
        for registry in ["UD1", "UD2"] {
            let mut c = NormalizedCandidate::new(SourceKind::Gov, registry, title);
            c.strong_key = Some(ExternalKey::new(KeyKind::Registry, registry));
            reconciler.reconcile(&c).unwrap();
        }
        SyncRunner::new(reconciler, Pacer::unpaced()).run(adapter.as_ref(), &mut feed)
    };

    assert_eq!(report.updated, 1);
    assert_eq!(report.ambiguous, 1);
    assert_eq!(db::count_documents(&conn).unwrap(), 2);
}

#[test]
fn cancelled_pass_stops_before_the_next_record() {
    let mut conn = db::open_in_memory().unwrap();
    let adapter = for_source(SourceKind::Sejm, Classifier::default());
    let mut feed = VecFeed::new(vec![sejm_process(1, "Projekt ustawy o ochronie ludności")]);

    let reconciler = Reconciler::new(&mut conn, MergePolicy::default());
    let mut runner = SyncRunner::new(reconciler, Pacer::unpaced());
    runner.cancel_handle().store(true, Ordering::SeqCst);
    let report = runner.run(adapter.as_ref(), &mut feed);
    drop(runner);

    assert!(report.cancelled);
    assert_eq!(report.fetched, 0);
    assert_eq!(db::count_documents(&conn).unwrap(), 0);
    // the record was never pulled
    assert!(feed.fetch_next().is_some());
}

#[test]
fn sync_runs_are_recorded_per_source() {
    let mut conn = db::open_in_memory().unwrap();
    let adapter = for_source(SourceKind::Sejm, Classifier::default());
    let mut feed = VecFeed::new(vec![sejm_process(7, "Projekt ustawy o ochronie ludności")]);

    let started_at = db::now_timestamp();
    let report = {
        let reconciler = Reconciler::new(&mut conn, MergePolicy::default());
        SyncRunner::new(reconciler, Pacer::unpaced()).run(adapter.as_ref(), &mut feed)
    };
    db::record_sync_run(&conn, SourceKind::Sejm, &started_at, &report).unwrap();

    let runs = db::latest_sync_runs(&conn).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].source, SourceKind::Sejm);
    assert_eq!(runs[0].started_at, started_at);
    assert_eq!(runs[0].report, report);
}

#[test]
fn json_file_feed_reads_arrays_and_item_envelopes() {
    let dir = tempfile::tempdir().unwrap();

    let array = dir.path().join("array.json");
    fs::write(&array, r#"[{"number": 1}, {"number": 2}]"#).unwrap();
    assert_eq!(JsonFileFeed::open(&array).unwrap().len(), 2);

    let envelope = dir.path().join("envelope.json");
    fs::write(&envelope, r#"{"items": [{"number": 1}]}"#).unwrap();
    let mut feed = JsonFileFeed::open(&envelope).unwrap();
    assert!(!feed.is_empty());
    assert!(feed.fetch_next().is_some());
    assert!(feed.fetch_next().is_none());

    let scalar = dir.path().join("scalar.json");
    fs::write(&scalar, "42").unwrap();
    assert!(JsonFileFeed::open(&scalar).is_err());
}
