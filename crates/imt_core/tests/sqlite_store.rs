mod common;

use pretty_assertions::assert_eq;
use time::Duration;

use common::{ctx, t0, valid_major_incident, valid_pre_incident};
use imt_core::db;
use imt_core::domain::{IncidentSource, IncidentStatus, MultipleCalls};
use imt_core::error::SubmitError;
use imt_core::export::write_incidents_csv;
use imt_core::repo;
use imt_core::store::{IncidentStore, SqliteIncidentStore};
use imt_core::submit::{map_draft, CancelSignal, SubmissionOrchestrator};

#[tokio::test]
async fn save_get_and_list_round_trip_through_sqlite() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("incidents.sqlite");
    let store = SqliteIncidentStore::open(&path).expect("open");

    let mut draft = valid_major_incident();
    draft.status = Some(IncidentStatus::InProgress);
    draft.source = IncidentSource::Monitoring;
    draft.generating_multiple_calls = MultipleCalls::Yes;
    let entity = map_draft(&draft, &ctx(), t0() + Duration::minutes(10)).unwrap();

    let saved = store.save(entity.clone()).await.expect("save");
    assert!(saved.id > 0);
    assert_eq!(saved.incident, entity);

    let fetched = store.get(saved.id).await.expect("get");
    assert_eq!(fetched, saved);

    let listed = store.list().await.expect("list");
    assert_eq!(listed, vec![saved]);
}

#[tokio::test]
async fn saving_the_same_fingerprint_twice_returns_the_stored_row() {
    let store = SqliteIncidentStore::open_in_memory().expect("open");
    let entity = map_draft(&valid_pre_incident(), &ctx(), t0()).unwrap();

    let first = store.save(entity.clone()).await.unwrap();

    let mut retry = entity.clone();
    retry.created_at = t0() + Duration::hours(1);
    let second = store.save(retry).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.incident.created_at, t0());
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn edited_incident_under_a_stored_fingerprint_is_a_conflict() {
    let store = SqliteIncidentStore::open_in_memory().expect("open");
    let original = map_draft(&valid_pre_incident(), &ctx(), t0()).unwrap();
    let first = store.save(original.clone()).await.unwrap();

    let mut edited_draft = valid_pre_incident();
    edited_draft.description = "Outbound mail queue stuck".to_string();
    edited_draft.impacted_users = Some(400);
    let edited = map_draft(&edited_draft, &ctx(), t0() + Duration::minutes(2)).unwrap();
    assert_eq!(edited.fingerprint, original.fingerprint);

    let err = store.save(edited).await.unwrap_err();
    assert_eq!(err.code, "DB_CONFLICT");
    assert!(!err.retryable);

    let stored = store.list().await.unwrap();
    assert_eq!(stored, vec![first]);
}

#[tokio::test]
async fn orchestrator_keeps_the_draft_when_an_edit_conflicts() {
    let store = SqliteIncidentStore::open_in_memory().expect("open");
    let orch = SubmissionOrchestrator::new(store.clone(), ctx());

    let mut first = valid_pre_incident();
    orch.submit(&mut first, &CancelSignal::never()).await.unwrap();

    let mut edited = valid_pre_incident();
    edited.description = "Outbound mail queue stuck".to_string();
    let before = edited.clone();
    let err = orch
        .submit(&mut edited, &CancelSignal::never())
        .await
        .unwrap_err();
    match err {
        SubmitError::Persistence(e) => assert_eq!(e.code, "DB_CONFLICT"),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(edited, before);
}

#[tokio::test]
async fn missing_incident_is_not_found() {
    let store = SqliteIncidentStore::open_in_memory().expect("open");
    let err = store.get(42).await.unwrap_err();
    assert_eq!(err.code, "DB_NOT_FOUND");
    assert_eq!(err.details.as_deref(), Some("id=42"));
}

#[tokio::test]
async fn orchestrator_persists_into_sqlite() {
    let store = SqliteIncidentStore::open_in_memory().expect("open");
    let orch = SubmissionOrchestrator::new(store.clone(), ctx());

    let mut first = valid_pre_incident();
    let mut second = valid_major_incident();
    let a = orch.submit(&mut first, &CancelSignal::never()).await.unwrap();
    let b = orch.submit(&mut second, &CancelSignal::never()).await.unwrap();
    assert_ne!(a.id, b.id);

    let listed = store.list().await.unwrap();
    let numbers: Vec<&str> = listed
        .iter()
        .map(|p| p.incident.incident_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["INC100", "INC200"]);
}

#[test]
fn repository_counts_and_exports_the_register() {
    let tmp = tempfile::tempdir().unwrap();
    let mut conn = db::open_and_migrate(&tmp.path().join("db.sqlite")).unwrap();

    let pre = map_draft(&valid_pre_incident(), &ctx(), t0()).unwrap();
    let mut major_draft = valid_major_incident();
    major_draft.title = "Payments, \"all\" regions".to_string();
    let major = map_draft(&major_draft, &ctx(), t0() + Duration::minutes(1)).unwrap();

    repo::insert_incident(&mut conn, &pre).unwrap();
    repo::insert_incident(&mut conn, &major).unwrap();
    assert_eq!(repo::count_incidents(&conn).unwrap(), 2);
    assert!(repo::find_by_fingerprint(&conn, &pre.fingerprint)
        .unwrap()
        .is_some());
    assert!(repo::find_by_fingerprint(&conn, "nope").unwrap().is_none());

    let dest = tmp.path().join("register.csv");
    let rows = write_incidents_csv(&conn, &dest).unwrap();
    assert_eq!(rows, 2);

    let mut rdr = csv::Reader::from_path(&dest).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("Id"));
    assert_eq!(headers.get(1), Some("IncidentNumber"));
    assert_eq!(headers.len(), 19);

    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get(1), Some("INC100"));
    assert_eq!(records[0].get(3), Some("PreIncident"));
    assert_eq!(records[0].get(11), Some(""));
    assert_eq!(records[1].get(2), Some("Payments, \"all\" regions"));
    assert_eq!(records[1].get(4), Some("P1"));
    assert_eq!(records[1].get(13), Some("2026-03-02T09:00:00Z"));
}

#[test]
fn migrations_are_recorded_once_per_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("db.sqlite");
    drop(db::open_and_migrate(&path).unwrap());
    let conn = db::open_and_migrate(&path).unwrap();
    let applied = db::applied_migrations(&conn).unwrap();
    assert!(applied.contains("0001_init.sql"));
    assert!(applied.contains("0002_priority_justification.sql"));
}
