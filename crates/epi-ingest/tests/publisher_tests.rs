//! Snapshot publisher against a real PostgreSQL
//!
//! These tests require Docker. Run with:
//!
//! ```bash
//! cargo test -p epi-ingest --test publisher_tests -- --ignored --nocapture
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::NaiveDate;
use common::{init_test_tracing, TestPostgres};
use epi_ingest::config::PublishConfig;
use epi_ingest::models::Counts;
use epi_ingest::{CaseRecord, InterventionRecord, PublishError, SnapshotPublisher};
use serial_test::serial;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn case(subregion: Option<&str>, day: u32, confirmed: i64) -> CaseRecord {
    CaseRecord::new(
        "US",
        subregion.map(str::to_string),
        ymd(2020, 3, day),
        Counts {
            confirmed,
            recovered: 0,
            deaths: confirmed / 10,
        },
    )
}

fn intervention(subregion: &str, policy: &str) -> InterventionRecord {
    InterventionRecord {
        region_id: "US".into(),
        subregion_id: subregion.into(),
        policy: policy.into(),
        notes: Some("Closed K-12, including private schools".into()),
        source: None,
        issue_date: Some(ymd(2020, 3, 13)),
        start_date: ymd(2020, 3, 17),
        ease_date: None,
        expiration_date: None,
        end_date: None,
    }
}

async fn publisher(pg: &TestPostgres, chunk_size: usize) -> SnapshotPublisher {
    let publisher = SnapshotPublisher::new(pg.pool_clone(), &PublishConfig { chunk_size });
    publisher.migrate().await.unwrap();
    publisher
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_publish_replaces_previous_snapshot() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 2).await;

    let first = vec![case(Some("WA"), 1, 9), case(Some("WA"), 2, 18), case(None, 1, 30)];
    let stats = publisher
        .publish(&first, &[intervention("WA", "SchoolClose")])
        .await
        .unwrap();
    assert_eq!((stats.case_rows, stats.intervention_rows), (3, 1));

    let second = vec![case(Some("OR"), 1, 3)];
    publisher.publish(&second, &[]).await.unwrap();

    assert_eq!(pg.count("case_data").await, 1);
    assert_eq!(pg.count("intervention_data").await, 0);

    let (subregion, confirmed): (Option<String>, i64) =
        sqlx::query_as("SELECT subregion_id, confirmed FROM case_data")
            .fetch_one(pg.pool())
            .await
            .unwrap();
    assert_eq!(subregion.as_deref(), Some("OR"));
    assert_eq!(confirmed, 3);

    assert!(pg.swap_leftovers().await.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_publish_round_trips_record_fields() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 1000).await;

    let record = intervention("WA", "SchoolClose");
    publisher
        .publish(&[case(None, 3, 80)], std::slice::from_ref(&record))
        .await
        .unwrap();

    let row: (String, String, String, Option<String>, Option<NaiveDate>, NaiveDate, Option<NaiveDate>) =
        sqlx::query_as(
            "SELECT region_id, subregion_id, policy, notes, issue_date, start_date, end_date
             FROM intervention_data",
        )
        .fetch_one(pg.pool())
        .await
        .unwrap();
    assert_eq!(
        row,
        (
            "US".to_string(),
            "WA".to_string(),
            "SchoolClose".to_string(),
            record.notes.clone(),
            record.issue_date,
            record.start_date,
            None,
        )
    );

    let (subregion, date, deaths): (Option<String>, NaiveDate, i64) =
        sqlx::query_as("SELECT subregion_id, date, deaths FROM case_data")
            .fetch_one(pg.pool())
            .await
            .unwrap();
    assert_eq!(subregion, None);
    assert_eq!(date, ymd(2020, 3, 3));
    assert_eq!(deaths, 8);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_empty_snapshot_empties_live_tables() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 1000).await;

    publisher
        .publish(&[case(Some("WA"), 1, 9)], &[intervention("WA", "SchoolClose")])
        .await
        .unwrap();
    let stats = publisher.publish(&[], &[]).await.unwrap();

    assert_eq!((stats.case_rows, stats.intervention_rows), (0, 0));
    assert!(pg.table_exists("case_data").await);
    assert!(pg.table_exists("intervention_data").await);
    assert_eq!(pg.count("case_data").await, 0);
    assert_eq!(pg.count("intervention_data").await, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_failed_insert_leaves_live_tables_untouched() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 1).await;

    publisher
        .publish(
            &[case(Some("WA"), 1, 9), case(Some("WA"), 2, 18)],
            &[intervention("WA", "SchoolClose")],
        )
        .await
        .unwrap();

    // the third chunk violates the non-negative CHECK constraint
    let broken = vec![case(Some("OR"), 1, 3), case(Some("OR"), 2, 5), case(Some("OR"), 3, -1)];
    let err = publisher.publish(&broken, &[]).await.unwrap_err();

    assert!(matches!(
        err,
        PublishError::Table {
            table: "case_data",
            step: "bulk insert",
            ..
        }
    ));
    assert_eq!(pg.count("case_data").await, 2);
    assert_eq!(pg.count("intervention_data").await, 1);
    assert!(pg.swap_leftovers().await.is_empty());
}

type CaseRow = (String, Option<String>, NaiveDate, i64, i64, i64);
type InterventionRow = (String, String, String, Option<String>, NaiveDate);

async fn case_rows(pg: &TestPostgres) -> Vec<CaseRow> {
    sqlx::query_as(
        "SELECT region_id, subregion_id, date, confirmed, recovered, deaths
         FROM case_data ORDER BY date, subregion_id NULLS FIRST",
    )
    .fetch_all(pg.pool())
    .await
    .unwrap()
}

async fn intervention_rows(pg: &TestPostgres) -> Vec<InterventionRow> {
    sqlx::query_as(
        "SELECT region_id, subregion_id, policy, notes, start_date
         FROM intervention_data ORDER BY subregion_id, policy",
    )
    .fetch_all(pg.pool())
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_publishing_same_snapshot_twice_is_stable() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 2).await;

    let cases = vec![case(Some("WA"), 1, 9), case(None, 1, 30), case(Some("WA"), 2, 18)];
    let interventions = vec![intervention("WA", "SchoolClose"), intervention("OR", "StayAtHome")];

    let notes = Some("Closed K-12, including private schools".to_string());
    let expected_cases: Vec<CaseRow> = vec![
        ("US".into(), None, ymd(2020, 3, 1), 30, 0, 3),
        ("US".into(), Some("WA".into()), ymd(2020, 3, 1), 9, 0, 0),
        ("US".into(), Some("WA".into()), ymd(2020, 3, 2), 18, 0, 1),
    ];
    let expected_interventions: Vec<InterventionRow> = vec![
        ("US".into(), "OR".into(), "StayAtHome".into(), notes.clone(), ymd(2020, 3, 17)),
        ("US".into(), "WA".into(), "SchoolClose".into(), notes, ymd(2020, 3, 17)),
    ];

    for run in 1..=2 {
        let stats = publisher.publish(&cases, &interventions).await.unwrap();

        assert_eq!((stats.case_rows, stats.intervention_rows), (3, 2), "run {}", run);
        assert_eq!(case_rows(&pg).await, expected_cases, "run {}", run);
        assert_eq!(intervention_rows(&pg).await, expected_interventions, "run {}", run);
        assert!(pg.swap_leftovers().await.is_empty(), "run {}", run);
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_rename_failure_rolls_back_and_cleans_up() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 1000).await;

    publisher
        .publish(&[case(Some("WA"), 1, 9)], &[intervention("WA", "SchoolClose")])
        .await
        .unwrap();
    let before = case_rows(&pg).await;

    // a view cannot be dropped with DROP TABLE, so it survives the
    // pre-flight sweep and blocks the live -> _old rename
    sqlx::raw_sql("CREATE VIEW case_data_old AS SELECT 1 AS occupied")
        .execute(pg.pool())
        .await
        .unwrap();

    let err = publisher
        .publish(&[case(Some("OR"), 1, 3), case(Some("OR"), 2, 5)], &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::Table {
            table: "case_data",
            step: "rename",
            ..
        }
    ));
    assert_eq!(case_rows(&pg).await, before);
    assert_eq!(pg.count("intervention_data").await, 1);
    assert!(pg.swap_leftovers().await.is_empty());
    assert!(!pg.table_exists("case_data_import").await);
    assert!(!pg.table_exists("intervention_data_import").await);
    assert!(!pg.table_exists("intervention_data_old").await);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_leftovers_from_interrupted_run_are_cleared() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 1000).await;

    sqlx::raw_sql(
        "CREATE TABLE case_data_import (junk TEXT);
         CREATE TABLE intervention_data_old (LIKE intervention_data INCLUDING ALL);",
    )
    .execute(pg.pool())
    .await
    .unwrap();

    publisher.publish(&[case(None, 1, 30)], &[]).await.unwrap();

    assert_eq!(pg.count("case_data").await, 1);
    assert!(pg.swap_leftovers().await.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn test_migrate_is_idempotent() {
    init_test_tracing();
    let pg = TestPostgres::start().await.unwrap();
    let publisher = publisher(&pg, 1000).await;

    publisher.migrate().await.unwrap();

    assert!(pg.table_exists("case_data").await);
    assert!(pg.table_exists("intervention_data").await);
}
