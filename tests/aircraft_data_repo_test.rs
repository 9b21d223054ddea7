//! Integration tests for the PostgreSQL aircraft store.
//!
//! Each test gets its own database from `common::TestDatabase` and returns
//! early when `TEST_DATABASE_URL` is not set.
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestDatabase;
use diesel::prelude::*;
use acdb::aircraft_data::COLUMN_COUNT;
use acdb::{
    AircraftDataRepository, AircraftKey, AircraftRecord, AircraftStore, ImportDriver, SearchEngine,
    SearchError, StoreError,
};

fn data_row(icao: &str, faa: &str, manufacturer: &str, model: &str) -> Vec<String> {
    let mut row = vec![String::new(); COLUMN_COUNT];
    row[0] = icao.to_string();
    row[1] = faa.to_string();
    row[2] = manufacturer.to_string();
    row[3] = model.to_string();
    row
}

macro_rules! test_db_or_skip {
    () => {
        match TestDatabase::new()
            .await
            .expect("Failed to create test database")
        {
            Some(db) => db,
            None => return,
        }
    };
}

#[tokio::test]
async fn test_upsert_preserves_created_at_and_overwrites_fields() {
    let test_db = test_db_or_skip!();
    let repo = AircraftDataRepository::new(test_db.pool());

    let mut row = data_row("C172", "C172", "Cessna", "172 Skyhawk");
    row[6] = "1".to_string();
    row[22] = "2,450".to_string();
    repo.upsert(&AircraftRecord::from_row(&row)).await.unwrap();

    let key = AircraftKey::new("C172", "C172");
    let first = repo.get_by_key(&key).await.unwrap().unwrap();
    assert_eq!(first.record.num_engines, Some(1));
    assert_eq!(first.record.mtow_lb, Some(2450));

    row[6] = "N/A".to_string();
    row[17] = "27.2".to_string();
    repo.upsert(&AircraftRecord::from_row(&row)).await.unwrap();

    let second = repo.get_by_key(&key).await.unwrap().unwrap();
    assert_eq!(repo.count_all().await.unwrap(), 1);
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.record.num_engines, None);
    assert_eq!(second.record.length_ft, Some(27.2));
}

#[tokio::test]
async fn test_import_continues_past_rejected_row() {
    let test_db = test_db_or_skip!();
    let store = Arc::new(AircraftDataRepository::new(test_db.pool()));

    let rows = vec![
        data_row("A320", "A320", "Airbus", "A320"),
        // PostgreSQL rejects NUL bytes in TEXT
        data_row("BAD", "BAD", "Nul\0Corp", "X"),
        data_row("B738", "B738", "Boeing", "737-800"),
    ];

    let summary = ImportDriver::new(store.clone()).run_import(&rows).await.unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.total_rows, 3);
    assert_eq!(store.count_all().await.unwrap(), 2);
}

#[tokio::test]
async fn test_search_filters_orders_and_counts() {
    let test_db = test_db_or_skip!();
    let store = Arc::new(AircraftDataRepository::new(test_db.pool()));

    let rows = vec![
        data_row("B77W", "B77W", "Boeing", "777-300ER"),
        data_row("A320", "A320", "Airbus", "A320-200"),
        data_row("B738", "B738", "Boeing", "737-800"),
        data_row("C172", "C172", "Cessna", "172 Skyhawk"),
        data_row("X50%", "X50_", "Odd_Name", "50% scale"),
    ];
    ImportDriver::new(store.clone()).run_import(&rows).await.unwrap();

    let engine = SearchEngine::new(store.clone());

    let all = engine.search("", 0, 1000).await.unwrap();
    assert_eq!(all.page, 1);
    assert_eq!(all.limit, 50);
    assert_eq!(all.total, 5);
    let order: Vec<&str> = all.aircraft.iter().map(|a| a.record.icao_code.as_str()).collect();
    assert_eq!(order, vec!["A320", "B738", "B77W", "C172", "X50%"]);

    let boeing = engine.search("boeing", 1, 1).await.unwrap();
    assert_eq!(boeing.total, 2);
    assert_eq!(boeing.aircraft.len(), 1);
    assert_eq!(boeing.total_pages(), 2);
    let second_page = engine.search("boeing", 2, 1).await.unwrap();
    assert_eq!(second_page.aircraft[0].record.icao_code, "B77W");

    // LIKE metacharacters match literally
    let percent = engine.search("%", 1, 50).await.unwrap();
    assert_eq!(percent.total, 1);
    let underscore = engine.search("_", 1, 50).await.unwrap();
    assert_eq!(underscore.total, 1);

    let skyhawk = engine.search("SkyHawk", 1, 50).await.unwrap();
    assert_eq!(skyhawk.total, 1);
    assert_eq!(skyhawk.aircraft[0].record.manufacturer, "Cessna");
}

#[tokio::test]
async fn test_lookup_and_delete() {
    let test_db = test_db_or_skip!();
    let store = Arc::new(AircraftDataRepository::new(test_db.pool()));
    let engine = SearchEngine::new(store.clone());

    store
        .upsert(&AircraftRecord::from_row(&data_row("GLF5", "GLF5", "Gulfstream", "G-V")))
        .await
        .unwrap();
    store
        .upsert(&AircraftRecord::from_row(&data_row("E75L", "E75L", "Embraer", "ERJ-175")))
        .await
        .unwrap();

    let key = AircraftKey::new("GLF5", "GLF5");
    let stored = engine.get_by_key(&key).await.unwrap().unwrap();
    assert_eq!(engine.get_by_id(stored.id).await.unwrap(), Some(stored.clone()));
    assert_eq!(engine.get_by_key(&AircraftKey::new("NONE", "NONE")).await.unwrap(), None);

    assert!(engine.delete_by_key(&key).await.unwrap());
    assert!(!engine.delete_by_key(&key).await.unwrap());
    assert_eq!(engine.count_all().await.unwrap(), 1);

    assert_eq!(engine.clear_all().await.unwrap(), 1);
    assert_eq!(engine.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_upsert_past_statement_timeout_is_rolled_back() {
    let test_db = test_db_or_skip!();
    let budget = Duration::from_millis(200);
    let store = Arc::new(AircraftDataRepository::new(test_db.pool()).with_statement_timeout(budget));
    let key = AircraftKey::new("SLOW", "SLOW");
    let row = data_row("SLOW", "SLOW", "Cessna", "Held Up");

    // An uncommitted insert of the same key makes the upsert wait on the unique index
    let mut blocker = test_db.pool().get().unwrap();
    diesel::sql_query("BEGIN").execute(&mut blocker).unwrap();
    diesel::sql_query(
        "INSERT INTO aircraft_data (icao_code, faa_designator, manufacturer) \
         VALUES ('SLOW', 'SLOW', 'Blocker')",
    )
    .execute(&mut blocker)
    .unwrap();

    let err = store.upsert(&AircraftRecord::from_row(&row)).await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout(_)), "unexpected error: {err}");

    let rows = vec![row.clone()];
    let summary = ImportDriver::new(store.clone())
        .with_timeout(budget)
        .run_import(&rows)
        .await
        .unwrap();
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.success_count, 0);

    diesel::sql_query("ROLLBACK").execute(&mut blocker).unwrap();
    drop(blocker);

    // Give any abandoned write time to land if it were still alive
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.get_by_key(&key).await.unwrap(), None);
    assert_eq!(store.count_all().await.unwrap(), 0);

    // The connection goes back to the pool with its default timeout
    store.upsert(&AircraftRecord::from_row(&row)).await.unwrap();
    let stored = store.get_by_key(&key).await.unwrap().unwrap();
    assert_eq!(stored.record.manufacturer, "Cessna");
}

#[tokio::test]
async fn test_search_past_statement_timeout_fails() {
    let test_db = test_db_or_skip!();
    let budget = Duration::from_millis(200);
    let store = Arc::new(AircraftDataRepository::new(test_db.pool()).with_statement_timeout(budget));
    store
        .upsert(&AircraftRecord::from_row(&data_row("C172", "C172", "Cessna", "172 Skyhawk")))
        .await
        .unwrap();

    let mut blocker = test_db.pool().get().unwrap();
    diesel::sql_query("BEGIN").execute(&mut blocker).unwrap();
    diesel::sql_query("LOCK TABLE aircraft_data IN ACCESS EXCLUSIVE MODE")
        .execute(&mut blocker)
        .unwrap();

    let engine = SearchEngine::new(store.clone()).with_timeout(budget);
    let err = engine.search("cessna", 1, 50).await.unwrap_err();
    assert!(matches!(err, SearchError::Store(StoreError::Timeout(_))), "unexpected error: {err}");

    diesel::sql_query("ROLLBACK").execute(&mut blocker).unwrap();
    drop(blocker);

    assert_eq!(engine.search("cessna", 1, 50).await.unwrap().total, 1);
}
