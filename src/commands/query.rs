use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::json;
use tracing::info;

use acdb::{AircraftKey, AircraftStore, AppConfig, SearchEngine};

fn engine(store: Arc<dyn AircraftStore>, config: &AppConfig) -> SearchEngine {
    SearchEngine::new(store).with_timeout(config.query_timeout)
}

pub async fn handle_search(
    store: Arc<dyn AircraftStore>,
    config: &AppConfig,
    query: &str,
    page: i64,
    limit: i64,
) -> Result<()> {
    let results = engine(store, config).search(query, page, limit).await?;
    info!(
        "Found {} matching aircraft (page {} of {})",
        results.total,
        results.page,
        results.total_pages()
    );

    super::print_json(&json!({
        "aircraft": results.aircraft,
        "total": results.total,
        "page": results.page,
        "limit": results.limit,
        "total_pages": results.total_pages(),
    }))
}

pub async fn handle_show(
    store: Arc<dyn AircraftStore>,
    config: &AppConfig,
    icao_code: String,
    faa_designator: String,
) -> Result<()> {
    let key = AircraftKey::new(icao_code, faa_designator);
    match engine(store, config).get_by_key(&key).await? {
        Some(aircraft) => super::print_json(&aircraft),
        None => bail!("Aircraft {} not found", key),
    }
}

pub async fn handle_count(store: Arc<dyn AircraftStore>, config: &AppConfig) -> Result<()> {
    let count = engine(store, config).count_all().await?;
    info!("Total aircraft records: {}", count);
    super::print_json(&json!({ "count": count }))
}

pub async fn handle_clear(store: Arc<dyn AircraftStore>, config: &AppConfig) -> Result<()> {
    let deleted = engine(store, config).clear_all().await?;
    super::print_json(&json!({ "deleted": deleted }))
}
