use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use acdb::{AircraftStore, AppConfig, ImportDriver, SearchEngine};

pub async fn handle_import(
    store: Arc<dyn AircraftStore>,
    config: &AppConfig,
    file: &Path,
    sheet: &str,
) -> Result<()> {
    let driver = ImportDriver::new(store.clone()).with_timeout(config.query_timeout);
    let summary = driver
        .import_workbook(file, sheet)
        .await
        .with_context(|| format!("Failed to import {}", file.display()))?;

    if summary.error_count > 0 {
        warn!(
            "{} of {} rows failed to import",
            summary.error_count, summary.total_rows
        );
    }

    let total = SearchEngine::new(store)
        .with_timeout(config.query_timeout)
        .count_all()
        .await?;
    info!("Total aircraft records in database: {}", total);

    super::print_json(&summary)
}
