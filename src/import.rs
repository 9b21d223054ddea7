use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aircraft_data::{AircraftRecord, parse_row_with_diagnostics};
use crate::config::DEFAULT_QUERY_TIMEOUT;
use crate::error::{ImportError, StoreError};
use crate::store::{AircraftStore, STORE_TIMEOUT_GRACE};
use crate::workbook::read_sheet_rows;

/// Successful rows between progress log lines
const PROGRESS_INTERVAL: usize = 100;

/// Outcome of one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub success_count: usize,
    pub error_count: usize,
    pub total_rows: usize,
    /// Numeric cells that had content but could not be parsed (stored as absent)
    pub unparseable_cells: usize,
}

/// Feeds worksheet rows through the row parser into an [`AircraftStore`],
/// one upsert per row, strictly in order.
pub struct ImportDriver {
    store: Arc<dyn AircraftStore>,
    timeout: Duration,
}

impl ImportDriver {
    pub fn new(store: Arc<dyn AircraftStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Budget for each individual upsert. The driver gives up on a call
    /// [`STORE_TIMEOUT_GRACE`] after it, so configure the store with the same
    /// budget when it can enforce one itself.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open `path`, read `sheet`, skip the header row and import the rest
    pub async fn import_workbook(&self, path: &Path, sheet: &str) -> Result<ImportSummary, ImportError> {
        info!("Importing aircraft data from {} (sheet '{}')", path.display(), sheet);

        let rows = read_sheet_rows(path, sheet)?;
        let data_rows = rows.get(1..).unwrap_or_default();
        self.run_import(data_rows).await
    }

    /// Import data rows (header already removed).
    ///
    /// A failing row is logged and counted and the run continues; only an
    /// empty source aborts.
    pub async fn run_import<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Result<ImportSummary, ImportError> {
        if rows.is_empty() {
            return Err(ImportError::EmptySource);
        }

        let start = Instant::now();
        let mut summary = ImportSummary {
            total_rows: rows.len(),
            ..ImportSummary::default()
        };

        for (i, cells) in rows.iter().enumerate() {
            // +1 for the header, +1 for one-based numbering
            let sheet_row = i + 2;
            let parsed = parse_row_with_diagnostics(cells);
            summary.unparseable_cells += parsed.unparseable_cells;
            if parsed.unparseable_cells > 0 {
                debug!(
                    "Row {}: {} numeric cell(s) could not be parsed and were stored as absent",
                    sheet_row, parsed.unparseable_cells
                );
            }

            match self.upsert_with_timeout(&parsed.record).await {
                Ok(()) => {
                    summary.success_count += 1;
                    metrics::counter!("acdb.import.rows_total", "outcome" => "success").increment(1);
                    if summary.success_count % PROGRESS_INTERVAL == 0 {
                        info!("Processed {} rows...", summary.success_count);
                    }
                }
                Err(e) => {
                    summary.error_count += 1;
                    metrics::counter!("acdb.import.rows_total", "outcome" => "error").increment(1);
                    warn!(
                        "Failed to upsert row {} ({}): {}",
                        sheet_row,
                        parsed.record.key(),
                        e
                    );
                }
            }
        }

        let elapsed = start.elapsed();
        metrics::histogram!("acdb.import.duration_seconds").record(elapsed.as_secs_f64());
        info!(
            "Import completed in {:.2}s: {} successful, {} errors, {} total rows ({} unparseable numeric cells)",
            elapsed.as_secs_f64(),
            summary.success_count,
            summary.error_count,
            summary.total_rows,
            summary.unparseable_cells
        );

        Ok(summary)
    }

    async fn upsert_with_timeout(&self, record: &AircraftRecord) -> Result<(), StoreError> {
        tokio::time::timeout(self.timeout + STORE_TIMEOUT_GRACE, self.store.upsert(record))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}
