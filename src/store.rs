//! Storage abstraction shared by the import driver and the search engine.
//!
//! [`AircraftDataRepository`](crate::aircraft_data_repo::AircraftDataRepository)
//! is the PostgreSQL backend; [`MemoryAircraftStore`](crate::memory_store::MemoryAircraftStore)
//! keeps everything in process.

use std::time::Duration;

use async_trait::async_trait;

use crate::aircraft_data::{AircraftKey, AircraftRecord, StoredAircraft};
use crate::error::StoreError;

/// Extra wait granted past the call budget before a caller abandons a store
/// call. Stores that bound their own work (the PostgreSQL one cancels it on
/// the server) report the outcome within it.
pub const STORE_TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// Row selection for a search page.
///
/// `filter` is `None` for browse-all; otherwise it is the already uppercased
/// query text that must appear as a substring of the ICAO code, FAA
/// designator, manufacturer or FAA model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub filter: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Rows of one page together with the count of all rows matching the same filter
#[derive(Debug, Clone)]
pub struct PageResult {
    pub rows: Vec<StoredAircraft>,
    pub total: i64,
}

#[async_trait]
pub trait AircraftStore: Send + Sync {
    /// Insert the record, or overwrite every non-key column of the row with
    /// the same `(icao_code, faa_designator)`. Must be a single atomic operation.
    async fn upsert(&self, record: &AircraftRecord) -> Result<(), StoreError>;

    /// Rows ordered by `(manufacturer, model_faa)` plus the filtered total
    async fn page(&self, request: &PageRequest) -> Result<PageResult, StoreError>;

    async fn get_by_key(&self, key: &AircraftKey) -> Result<Option<StoredAircraft>, StoreError>;

    async fn get_by_id(&self, id: i32) -> Result<Option<StoredAircraft>, StoreError>;

    async fn count_all(&self) -> Result<i64, StoreError>;

    /// Delete every row, returning how many were removed
    async fn clear_all(&self) -> Result<usize, StoreError>;

    async fn delete_by_key(&self, key: &AircraftKey) -> Result<bool, StoreError>;
}

/// Uppercased ICAO code, FAA designator, manufacturer and FAA model
pub fn search_field_values(record: &AircraftRecord) -> [String; 4] {
    [
        record.icao_code.to_uppercase(),
        record.faa_designator.to_uppercase(),
        record.manufacturer.to_uppercase(),
        record.model_faa.to_uppercase(),
    ]
}

/// True when `needle` (already uppercased) occurs in any searchable field
pub fn matches_filter(record: &AircraftRecord, needle: &str) -> bool {
    search_field_values(record)
        .iter()
        .any(|value| value.contains(needle))
}
