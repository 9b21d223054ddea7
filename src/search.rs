use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::aircraft_data::{AircraftKey, StoredAircraft};
use crate::config::DEFAULT_QUERY_TIMEOUT;
use crate::error::{SearchError, StoreError};
use crate::store::{AircraftStore, PageRequest, STORE_TIMEOUT_GRACE};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

/// One page of search results
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub aircraft: Vec<StoredAircraft>,
    /// Rows matching the query across all pages
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl SearchPage {
    pub fn total_pages(&self) -> i64 {
        if self.limit <= 0 {
            return 0;
        }
        (self.total + self.limit - 1) / self.limit
    }
}

/// `page < 1` becomes 1 and a limit outside `1..=100` becomes 50
pub fn normalize_pagination(page: i64, limit: i64) -> (i64, i64) {
    let page = if page < 1 { DEFAULT_PAGE } else { page };
    let limit = if (1..=MAX_LIMIT).contains(&limit) {
        limit
    } else {
        DEFAULT_LIMIT
    };
    (page, limit)
}

/// Read side over an [`AircraftStore`]: free-text search with pagination,
/// single-record lookups and bulk maintenance.
#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn AircraftStore>,
    timeout: Duration,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn AircraftStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, SearchError> {
        let result = tokio::time::timeout(self.timeout + STORE_TIMEOUT_GRACE, call)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?;
        Ok(result?)
    }

    /// Case-insensitive substring search over ICAO code, FAA designator,
    /// manufacturer and FAA model. Only the empty query lists everything;
    /// whitespace is matched literally like any other character.
    pub async fn search(&self, query: &str, page: i64, limit: i64) -> Result<SearchPage, SearchError> {
        let (page, limit) = normalize_pagination(page, limit);
        let filter = (!query.is_empty()).then(|| query.to_uppercase());

        let request = PageRequest {
            filter,
            limit,
            offset: (page - 1).saturating_mul(limit),
        };
        debug!("Search request {:?}", request);

        metrics::counter!("acdb.search.requests_total").increment(1);
        let result = self.bounded(self.store.page(&request)).await?;

        Ok(SearchPage {
            aircraft: result.rows,
            total: result.total,
            page,
            limit,
        })
    }

    pub async fn get_by_key(&self, key: &AircraftKey) -> Result<Option<StoredAircraft>, SearchError> {
        self.bounded(self.store.get_by_key(key)).await
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<StoredAircraft>, SearchError> {
        self.bounded(self.store.get_by_id(id)).await
    }

    pub async fn count_all(&self) -> Result<i64, SearchError> {
        self.bounded(self.store.count_all()).await
    }

    /// Remove every record, returning how many were deleted
    pub async fn clear_all(&self) -> Result<usize, SearchError> {
        let deleted = self.bounded(self.store.clear_all()).await?;
        info!("Deleted {} aircraft records", deleted);
        Ok(deleted)
    }

    pub async fn delete_by_key(&self, key: &AircraftKey) -> Result<bool, SearchError> {
        let deleted = self.bounded(self.store.delete_by_key(key)).await?;
        if deleted {
            info!("Deleted aircraft record {}", key);
        }
        Ok(deleted)
    }
}
