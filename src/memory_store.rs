//! In-memory [`AircraftStore`] for tests and one-off runs without PostgreSQL.
//!
//! Rows live in a `BTreeMap` keyed by [`AircraftKey`] behind a `std::sync::RwLock`,
//! so every upsert is atomic with respect to concurrent callers.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::aircraft_data::{AircraftKey, AircraftRecord, StoredAircraft};
use crate::error::StoreError;
use crate::store::{AircraftStore, PageRequest, PageResult, matches_filter};

struct Inner {
    rows: BTreeMap<AircraftKey, StoredAircraft>,
    next_id: i32,
}

pub struct MemoryAircraftStore {
    inner: RwLock<Inner>,
}

impl MemoryAircraftStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Rejected("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Rejected("in-memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryAircraftStore {
    fn default() -> Self {
        Self::new()
    }
}

/// PostgreSQL TEXT cannot hold NUL bytes; reject them the same way here.
fn validate_text(record: &AircraftRecord) -> Result<(), StoreError> {
    let texts = [
        &record.icao_code,
        &record.faa_designator,
        &record.manufacturer,
        &record.model_faa,
        &record.model_bada,
        &record.physical_class_engine,
        &record.aac,
        &record.aac_minimum,
        &record.aac_maximum,
        &record.adg,
        &record.tdg,
        &record.main_gear_config,
        &record.icao_wtc,
        &record.class,
        &record.faa_weight,
        &record.cwt,
        &record.one_half_wake_category,
        &record.two_wake_category_appx_a,
        &record.two_wake_category_appx_b,
        &record.srs,
        &record.lahso,
        &record.faa_registry,
        &record.remarks,
        &record.last_update,
    ];
    if texts.iter().any(|t| t.contains('\0')) {
        return Err(StoreError::Rejected(format!(
            "invalid byte sequence: 0x00 in record {}",
            record.key()
        )));
    }
    Ok(())
}

fn sort_for_listing(rows: &mut [StoredAircraft]) {
    rows.sort_by(|a, b| {
        (&a.record.manufacturer, &a.record.model_faa, a.key())
            .cmp(&(&b.record.manufacturer, &b.record.model_faa, b.key()))
    });
}

#[async_trait]
impl AircraftStore for MemoryAircraftStore {
    async fn upsert(&self, record: &AircraftRecord) -> Result<(), StoreError> {
        validate_text(record)?;

        let now = Utc::now();
        let mut inner = self.write()?;
        let key = record.key();

        if let Some(existing) = inner.rows.get_mut(&key) {
            existing.record = record.clone();
            existing.updated_at = now;
            return Ok(());
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.rows.insert(
            key,
            StoredAircraft {
                id,
                record: record.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn page(&self, request: &PageRequest) -> Result<PageResult, StoreError> {
        let inner = self.read()?;

        let mut matching: Vec<StoredAircraft> = inner
            .rows
            .values()
            .filter(|row| match &request.filter {
                Some(needle) => matches_filter(&row.record, needle),
                None => true,
            })
            .cloned()
            .collect();
        drop(inner);

        let total = matching.len() as i64;
        sort_for_listing(&mut matching);

        let offset = request.offset.max(0) as usize;
        let limit = request.limit.max(0) as usize;
        let rows = matching.into_iter().skip(offset).take(limit).collect();

        Ok(PageResult { rows, total })
    }

    async fn get_by_key(&self, key: &AircraftKey) -> Result<Option<StoredAircraft>, StoreError> {
        Ok(self.read()?.rows.get(key).cloned())
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<StoredAircraft>, StoreError> {
        Ok(self.read()?.rows.values().find(|row| row.id == id).cloned())
    }

    async fn count_all(&self) -> Result<i64, StoreError> {
        Ok(self.read()?.rows.len() as i64)
    }

    async fn clear_all(&self) -> Result<usize, StoreError> {
        let mut inner = self.write()?;
        let removed = inner.rows.len();
        inner.rows.clear();
        Ok(removed)
    }

    async fn delete_by_key(&self, key: &AircraftKey) -> Result<bool, StoreError> {
        Ok(self.write()?.rows.remove(key).is_some())
    }
}
