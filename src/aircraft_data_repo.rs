use std::time::{Duration, Instant};

use async_trait::async_trait;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel::upsert::excluded;
use tracing::debug;

use crate::aircraft_data::{
    AircraftDataModel, AircraftKey, AircraftRecord, NewAircraftData, StoredAircraft,
};
use crate::config::DEFAULT_QUERY_TIMEOUT;
use crate::db::PgPool;
use crate::db::functions::upper;
use crate::error::StoreError;
use crate::schema::aircraft_data;
use crate::store::{AircraftStore, PageRequest, PageResult};

type SearchPredicate = Box<dyn BoxableExpression<aircraft_data::table, Pg, SqlType = Bool>>;

/// Escape LIKE metacharacters so the query text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `%TEXT%` pattern for an already uppercased needle
fn like_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}

fn search_predicate(pattern: &str) -> SearchPredicate {
    Box::new(
        upper(aircraft_data::icao_code)
            .like(pattern.to_string())
            .or(upper(aircraft_data::faa_designator).like(pattern.to_string()))
            .or(upper(aircraft_data::manufacturer).like(pattern.to_string()))
            .or(upper(aircraft_data::model_faa).like(pattern.to_string())),
    )
}

/// Bound every statement of the current transaction on the server.
/// `SET LOCAL` is undone at commit or rollback, so pooled connections keep
/// their default.
fn set_local_statement_timeout(conn: &mut PgConnection, budget: Duration) -> QueryResult<()> {
    // 0 would disable the timeout
    let millis = budget.as_millis().max(1);
    diesel::sql_query(format!("SET LOCAL statement_timeout = {}", millis)).execute(conn)?;
    Ok(())
}

/// What is left of the call budget once a connection has been checked out
fn remaining_budget(deadline: Instant, budget: Duration) -> Result<Duration, StoreError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(StoreError::Timeout(budget));
    }
    Ok(remaining)
}

/// A statement cancelled by `statement_timeout` is a timeout, not a data error
fn query_error(error: diesel::result::Error, budget: Duration) -> StoreError {
    let cancelled = matches!(
        &error,
        diesel::result::Error::DatabaseError(_, info)
            if info.message().contains("statement timeout")
    );
    if cancelled {
        StoreError::Timeout(budget)
    } else {
        StoreError::Database(error)
    }
}

#[derive(Clone)]
pub struct AircraftDataRepository {
    pool: PgPool,
    statement_timeout: Duration,
}

impl AircraftDataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Budget for one upsert or search, counted from the call and enforced
    /// by PostgreSQL. Work still running when it expires is rolled back.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Insert a record or update the existing row with the same
    /// (icao_code, faa_designator) in one `INSERT ... ON CONFLICT` statement.
    /// `created_at` is left untouched on update; `updated_at` is refreshed.
    pub async fn upsert_record(&self, record: AircraftRecord) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        let budget = self.statement_timeout;
        let deadline = Instant::now() + budget;
        let new_row = NewAircraftData::from(record);

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            use crate::schema::aircraft_data::dsl as ad;

            let mut conn = pool.get()?;
            let remaining = remaining_budget(deadline, budget)?;
            conn.transaction(|conn| -> QueryResult<()> {
                set_local_statement_timeout(conn, remaining)?;
                diesel::insert_into(ad::aircraft_data)
                    .values(&new_row)
                    .on_conflict((ad::icao_code, ad::faa_designator))
                    .do_update()
                    .set((
                        ad::manufacturer.eq(excluded(ad::manufacturer)),
                        ad::model_faa.eq(excluded(ad::model_faa)),
                        ad::model_bada.eq(excluded(ad::model_bada)),
                        ad::physical_class_engine.eq(excluded(ad::physical_class_engine)),
                        ad::num_engines.eq(excluded(ad::num_engines)),
                        ad::aac.eq(excluded(ad::aac)),
                        ad::aac_minimum.eq(excluded(ad::aac_minimum)),
                        ad::aac_maximum.eq(excluded(ad::aac_maximum)),
                        ad::adg.eq(excluded(ad::adg)),
                        ad::tdg.eq(excluded(ad::tdg)),
                        ad::approach_speed_knot.eq(excluded(ad::approach_speed_knot)),
                        ad::approach_speed_minimum_knot.eq(excluded(ad::approach_speed_minimum_knot)),
                        ad::approach_speed_maximum_knot.eq(excluded(ad::approach_speed_maximum_knot)),
                        ad::wingspan_ft_without_winglets_sharklets.eq(excluded(ad::wingspan_ft_without_winglets_sharklets)),
                        ad::wingspan_ft_with_winglets_sharklets.eq(excluded(ad::wingspan_ft_with_winglets_sharklets)),
                        ad::length_ft.eq(excluded(ad::length_ft)),
                        ad::tail_height_at_oew_ft.eq(excluded(ad::tail_height_at_oew_ft)),
                        ad::wheelbase_ft.eq(excluded(ad::wheelbase_ft)),
                        ad::cockpit_to_main_gear_ft.eq(excluded(ad::cockpit_to_main_gear_ft)),
                        ad::main_gear_width_ft.eq(excluded(ad::main_gear_width_ft)),
                        ad::mtow_lb.eq(excluded(ad::mtow_lb)),
                        ad::malw_lb.eq(excluded(ad::malw_lb)),
                        ad::main_gear_config.eq(excluded(ad::main_gear_config)),
                        ad::icao_wtc.eq(excluded(ad::icao_wtc)),
                        ad::parking_area_ft2.eq(excluded(ad::parking_area_ft2)),
                        ad::class.eq(excluded(ad::class)),
                        ad::faa_weight.eq(excluded(ad::faa_weight)),
                        ad::cwt.eq(excluded(ad::cwt)),
                        ad::one_half_wake_category.eq(excluded(ad::one_half_wake_category)),
                        ad::two_wake_category_appx_a.eq(excluded(ad::two_wake_category_appx_a)),
                        ad::two_wake_category_appx_b.eq(excluded(ad::two_wake_category_appx_b)),
                        ad::rotor_diameter_ft.eq(excluded(ad::rotor_diameter_ft)),
                        ad::srs.eq(excluded(ad::srs)),
                        ad::lahso.eq(excluded(ad::lahso)),
                        ad::faa_registry.eq(excluded(ad::faa_registry)),
                        ad::registration_count.eq(excluded(ad::registration_count)),
                        ad::tmfs_operations_fy24.eq(excluded(ad::tmfs_operations_fy24)),
                        ad::remarks.eq(excluded(ad::remarks)),
                        ad::last_update.eq(excluded(ad::last_update)),
                        ad::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .map_err(|e| query_error(e, budget))
        })
        .await?
    }

    /// One page of rows plus the total matching the same filter.
    ///
    /// Both queries run in a single read-only REPEATABLE READ transaction so the
    /// total and the page come from the same snapshot.
    pub async fn search_paginated(&self, request: PageRequest) -> Result<PageResult, StoreError> {
        let pool = self.pool.clone();
        let budget = self.statement_timeout;
        let deadline = Instant::now() + budget;

        tokio::task::spawn_blocking(move || -> Result<PageResult, StoreError> {
            let mut conn = pool.get()?;
            let remaining = remaining_budget(deadline, budget)?;
            let pattern = request.filter.as_deref().map(like_pattern);
            debug!(
                "Searching aircraft_data pattern={:?} limit={} offset={}",
                pattern, request.limit, request.offset
            );

            let (models, total) = conn
                .build_transaction()
                .read_only()
                .repeatable_read()
                .run(|conn| -> QueryResult<(Vec<AircraftDataModel>, i64)> {
                    set_local_statement_timeout(conn, remaining)?;

                    let mut count_query = aircraft_data::table.into_boxed();
                    let mut rows_query = aircraft_data::table.into_boxed();
                    if let Some(pattern) = &pattern {
                        count_query = count_query.filter(search_predicate(pattern));
                        rows_query = rows_query.filter(search_predicate(pattern));
                    }

                    let total = count_query.count().get_result::<i64>(conn)?;
                    let models = rows_query
                        .order((
                            aircraft_data::manufacturer.asc(),
                            aircraft_data::model_faa.asc(),
                            aircraft_data::icao_code.asc(),
                            aircraft_data::faa_designator.asc(),
                        ))
                        .limit(request.limit)
                        .offset(request.offset)
                        .select(AircraftDataModel::as_select())
                        .load::<AircraftDataModel>(conn)?;

                    Ok((models, total))
                })
                .map_err(|e| query_error(e, budget))?;

            Ok(PageResult {
                rows: models.into_iter().map(StoredAircraft::from).collect(),
                total,
            })
        })
        .await?
    }

    pub async fn find_by_key(&self, key: AircraftKey) -> Result<Option<StoredAircraft>, StoreError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<StoredAircraft>, StoreError> {
            let mut conn = pool.get()?;
            let model = aircraft_data::table
                .filter(aircraft_data::icao_code.eq(&key.icao_code))
                .filter(aircraft_data::faa_designator.eq(&key.faa_designator))
                .select(AircraftDataModel::as_select())
                .first::<AircraftDataModel>(&mut conn)
                .optional()?;

            Ok(model.map(StoredAircraft::from))
        })
        .await?
    }

    pub async fn find_by_id(&self, aircraft_id: i32) -> Result<Option<StoredAircraft>, StoreError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<StoredAircraft>, StoreError> {
            let mut conn = pool.get()?;
            let model = aircraft_data::table
                .find(aircraft_id)
                .select(AircraftDataModel::as_select())
                .first::<AircraftDataModel>(&mut conn)
                .optional()?;

            Ok(model.map(StoredAircraft::from))
        })
        .await?
    }

    /// Get the total count of aircraft records in the database
    pub async fn get_aircraft_data_count(&self) -> Result<i64, StoreError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<i64, StoreError> {
            let mut conn = pool.get()?;
            let count = aircraft_data::table.count().get_result::<i64>(&mut conn)?;
            Ok(count)
        })
        .await?
    }

    pub async fn delete_all(&self) -> Result<usize, StoreError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<usize, StoreError> {
            let mut conn = pool.get()?;
            let deleted = diesel::delete(aircraft_data::table).execute(&mut conn)?;
            Ok(deleted)
        })
        .await?
    }

    pub async fn delete_by_key(&self, key: AircraftKey) -> Result<bool, StoreError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<bool, StoreError> {
            let mut conn = pool.get()?;
            let deleted = diesel::delete(
                aircraft_data::table
                    .filter(aircraft_data::icao_code.eq(&key.icao_code))
                    .filter(aircraft_data::faa_designator.eq(&key.faa_designator)),
            )
            .execute(&mut conn)?;
            Ok(deleted > 0)
        })
        .await?
    }
}

#[async_trait]
impl AircraftStore for AircraftDataRepository {
    async fn upsert(&self, record: &AircraftRecord) -> Result<(), StoreError> {
        self.upsert_record(record.clone()).await
    }

    async fn page(&self, request: &PageRequest) -> Result<PageResult, StoreError> {
        self.search_paginated(request.clone()).await
    }

    async fn get_by_key(&self, key: &AircraftKey) -> Result<Option<StoredAircraft>, StoreError> {
        self.find_by_key(key.clone()).await
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<StoredAircraft>, StoreError> {
        self.find_by_id(id).await
    }

    async fn count_all(&self) -> Result<i64, StoreError> {
        self.get_aircraft_data_count().await
    }

    async fn clear_all(&self) -> Result<usize, StoreError> {
        self.delete_all().await
    }

    async fn delete_by_key(&self, key: &AircraftKey) -> Result<bool, StoreError> {
        AircraftDataRepository::delete_by_key(self, key.clone()).await
    }
}
