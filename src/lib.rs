//! ACDB - FAA Aircraft Characteristics Database importer and search engine
//!
//! Reads the FAA Aircraft Characteristics workbook, upserts each row into
//! PostgreSQL keyed by (ICAO code, FAA designator), and serves paginated
//! free-text search over the stored records.

pub mod aircraft_data;
pub mod aircraft_data_repo;
pub mod coerce;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod log_format;
pub mod memory_store;
pub mod schema;
pub mod search;
pub mod store;
pub mod workbook;

pub use aircraft_data::{AircraftKey, AircraftRecord, StoredAircraft};
pub use aircraft_data_repo::AircraftDataRepository;
pub use config::AppConfig;
pub use error::{ImportError, SearchError, StoreError};
pub use import::{ImportDriver, ImportSummary};
pub use memory_store::MemoryAircraftStore;
pub use search::{SearchEngine, SearchPage};
pub use store::AircraftStore;
