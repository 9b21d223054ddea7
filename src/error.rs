use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single storage call
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("storage call exceeded {0:?}")]
    Timeout(Duration),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Rejected(String),
}

/// Source-level import failures; these abort the whole import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to open workbook {path}: {reason}")]
    OpenWorkbook { path: PathBuf, reason: String },

    #[error("sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    #[error("malformed workbook: {0}")]
    MalformedWorkbook(String),

    #[error("no data rows found in source")]
    EmptySource,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search failed: {0}")]
    Store(#[from] StoreError),
}
