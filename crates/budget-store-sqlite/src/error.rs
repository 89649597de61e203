//! Error type for `budget-store-sqlite`.

use budget_core::store::{StoreError, StoreErrorKind};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A version check or uniqueness guard in an atomic batch failed; nothing
  /// in the batch was written.
  #[error("write conflict: {0}")]
  Conflict(String),
}

impl StoreError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Self::Database(e) if is_unavailable(e) => StoreErrorKind::Unavailable,
      Self::Conflict(_) => StoreErrorKind::Conflict,
      _ => StoreErrorKind::Other,
    }
  }
}

/// Failures that say "try again later" rather than "this request is wrong".
fn is_unavailable(err: &tokio_rusqlite::Error) -> bool {
  match err {
    tokio_rusqlite::Error::ConnectionClosed => true,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _)) => matches!(
      f.code,
      ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
    ),
    _ => false,
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
