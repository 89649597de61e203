//! Error type for `budget-engine`.

use budget_core::store::{StoreError, StoreErrorKind};
use thiserror::Error;

/// The failure class of an [`EngineError`], for callers that branch on kind
/// rather than on detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotConnected,
  Unauthenticated,
  NotFound,
  InvalidAmount,
  LimitExceeded,
  Invalid,
  Conflict,
  Store,
}

#[derive(Debug, Error)]
pub enum EngineError {
  /// The store stayed unreachable through every retry attempt.
  #[error("store not reachable: {0}")]
  NotConnected(String),

  #[error("no authenticated user: {0}")]
  Unauthenticated(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid amount: {0}")]
  InvalidAmount(String),

  /// Category limits add up to more than the budget's total.
  #[error("limit exceeded: {0}")]
  LimitExceeded(String),

  #[error("invalid request: {0}")]
  Invalid(String),

  /// A concurrent writer won the optimistic version check, twice.
  #[error("conflicting concurrent write: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(String),
}

impl EngineError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotConnected(_) => ErrorKind::NotConnected,
      Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
      Self::LimitExceeded(_) => ErrorKind::LimitExceeded,
      Self::Invalid(_) => ErrorKind::Invalid,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::Store(_) => ErrorKind::Store,
    }
  }

  pub(crate) fn from_store<E: StoreError>(op: &str, err: E) -> Self {
    let detail = format!("{op}: {err}");
    match err.kind() {
      StoreErrorKind::Unavailable => Self::NotConnected(detail),
      StoreErrorKind::Conflict => Self::Conflict(detail),
      StoreErrorKind::Other => Self::Store(detail),
    }
  }
}

impl From<budget_core::Error> for EngineError {
  fn from(err: budget_core::Error) -> Self {
    use budget_core::Error as E;
    let detail = err.to_string();
    match err {
      E::NonPositiveAmount(_)
      | E::NegativeLimit(_)
      | E::AmountTooLarge(_)
      | E::SpendOverflow => Self::InvalidAmount(detail),
      E::CategoryLimitsExceedTotal { .. } => Self::LimitExceeded(detail),
      E::EmptyUserId => Self::Unauthenticated(detail),
      E::DuplicateCategory(_)
      | E::InvalidThresholds { .. }
      | E::InvalidAnchorDay(_)
      | E::InvalidPeriodKey(_)
      | E::EndBeforeAnchor { .. } => Self::Invalid(detail),
    }
  }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
