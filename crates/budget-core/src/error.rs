//! Error types for `budget-core`.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::transaction::Category;

/// Validation failures raised by the pure layer, before anything is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("amount must be greater than zero, got {0}")]
  NonPositiveAmount(Decimal),

  #[error("limit must not be negative, got {0}")]
  NegativeLimit(Decimal),

  #[error("{0} is above the largest supported amount")]
  AmountTooLarge(Decimal),

  #[error("spend accumulator would overflow")]
  SpendOverflow,

  #[error("category limits sum to {sum}, over the total limit {total}")]
  CategoryLimitsExceedTotal { sum: Decimal, total: Decimal },

  #[error("category {0} is listed more than once")]
  DuplicateCategory(Category),

  #[error("thresholds must satisfy 0 < warning <= danger <= 1, got {warning} / {danger}")]
  InvalidThresholds { warning: Decimal, danger: Decimal },

  #[error("user id must not be empty")]
  EmptyUserId,

  #[error("billing anchor day must be within 1..=31, got {0}")]
  InvalidAnchorDay(u32),

  #[error("invalid period key: {0:?}")]
  InvalidPeriodKey(String),

  #[error("end date {end} precedes anchor date {anchor}")]
  EndBeforeAnchor {
    anchor: chrono::NaiveDate,
    end:    chrono::NaiveDate,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
