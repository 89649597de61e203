//! Per-period budgets and their category sub-limits.
//!
//! A [`Budget`] stores both the per-category `spent` accumulators and their
//! denormalised sum `spent_total`. The two are only ever written together by
//! [`crate::aggregate`], which keeps `spent_total == Σ category.spent`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  period::PeriodKey,
  settings::UserSettings,
  tier::{Tier, ratio_f64},
  transaction::{Category, MAX_AMOUNT},
  user::UserId,
};

/// Default fraction of a limit at which warning alerts start.
pub const DEFAULT_WARNING_THRESHOLD: Decimal = Decimal::from_parts(70, 0, 0, false, 2);
/// Default fraction of a limit at which alerts are raised as danger.
pub const DEFAULT_DANGER_THRESHOLD: Decimal = Decimal::from_parts(90, 0, 0, false, 2);

// ─── Category limit ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLimit {
  pub category: Category,
  pub limit:    Decimal,
  #[serde(default)]
  pub spent:    Decimal,
}

impl CategoryLimit {
  pub fn new(category: Category, limit: Decimal) -> Self {
    Self { category, limit, spent: Decimal::ZERO }
  }

  /// May be negative once the limit is overrun.
  pub fn remaining(&self) -> Decimal { self.limit - self.spent }

  pub fn ratio(&self) -> Option<f64> { ratio_f64(self.spent, self.limit) }

  pub fn tier(&self) -> Tier { Tier::of(self.spent, self.limit) }
}

// ─── Budget ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
  pub user_id:               UserId,
  pub period:                PeriodKey,
  pub total_limit:           Decimal,
  pub category_limits:       Vec<CategoryLimit>,
  pub spent_total:           Decimal,
  pub warning_threshold:     Decimal,
  pub danger_threshold:      Decimal,
  pub notifications_enabled: bool,
  /// Optimistic-concurrency counter; bumped on every successful write.
  pub version:               u64,
  pub created_at:            DateTime<Utc>,
  pub updated_at:            DateTime<Utc>,
}

impl Budget {
  /// A fresh budget with nothing spent, thresholds taken from `settings`.
  pub fn new(
    user_id: UserId,
    period: PeriodKey,
    total_limit: Decimal,
    category_limits: Vec<CategoryLimit>,
    settings: &UserSettings,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      user_id,
      period,
      total_limit,
      category_limits: category_limits
        .into_iter()
        .map(|c| CategoryLimit::new(c.category, c.limit))
        .collect(),
      spent_total: Decimal::ZERO,
      warning_threshold: settings.warning_threshold,
      danger_threshold: settings.danger_threshold,
      notifications_enabled: settings.notifications_enabled,
      version: 0,
      created_at: now,
      updated_at: now,
    }
  }

  /// Clone this budget's limits and thresholds into `period` with all spend
  /// accumulators reset.
  pub fn rolled_into(&self, period: PeriodKey, now: DateTime<Utc>) -> Self {
    Self {
      user_id: self.user_id.clone(),
      period,
      total_limit: self.total_limit,
      category_limits: self
        .category_limits
        .iter()
        .map(|c| CategoryLimit::new(c.category, c.limit))
        .collect(),
      spent_total: Decimal::ZERO,
      warning_threshold: self.warning_threshold,
      danger_threshold: self.danger_threshold,
      notifications_enabled: self.notifications_enabled,
      version: 0,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn category(&self, category: Category) -> Option<&CategoryLimit> {
    self.category_limits.iter().find(|c| c.category == category)
  }

  pub fn remaining(&self) -> Decimal { self.total_limit - self.spent_total }

  pub fn ratio(&self) -> Option<f64> { ratio_f64(self.spent_total, self.total_limit) }

  pub fn tier(&self) -> Tier { Tier::of(self.spent_total, self.total_limit) }

  /// Σ of the category accumulators; equals `spent_total` for any budget the
  /// aggregator has written.
  pub fn category_spent_sum(&self) -> Decimal {
    self
      .category_limits
      .iter()
      .fold(Decimal::ZERO, |acc, c| acc.saturating_add(c.spent))
  }

  /// Replace limits in place, keeping the spend recorded so far.
  ///
  /// Categories that carry spend are kept even when absent from `limits`
  /// (with a zero limit) so the accumulator invariant is preserved.
  pub fn replace_limits(&mut self, total_limit: Decimal, limits: Vec<CategoryLimit>) {
    let mut next: Vec<CategoryLimit> = limits
      .into_iter()
      .map(|c| CategoryLimit {
        category: c.category,
        limit:    c.limit,
        spent:    self.category(c.category).map_or(Decimal::ZERO, |old| old.spent),
      })
      .collect();
    for old in &self.category_limits {
      if old.spent > Decimal::ZERO && !next.iter().any(|c| c.category == old.category) {
        next.push(CategoryLimit { category: old.category, limit: Decimal::ZERO, spent: old.spent });
      }
    }
    self.total_limit = total_limit;
    self.category_limits = next;
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Validate the inputs of a budget-setting call. Runs before any mutation.
pub fn validate_limits(total_limit: Decimal, limits: &[CategoryLimit]) -> Result<()> {
  check_limit(total_limit)?;
  let mut seen = Vec::with_capacity(limits.len());
  let mut sum = Decimal::ZERO;
  for c in limits {
    check_limit(c.limit)?;
    if seen.contains(&c.category) {
      return Err(Error::DuplicateCategory(c.category));
    }
    seen.push(c.category);
    sum = sum.checked_add(c.limit).ok_or(Error::SpendOverflow)?;
  }
  if sum > total_limit {
    return Err(Error::CategoryLimitsExceedTotal { sum, total: total_limit });
  }
  Ok(())
}

fn check_limit(limit: Decimal) -> Result<()> {
  if limit < Decimal::ZERO {
    return Err(Error::NegativeLimit(limit));
  }
  if limit > MAX_AMOUNT {
    return Err(Error::AmountTooLarge(limit));
  }
  Ok(())
}

/// Thresholds must be ordered fractions in `(0, 1]`.
pub fn validate_thresholds(warning: Decimal, danger: Decimal) -> Result<()> {
  if warning <= Decimal::ZERO || warning > danger || danger > Decimal::ONE {
    return Err(Error::InvalidThresholds { warning, danger });
  }
  Ok(())
}
