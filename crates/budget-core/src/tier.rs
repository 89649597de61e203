//! Spend tiers: the discretisation of `spent / limit` that drives alerts.

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

/// Severity bucket for a spend ratio. Ordered from least to most severe.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
  strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Tier {
  Safe,
  QuarterWarning,
  HalfWarning,
  CriticalWarning,
  Danger,
}

const QUARTER: Decimal = Decimal::from_parts(50, 0, 0, false, 2);
const HALF: Decimal = Decimal::from_parts(75, 0, 0, false, 2);
const CRITICAL: Decimal = Decimal::from_parts(85, 0, 0, false, 2);

impl Tier {
  /// Tier for a ratio. Bands are closed at the bottom, so a ratio sitting
  /// exactly on a boundary lands in the more severe tier.
  pub fn from_ratio(ratio: Decimal) -> Self {
    if ratio < QUARTER {
      Self::Safe
    } else if ratio < HALF {
      Self::QuarterWarning
    } else if ratio < CRITICAL {
      Self::HalfWarning
    } else if ratio < Decimal::ONE {
      Self::CriticalWarning
    } else {
      Self::Danger
    }
  }

  /// Tier for a `(spent, limit)` pair. A zero limit is `Danger` as soon as
  /// anything is spent against it.
  pub fn of(spent: Decimal, limit: Decimal) -> Self {
    match spend_ratio(spent, limit) {
      Some(ratio) => Self::from_ratio(ratio),
      None if spent > Decimal::ZERO => Self::Danger,
      None => Self::Safe,
    }
  }
}

/// `spent / limit`, or `None` when the limit is not positive.
pub fn spend_ratio(spent: Decimal, limit: Decimal) -> Option<Decimal> {
  if limit <= Decimal::ZERO {
    return None;
  }
  spent.checked_div(limit)
}

/// Lossy ratio for display and scoring.
pub fn ratio_f64(spent: Decimal, limit: Decimal) -> Option<f64> {
  spend_ratio(spent, limit).and_then(|r| r.to_f64())
}
