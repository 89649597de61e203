//! Trust score: a composite 0–100 indicator of financial health.
//!
//! Computed from a snapshot only. The period window is passed in, never read
//! from a clock, so identical inputs always produce the identical score.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{
  budget::Budget,
  obligation::RecurringObligation,
  period::PeriodKey,
  schedule::occurrences_between,
  tier::ratio_f64,
  transaction::{Category, Transaction, TransactionKind},
};

pub const ADHERENCE_MAX: f64 = 30.0;
pub const REGULARITY_MAX: f64 = 25.0;
pub const SAVINGS_MAX: f64 = 25.0;
pub const BALANCE_MAX: f64 = 20.0;

/// A manual payment dated up to this many days after an occurrence of a
/// matching obligation counts as on time.
pub const ON_TIME_GRACE_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Grade {
  Excellent,
  Good,
  Fair,
  Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
  pub period:             PeriodKey,
  pub score:              f64,
  pub grade:              Grade,
  pub budget_adherence:   f64,
  pub payment_regularity: f64,
  pub savings_rate:       f64,
  pub category_balance:   f64,
}

/// Everything the calculator looks at.
#[derive(Debug, Clone, Copy)]
pub struct TrustInputs<'a> {
  pub period:       PeriodKey,
  /// Half-open `[start, end)` window of `period`.
  pub window:       (NaiveDate, NaiveDate),
  pub budget:       Option<&'a Budget>,
  pub obligations:  &'a [RecurringObligation],
  /// Transactions dated inside `window`.
  pub transactions: &'a [Transaction],
}

pub fn compute(inputs: &TrustInputs<'_>) -> TrustScore {
  let budget_adherence = adherence(inputs.budget);
  let payment_regularity = regularity(inputs.obligations, inputs.transactions, inputs.window);
  let savings_rate = savings(inputs.transactions);
  let category_balance = balance(inputs.transactions);

  let total = budget_adherence + payment_regularity + savings_rate + category_balance;
  let score = round1(total.clamp(0.0, 100.0));

  TrustScore {
    period: inputs.period,
    score,
    grade: grade(score),
    budget_adherence: round1(budget_adherence),
    payment_regularity: round1(payment_regularity),
    savings_rate: round1(savings_rate),
    category_balance: round1(category_balance),
  }
}

fn grade(score: f64) -> Grade {
  match score {
    s if s >= 80.0 => Grade::Excellent,
    s if s >= 60.0 => Grade::Good,
    s if s >= 40.0 => Grade::Fair,
    _ => Grade::Poor,
  }
}

// ─── Budget adherence ────────────────────────────────────────────────────────

fn adherence(budget: Option<&Budget>) -> f64 {
  let Some(budget) = budget else {
    return ADHERENCE_MAX / 2.0;
  };

  let ratios: Vec<f64> = budget
    .category_limits
    .iter()
    .filter_map(|c| ratio_f64(c.spent, c.limit))
    .collect();

  let scores: Vec<f64> = if ratios.is_empty() {
    match budget.ratio() {
      Some(r) => vec![adherence_factor(r)],
      None => return ADHERENCE_MAX / 2.0,
    }
  } else {
    ratios.into_iter().map(adherence_factor).collect()
  };

  let mean = scores.iter().sum::<f64>() / scores.len() as f64;
  (mean * ADHERENCE_MAX).clamp(0.0, ADHERENCE_MAX)
}

/// Per-category factor in `[-1, 1]`.
fn adherence_factor(ratio: f64) -> f64 {
  match ratio {
    r if r <= 0.70 => 1.0,
    r if r <= 0.85 => lerp(r, 0.70, 0.85, 1.0, 0.75),
    r if r <= 1.00 => lerp(r, 0.85, 1.00, 0.75, 0.40),
    r if r <= 1.10 => lerp(r, 1.00, 1.10, 0.40, 0.0),
    r => (-(r - 1.10) * 2.0).max(-1.0),
  }
}

// ─── Payment regularity ──────────────────────────────────────────────────────

fn regularity(
  obligations: &[RecurringObligation],
  transactions: &[Transaction],
  window: (NaiveDate, NaiveDate),
) -> f64 {
  let active_fraction = if obligations.is_empty() {
    1.0
  } else {
    obligations.iter().filter(|o| o.is_active).count() as f64 / obligations.len() as f64
  };

  let mut relevant = 0usize;
  let mut on_time = 0usize;
  for tx in transactions {
    if tx.origin.is_generated() {
      relevant += 1;
      on_time += 1;
      continue;
    }
    let matching: Vec<&RecurringObligation> = obligations
      .iter()
      .filter(|o| o.category == tx.category && o.kind == tx.kind)
      .collect();
    if matching.is_empty() {
      continue;
    }
    relevant += 1;
    if matching.iter().any(|o| paid_on_time(o, tx.date, window)) {
      on_time += 1;
    }
  }
  let on_time_fraction = if relevant == 0 { 1.0 } else { on_time as f64 / relevant as f64 };

  REGULARITY_MAX * (0.4 * active_fraction + 0.6 * on_time_fraction)
}

fn paid_on_time(ob: &RecurringObligation, paid: NaiveDate, window: (NaiveDate, NaiveDate)) -> bool {
  let from = window.0 - chrono::Duration::days(ON_TIME_GRACE_DAYS);
  occurrences_between(ob.frequency, ob.anchor_date, ob.end_date, from, window.1)
    .any(|due| paid >= due && (paid - due).num_days() <= ON_TIME_GRACE_DAYS)
}

// ─── Savings rate ────────────────────────────────────────────────────────────

fn savings(transactions: &[Transaction]) -> f64 {
  let (income, expense) = totals(transactions);
  if income <= Decimal::ZERO {
    return if expense > Decimal::ZERO { 0.0 } else { 10.0 };
  }
  // Only a deficit many orders larger than income can overflow the division.
  let rate = (income - expense)
    .checked_div(income)
    .and_then(|r| r.to_f64())
    .unwrap_or(-1.0);
  savings_points(rate)
}

fn savings_points(rate: f64) -> f64 {
  match rate {
    r if r >= 0.30 => SAVINGS_MAX,
    r if r >= 0.20 => lerp(r, 0.20, 0.30, 20.0, 25.0),
    r if r >= 0.10 => lerp(r, 0.10, 0.20, 15.0, 20.0),
    r if r >= 0.0 => lerp(r, 0.0, 0.10, 10.0, 15.0),
    r => (10.0 * (1.0 + r)).max(0.0),
  }
}

fn totals(transactions: &[Transaction]) -> (Decimal, Decimal) {
  transactions.iter().fold((Decimal::ZERO, Decimal::ZERO), |(inc, exp), tx| match tx.kind {
    TransactionKind::Income => (inc.saturating_add(tx.amount), exp),
    TransactionKind::Expense => (inc, exp.saturating_add(tx.amount)),
  })
}

// ─── Category balance ────────────────────────────────────────────────────────

fn balance(transactions: &[Transaction]) -> f64 {
  let mut by_category: HashMap<Category, Decimal> = HashMap::new();
  for tx in transactions.iter().filter(|t| t.is_expense()) {
    let spent = by_category.entry(tx.category).or_default();
    *spent = spent.saturating_add(tx.amount);
  }
  let total = by_category.values().fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v));
  if total <= Decimal::ZERO {
    return BALANCE_MAX / 2.0;
  }

  let diversity = 10.0 * (by_category.len().min(5) as f64) / 5.0;

  let max_share = by_category
    .values()
    .filter_map(|v| v.checked_div(total).and_then(|r| r.to_f64()))
    .fold(0.0_f64, f64::max);
  let concentration = if max_share > 0.40 {
    10.0 - 10.0 * (max_share - 0.40) / 0.60
  } else {
    10.0
  };

  (diversity + concentration).clamp(0.0, BALANCE_MAX)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
  y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

fn round1(v: f64) -> f64 { (v * 10.0).round() / 10.0 }
