//! Budget aggregation: the single entry point that writes spend accumulators.
//!
//! [`apply_transaction`] updates a category's `spent` and the budget's
//! `spent_total` in lockstep and reports every tier that moved, which is the
//! input to [`crate::alert`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  budget::{Budget, CategoryLimit},
  settings::CategoryPolicy,
  tier::Tier,
  transaction::{Category, Transaction},
};

/// Whether a transaction is being added to or removed from a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
  Apply,
  Revert,
}

/// A tier movement on one alert channel. `category == None` is the
/// whole-budget channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
  pub category: Option<Category>,
  pub before:   Tier,
  pub after:    Tier,
  pub spent:    Decimal,
  pub limit:    Decimal,
}

impl TierChange {
  pub fn is_escalation(&self) -> bool { self.after > self.before }
}

/// Apply (or revert) `tx` against `budget`.
///
/// Income is ignored. Reverting never drives an accumulator below zero; the
/// delta actually applied to the category is the one added to the total, so
/// `spent_total == Σ category.spent` holds after every call. If either
/// accumulator would overflow the budget is left untouched.
pub fn apply_transaction(
  budget: &mut Budget,
  tx: &Transaction,
  sign: Sign,
  policy: CategoryPolicy,
) -> Result<Vec<TierChange>> {
  if !tx.is_expense() {
    return Ok(Vec::new());
  }

  let total_before = budget.tier();
  let category = target_category(budget, tx.category, policy);
  let existing = budget.category_limits.iter().position(|c| c.category == category);
  let entry = match existing {
    Some(i) => budget.category_limits[i].clone(),
    None => CategoryLimit::new(category, Decimal::ZERO),
  };

  let tier_before = entry.tier();
  let new_spent = match sign {
    Sign::Apply => entry.spent.checked_add(tx.amount).ok_or(Error::SpendOverflow)?,
    Sign::Revert => entry
      .spent
      .checked_sub(tx.amount)
      .ok_or(Error::SpendOverflow)?
      .max(Decimal::ZERO),
  };
  let applied = new_spent - entry.spent;
  let new_total = budget
    .spent_total
    .checked_add(applied)
    .ok_or(Error::SpendOverflow)?
    .max(Decimal::ZERO);

  let entry = CategoryLimit { spent: new_spent, ..entry };
  let tier_after = entry.tier();
  let (cat_spent, cat_limit) = (entry.spent, entry.limit);
  match existing {
    Some(i) => budget.category_limits[i] = entry,
    None => budget.category_limits.push(entry),
  }

  budget.spent_total = new_total;
  let total_after = budget.tier();

  let mut changes = Vec::new();
  if tier_before != tier_after {
    changes.push(TierChange {
      category: Some(category),
      before:   tier_before,
      after:    tier_after,
      spent:    cat_spent,
      limit:    cat_limit,
    });
  }
  if total_before != total_after {
    changes.push(TierChange {
      category: None,
      before:   total_before,
      after:    total_after,
      spent:    budget.spent_total,
      limit:    budget.total_limit,
    });
  }
  Ok(changes)
}

/// The category an expense is booked against under `policy`.
fn target_category(budget: &Budget, category: Category, policy: CategoryPolicy) -> Category {
  match policy {
    CategoryPolicy::CreateOnDemand => category,
    CategoryPolicy::FoldIntoOther if budget.category(category).is_some() => category,
    CategoryPolicy::FoldIntoOther => Category::Other,
  }
}
