//! Threshold alerts raised when spend escalates into a more severe tier.
//!
//! [`evaluate`] decides whether a single tier movement deserves an alert.
//! [`AlertDeduper`] tracks, per channel and period, the highest tier already
//! announced in the current escalation so repeated evaluations of the same
//! crossing do not alert twice.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
  aggregate::TierChange,
  budget::Budget,
  period::PeriodKey,
  tier::{Tier, spend_ratio},
  transaction::Category,
  user::UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
  Warning,
  Danger,
}

/// A dedupable "spend crossed into a new tier" signal. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
  pub user_id:  UserId,
  /// `None` for the whole-budget channel.
  pub category: Option<Category>,
  pub tier:     Tier,
  pub level:    AlertLevel,
  pub spent:    Decimal,
  pub limit:    Decimal,
  pub period:   PeriodKey,
}

/// Thresholds and switches an evaluation runs under, taken from the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertContext {
  pub warning_threshold:     Decimal,
  pub danger_threshold:      Decimal,
  pub notifications_enabled: bool,
}

impl From<&Budget> for AlertContext {
  fn from(b: &Budget) -> Self {
    Self {
      warning_threshold:     b.warning_threshold,
      danger_threshold:      b.danger_threshold,
      notifications_enabled: b.notifications_enabled,
    }
  }
}

/// Decide whether `change` warrants an alert.
///
/// Only escalations alert. An escalation below the warning threshold stays
/// silent unless it reached `Danger`.
pub fn evaluate(
  change: &TierChange,
  ctx: &AlertContext,
  user_id: &UserId,
  period: PeriodKey,
) -> Option<AlertEvent> {
  if !ctx.notifications_enabled || !change.is_escalation() {
    return None;
  }

  let ratio = spend_ratio(change.spent, change.limit);
  let reached_warning = ratio.is_none_or(|r| r >= ctx.warning_threshold);
  if !reached_warning && change.after != Tier::Danger {
    return None;
  }

  let level = match ratio {
    Some(r) if r < ctx.danger_threshold && change.after != Tier::Danger => AlertLevel::Warning,
    _ => AlertLevel::Danger,
  };

  Some(AlertEvent {
    user_id: user_id.clone(),
    category: change.category,
    tier: change.after,
    level,
    spent: change.spent,
    limit: change.limit,
    period,
  })
}

// ─── Deduplication ───────────────────────────────────────────────────────────

type ChannelKey = (UserId, PeriodKey, Option<Category>);

/// Highest tier announced per `(user, period, channel)` in the current
/// escalation.
#[derive(Debug, Default)]
pub struct AlertDeduper {
  announced: HashMap<ChannelKey, Tier>,
}

impl AlertDeduper {
  pub fn new() -> Self { Self::default() }

  /// Feed one tier movement; returns the event to emit, if any.
  ///
  /// A de-escalation lowers the channel's mark to the new tier, so rising
  /// back through a tier after dropping below it alerts again.
  pub fn observe(
    &mut self,
    change: &TierChange,
    ctx: &AlertContext,
    user_id: &UserId,
    period: PeriodKey,
  ) -> Option<AlertEvent> {
    let key = (user_id.clone(), period, change.category);

    if change.after < change.before {
      match self.announced.get_mut(&key) {
        Some(mark) if *mark > change.after => *mark = change.after,
        _ => {}
      }
      return None;
    }

    let event = evaluate(change, ctx, user_id, period)?;
    let mark = self.announced.entry(key).or_insert(Tier::Safe);
    if event.tier <= *mark {
      return None;
    }
    *mark = event.tier;
    Some(event)
  }

  /// Drop every mark for periods other than `keep` and its predecessor.
  pub fn prune(&mut self, keep: PeriodKey) {
    let previous = keep.previous();
    self.announced.retain(|(_, p, _), _| *p == keep || *p == previous);
  }

  #[cfg(test)]
  fn len(&self) -> usize { self.announced.len() }
}
