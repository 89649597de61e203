//! Per-user configuration consumed by the engine.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  budget::{DEFAULT_DANGER_THRESHOLD, DEFAULT_WARNING_THRESHOLD, validate_thresholds},
  period::PeriodResolver,
  user::UserId,
};

/// What the aggregator does with an expense whose category has no limit in
/// the period's budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPolicy {
  /// Add a zero-limit entry for the category.
  #[default]
  CreateOnDemand,
  /// Book the spend against the `other` category, creating it if needed.
  FoldIntoOther,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
  pub warning_threshold:     Decimal,
  pub danger_threshold:      Decimal,
  pub notifications_enabled: bool,
  /// Day of month on which billing periods start; 1 means calendar months.
  pub billing_anchor_day:    u32,
  pub category_policy:       CategoryPolicy,
}

impl Default for UserSettings {
  fn default() -> Self {
    Self {
      warning_threshold:     DEFAULT_WARNING_THRESHOLD,
      danger_threshold:      DEFAULT_DANGER_THRESHOLD,
      notifications_enabled: true,
      billing_anchor_day:    1,
      category_policy:       CategoryPolicy::default(),
    }
  }
}

impl UserSettings {
  pub fn resolver(&self) -> PeriodResolver { PeriodResolver::new(self.billing_anchor_day) }

  /// Thresholds must satisfy `0 < warning <= danger <= 1` and the anchor day
  /// must name a day of the month.
  pub fn validate(&self) -> Result<()> {
    validate_thresholds(self.warning_threshold, self.danger_threshold)?;
    if !(1..=31).contains(&self.billing_anchor_day) {
      return Err(Error::InvalidAnchorDay(self.billing_anchor_day));
    }
    Ok(())
  }
}

/// Source of per-user settings.
pub trait SettingsProvider: Send + Sync {
  fn settings(&self, user: &UserId) -> UserSettings;
}

/// Settings fixed at construction: one default plus optional per-user
/// overrides.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
  default:   UserSettings,
  overrides: HashMap<UserId, UserSettings>,
}

impl StaticSettings {
  pub fn new(default: UserSettings) -> Self {
    Self { default, overrides: HashMap::new() }
  }

  pub fn with_override(mut self, user: UserId, settings: UserSettings) -> Self {
    self.overrides.insert(user, settings);
    self
  }
}

impl SettingsProvider for StaticSettings {
  fn settings(&self, user: &UserId) -> UserSettings {
    self.overrides.get(user).cloned().unwrap_or_else(|| self.default.clone())
  }
}
