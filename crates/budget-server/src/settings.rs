//! Server configuration, layered from an optional TOML file and `BUDGET_*`
//! environment variables.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! store_path = "~/.local/share/budget/ledger.db"
//! tick_interval_secs = 3600
//!
//! [retry]
//! attempts = 3
//! base_delay_ms = 2000
//!
//! [defaults]
//! warning_threshold = "0.70"
//! billing_anchor_day = 1
//!
//! [users.alice]
//! billing_anchor_day = 15
//! category_policy = "fold_into_other"
//! ```
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `BUDGET_RETRY__ATTEMPTS=5`.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use budget_core::{
  settings::{StaticSettings, UserSettings},
  user::UserId,
};
use budget_engine::{DEFAULT_CATCH_UP_CAP, EngineConfig, RetryPolicy};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Seconds between scheduling ticks. `0` disables the periodic tick; the
  /// startup tick always runs.
  pub tick_interval_secs: u64,
  pub catch_up_cap:       usize,
  pub retry:              RetryPolicy,
  pub defaults:           UserSettings,
  pub users:              HashMap<String, UserSettings>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "127.0.0.1".to_string(),
      port:               8080,
      store_path:         PathBuf::from("~/.local/share/budget/ledger.db"),
      tick_interval_secs: 3600,
      catch_up_cap:       DEFAULT_CATCH_UP_CAP,
      retry:              RetryPolicy::default(),
      defaults:           UserSettings::default(),
      users:              HashMap::new(),
    }
  }
}

impl ServerConfig {
  /// Layer the file at `path` (if present) under the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_builder(Config::builder().add_source(File::from(path).required(false)))
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> Result<Self, ConfigError> {
    let cfg: Self = builder
      .add_source(
        Environment::with_prefix("BUDGET")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  /// Reject settings the engine would otherwise apply silently.
  fn validate(&self) -> Result<(), ConfigError> {
    self
      .defaults
      .validate()
      .map_err(|err| ConfigError::Message(format!("defaults: {err}")))?;
    for (user, settings) in &self.users {
      settings
        .validate()
        .map_err(|err| ConfigError::Message(format!("users.{user}: {err}")))?;
    }
    Ok(())
  }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig { retry: self.retry, catch_up_cap: self.catch_up_cap }
  }

  /// The settings provider for this server. Blank user keys are skipped.
  pub fn settings_provider(&self) -> StaticSettings {
    self.users.iter().fold(StaticSettings::new(self.defaults.clone()), |acc, (raw, settings)| {
      match UserId::new(raw.as_str()) {
        Ok(user) => acc.with_override(user, settings.clone()),
        Err(err) => {
          tracing::warn!(user = %raw, error = %err, "ignoring settings override");
          acc
        }
      }
    })
  }
}
