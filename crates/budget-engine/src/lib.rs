//! The budget & recurring-obligation engine.
//!
//! [`Engine`] wires a [`LedgerStore`] together with an injected clock,
//! notification sink, and settings provider, and exposes the operations
//! callers use: budget setting, transaction recording/deletion, obligation
//! scheduling, and trust scoring.
//!
//! Concurrency model:
//! - budget mutations serialize per `(user, period)`;
//! - obligation processing serializes per obligation id, taking the budget
//!   lock second, never the other way round;
//! - every write is one atomic store batch guarded by optimistic versions, so
//!   independent processes sharing a store stay consistent too.

pub mod error;
pub mod retry;
pub mod sink;

mod budgets;
mod locks;
mod obligations;


use std::{
  future::Future,
  sync::{Arc, Mutex, PoisonError},
};

use budget_core::{
  aggregate::{Sign, TierChange, apply_transaction},
  alert::{AlertContext, AlertDeduper, AlertEvent},
  budget::Budget,
  clock::Clock,
  notify::NotificationSink,
  period::PeriodKey,
  settings::{SettingsProvider, UserSettings},
  store::{LedgerStore, WriteOp},
  transaction::Transaction,
  user::UserId,
};
use uuid::Uuid;

pub use budgets::RecordOutcome;
pub use error::{EngineError, ErrorKind, Result};
pub use obligations::{MaterializeOutcome, TickFailure, TickReport};
pub use retry::RetryPolicy;

use locks::KeyedLocks;

/// Upper bound on occurrences one obligation may materialize per tick.
pub const DEFAULT_CATCH_UP_CAP: usize = 120;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
  pub retry:        RetryPolicy,
  pub catch_up_cap: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self { retry: RetryPolicy::default(), catch_up_cap: DEFAULT_CATCH_UP_CAP }
  }
}

/// The collaborators an engine is constructed with.
#[derive(Clone)]
pub struct Collaborators {
  pub clock:    Arc<dyn Clock>,
  pub sink:     Arc<dyn NotificationSink>,
  pub settings: Arc<dyn SettingsProvider>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Cloning is cheap; all state is reference-counted.
pub struct Engine<S> {
  inner: Arc<Inner<S>>,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

struct Inner<S> {
  store:            S,
  collab:           Collaborators,
  config:           EngineConfig,
  budget_locks:     KeyedLocks<(UserId, PeriodKey)>,
  obligation_locks: KeyedLocks<Uuid>,
  alerts:           Mutex<AlertDeduper>,
}

/// A budget batch that was committed, and what it changed.
pub(crate) struct BudgetUpdate {
  pub budget:  Option<Budget>,
  pub changes: Vec<TierChange>,
}

impl<S: LedgerStore> Engine<S> {
  pub fn new(store: S, collab: Collaborators) -> Self {
    Self::with_config(store, collab, EngineConfig::default())
  }

  pub fn with_config(store: S, collab: Collaborators, config: EngineConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        collab,
        config,
        budget_locks: KeyedLocks::new(),
        obligation_locks: KeyedLocks::new(),
        alerts: Mutex::new(AlertDeduper::new()),
      }),
    }
  }

  pub fn store(&self) -> &S { &self.inner.store }

  pub fn config(&self) -> &EngineConfig { &self.inner.config }

  pub fn settings_for(&self, user: &UserId) -> UserSettings {
    self.inner.collab.settings.settings(user)
  }

  pub fn clock(&self) -> &dyn Clock { self.inner.collab.clock.as_ref() }

  // ── Store access ──────────────────────────────────────────────────────

  /// Run a store call under the retry policy.
  pub(crate) async fn retrying<T, F, Fut>(&self, name: &str, op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, S::Error>>,
  {
    retry::with_retry(&self.inner.config.retry, name, op).await
  }

  pub(crate) async fn commit(&self, name: &str, ops: Vec<WriteOp>) -> Result<()> {
    let store = &self.inner.store;
    let ops = &ops;
    self.retrying(name, move || store.run_atomic(ops.clone())).await
  }

  pub(crate) async fn load_budget(&self, user: &UserId, period: PeriodKey) -> Result<Option<Budget>> {
    let store = &self.inner.store;
    self.retrying("get_budget", move || store.get_budget(user, period)).await
  }

  /// Read the budget `tx` belongs to, apply it with `sign`, and commit the
  /// result together with `ops` in one batch.
  ///
  /// Caller holds the budget lock for `(tx.user_id, period)`.
  pub(crate) async fn commit_with_budget(
    &self,
    name: &str,
    tx: &Transaction,
    period: PeriodKey,
    sign: Sign,
    mut ops: Vec<WriteOp>,
  ) -> Result<BudgetUpdate> {
    let policy = self.settings_for(&tx.user_id).category_policy;
    let mut budget = self.load_budget(&tx.user_id, period).await?;
    let mut changes = Vec::new();

    if let Some(b) = budget.as_mut()
      && tx.is_expense()
    {
      let expected = b.version;
      changes = apply_transaction(b, tx, sign, policy)?;
      b.version += 1;
      b.updated_at = self.clock().now();
      ops.push(WriteOp::PutBudget { budget: b.clone(), expected_version: Some(expected) });
    }

    self.commit(name, ops).await?;
    Ok(BudgetUpdate { budget, changes })
  }

  // ── Alerts ────────────────────────────────────────────────────────────

  /// Turn committed tier changes into alert events and hand them to the
  /// sink. Delivery failures are logged and otherwise ignored.
  pub(crate) fn dispatch_alerts(&self, budget: &Budget, changes: &[TierChange]) -> Vec<AlertEvent> {
    if changes.is_empty() {
      return Vec::new();
    }
    let ctx = AlertContext::from(budget);
    let events: Vec<AlertEvent> = {
      let mut dedupe = self.inner.alerts.lock().unwrap_or_else(PoisonError::into_inner);
      changes
        .iter()
        .filter_map(|c| dedupe.observe(c, &ctx, &budget.user_id, budget.period))
        .collect()
    };

    for event in &events {
      if let Err(err) = self.inner.collab.sink.emit(event.clone()) {
        tracing::warn!(
          user = %event.user_id,
          period = %event.period,
          category = ?event.category,
          error = %err,
          "alert delivery failed"
        );
      }
    }
    events
  }

  /// Forget dedupe marks for periods older than the one before `current`.
  pub fn prune_alert_marks(&self, current: PeriodKey) {
    self.inner.alerts.lock().unwrap_or_else(PoisonError::into_inner).prune(current);
  }
}
