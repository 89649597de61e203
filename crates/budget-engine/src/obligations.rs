//! Recurring obligations: CRUD, and materialization of due occurrences.
//!
//! An obligation's `last_processed` cursor is the single source of truth for
//! "already materialized up to here". Advancing it, inserting the generated
//! transaction, and adjusting the budget happen in one atomic batch guarded by
//! the obligation's version, under a per-obligation lock, so any number of
//! overlapping triggers produce each occurrence exactly once.

use budget_core::{
  aggregate::Sign,
  obligation::{NewObligation, RecurringObligation},
  store::{LedgerStore, ObligationQuery, WriteOp},
  transaction::Transaction,
  user::UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::instrument;
use uuid::Uuid;

use crate::{Engine, EngineError, Result};

/// What a single [`Engine::process_due`] call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MaterializeOutcome {
  /// One occurrence was turned into `transaction`. `exhausted` is set when it
  /// was the series' last occurrence and the obligation was deactivated.
  Materialized { transaction: Transaction, exhausted: bool },
  /// Nothing due yet.
  NotDue { next_due: NaiveDate },
  /// The obligation is paused or expired.
  Inactive,
  /// The series has no occurrence left; the obligation was deactivated.
  Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickFailure {
  pub obligation_id: Uuid,
  pub error:         String,
}

/// Summary of a scheduling tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
  pub materialized: Vec<Transaction>,
  /// Obligations deactivated because their series ended.
  pub exhausted:    Vec<Uuid>,
  pub failures:     Vec<TickFailure>,
}

impl TickReport {
  fn merge(&mut self, other: TickReport) {
    self.materialized.extend(other.materialized);
    self.exhausted.extend(other.exhausted);
    self.failures.extend(other.failures);
  }
}

impl<S: LedgerStore + 'static> Engine<S> {
  // ── CRUD ──────────────────────────────────────────────────────────────

  #[instrument(skip(self, input), fields(user = %input.user_id, title = %input.title))]
  pub async fn create_obligation(&self, input: NewObligation) -> Result<RecurringObligation> {
    input.validate()?;
    let mut obligation = input.into_obligation(self.clock().now());
    obligation.version = 1;
    self
      .commit("create_obligation", vec![WriteOp::PutObligation {
        obligation:       obligation.clone(),
        expected_version: None,
      }])
      .await?;
    tracing::info!(id = %obligation.id, frequency = %obligation.frequency, "obligation created");
    Ok(obligation)
  }

  pub async fn get_obligation(&self, user: &UserId, id: Uuid) -> Result<RecurringObligation> {
    let store = self.store();
    self
      .retrying("get_obligation", move || store.get_obligation(id))
      .await?
      .filter(|ob| &ob.user_id == user)
      .ok_or_else(|| EngineError::NotFound(format!("obligation {id}")))
  }

  pub async fn list_obligations(
    &self,
    user: &UserId,
    active_only: bool,
  ) -> Result<Vec<RecurringObligation>> {
    let store = self.store();
    let query = ObligationQuery { user_id: Some(user.clone()), active_only };
    let query = &query;
    self.retrying("list_obligations", move || store.list_obligations(query)).await
  }

  /// Stop materializing an obligation until it is resumed.
  pub async fn pause_obligation(&self, user: &UserId, id: Uuid) -> Result<RecurringObligation> {
    self.set_active(user, id, false).await
  }

  /// Re-enable a paused obligation. Occurrences that fell due while paused
  /// are materialized on the next tick.
  pub async fn resume_obligation(&self, user: &UserId, id: Uuid) -> Result<RecurringObligation> {
    self.set_active(user, id, true).await
  }

  #[instrument(skip(self), fields(user = %user, id = %id))]
  async fn set_active(&self, user: &UserId, id: Uuid, active: bool) -> Result<RecurringObligation> {
    let _guard = self.inner.obligation_locks.lock(id).await;
    match self.try_set_active(user, id, active).await {
      Err(EngineError::Conflict(detail)) => {
        tracing::warn!(%detail, "obligation write conflicted, retrying with a fresh read");
        self.try_set_active(user, id, active).await
      }
      other => other,
    }
  }

  async fn try_set_active(&self, user: &UserId, id: Uuid, active: bool) -> Result<RecurringObligation> {
    let current = self.get_obligation(user, id).await?;
    if active && current.next_due().is_none() {
      return Err(EngineError::Invalid(format!("obligation {id} has no occurrences left")));
    }
    if current.is_active == active {
      return Ok(current);
    }

    let mut next = current.clone();
    next.is_active = active;
    next.version += 1;
    self
      .commit("set_obligation_active", vec![WriteOp::PutObligation {
        obligation:       next.clone(),
        expected_version: Some(current.version),
      }])
      .await?;
    tracing::info!(active, "obligation state changed");
    Ok(next)
  }

  // ── Materialization ───────────────────────────────────────────────────

  /// Materialize the obligation's next occurrence if it is due at `now`.
  ///
  /// Processes at most one occurrence; see
  /// [`tick_recurring_obligations`](Self::tick_recurring_obligations) for
  /// catching up. Safe to call concurrently and repeatedly.
  #[instrument(skip(self), fields(user = %user, obligation = %id))]
  pub async fn process_due(
    &self,
    user: &UserId,
    id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<MaterializeOutcome> {
    let _guard = self.inner.obligation_locks.lock(id).await;
    match self.try_process_due(user, id, now).await {
      Err(EngineError::Conflict(detail)) => {
        tracing::warn!(%detail, "materialization conflicted, re-reading obligation");
        self.try_process_due(user, id, now).await
      }
      other => other,
    }
  }

  async fn try_process_due(
    &self,
    user: &UserId,
    id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<MaterializeOutcome> {
    let ob = self.get_obligation(user, id).await?;

    if !ob.is_active {
      tracing::debug!("skipped: obligation inactive");
      return Ok(MaterializeOutcome::Inactive);
    }

    let Some(due) = ob.next_due() else {
      self.deactivate(&ob).await?;
      tracing::info!("obligation exhausted, deactivated");
      return Ok(MaterializeOutcome::Exhausted);
    };

    if due > now.date_naive() {
      tracing::debug!(%due, "skipped: next occurrence not due yet");
      return Ok(MaterializeOutcome::NotDue { next_due: due });
    }

    let tx = ob.occurrence(due, self.clock().now());
    let mut advanced = ob.clone();
    advanced.last_processed = Some(due);
    advanced.version += 1;
    let exhausted = advanced.next_due().is_none();
    if exhausted {
      advanced.is_active = false;
    }

    // Held until the alerts are out, like a manual record.
    let period = self.settings_for(user).resolver().period_of(due);
    let budget_guard = self.inner.budget_locks.lock((user.clone(), period)).await;
    let update = self
      .commit_with_budget("materialize", &tx, period, Sign::Apply, vec![
        WriteOp::PutObligation { obligation: advanced, expected_version: Some(ob.version) },
        WriteOp::InsertTransaction(tx.clone()),
      ])
      .await?;

    if let Some(b) = &update.budget {
      self.dispatch_alerts(b, &update.changes);
    }
    drop(budget_guard);
    tracing::info!(%due, tx = %tx.id, exhausted, "occurrence materialized");
    Ok(MaterializeOutcome::Materialized { transaction: tx, exhausted })
  }

  async fn deactivate(&self, ob: &RecurringObligation) -> Result<()> {
    let mut next = ob.clone();
    next.is_active = false;
    next.version += 1;
    self
      .commit("deactivate_obligation", vec![WriteOp::PutObligation {
        obligation:       next,
        expected_version: Some(ob.version),
      }])
      .await
  }

  /// Materialize every due occurrence of one obligation, up to the
  /// catch-up cap.
  async fn catch_up(&self, user: &UserId, id: Uuid, now: DateTime<Utc>) -> TickReport {
    let mut report = TickReport::default();
    let cap = self.config().catch_up_cap;

    for _ in 0..cap {
      match self.process_due(user, id, now).await {
        Ok(MaterializeOutcome::Materialized { transaction, exhausted }) => {
          report.materialized.push(transaction);
          if exhausted {
            report.exhausted.push(id);
            return report;
          }
        }
        Ok(MaterializeOutcome::Exhausted) => {
          report.exhausted.push(id);
          return report;
        }
        Ok(MaterializeOutcome::NotDue { .. } | MaterializeOutcome::Inactive) => return report,
        Err(err) => {
          tracing::error!(obligation = %id, error = %err, kind = ?err.kind(), "materialization failed");
          report.failures.push(TickFailure { obligation_id: id, error: err.to_string() });
          return report;
        }
      }
    }

    tracing::warn!(obligation = %id, cap, "catch-up cap reached; remaining occurrences wait for the next tick");
    report
  }

  /// Drive materialization for every active obligation of `user`.
  ///
  /// Obligations are processed concurrently; each is caught up independently
  /// and a failure on one does not stop the others.
  #[instrument(skip(self), fields(user = %user))]
  pub async fn tick_recurring_obligations(&self, user: &UserId, now: DateTime<Utc>) -> Result<TickReport> {
    let obligations = self.list_obligations(user, true).await?;
    Ok(self.run_tick(obligations, now).await)
  }

  /// Drive materialization for every active obligation in the store.
  #[instrument(skip(self))]
  pub async fn tick_all(&self, now: DateTime<Utc>) -> Result<TickReport> {
    let store = self.store();
    let query = ObligationQuery { user_id: None, active_only: true };
    let query = &query;
    let obligations = self
      .retrying("list_obligations", move || store.list_obligations(query))
      .await?;
    let report = self.run_tick(obligations, now).await;
    self.prune_alert_marks(budget_core::period::PeriodResolver::default().period_of(now.date_naive()));
    Ok(report)
  }

  async fn run_tick(&self, obligations: Vec<RecurringObligation>, now: DateTime<Utc>) -> TickReport {
    let mut tasks = JoinSet::new();
    for ob in obligations {
      let engine = self.clone();
      tasks.spawn(async move { engine.catch_up(&ob.user_id, ob.id, now).await });
    }

    let mut report = TickReport::default();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(part) => report.merge(part),
        Err(err) => tracing::error!(error = %err, "tick task panicked"),
      }
    }
    tracing::info!(
      materialized = report.materialized.len(),
      exhausted = report.exhausted.len(),
      failures = report.failures.len(),
      "tick finished"
    );
    report
  }
}
