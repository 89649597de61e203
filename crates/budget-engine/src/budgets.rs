//! Budget-facing operations: setting, rolling over, and deleting budgets, and
//! recording or deleting the transactions that feed them.

use budget_core::{
  aggregate::Sign,
  alert::AlertEvent,
  budget::{Budget, CategoryLimit, validate_limits},
  obligation::RecurringObligation,
  period::PeriodKey,
  store::{LedgerStore, ObligationQuery, TransactionQuery, WriteOp},
  transaction::{NewTransaction, Origin, Transaction},
  trust::{self, TrustInputs, TrustScore},
  user::UserId,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{Engine, EngineError, Result};

/// Result of [`Engine::record_transaction`].
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
  pub transaction: Transaction,
  /// The budget of the transaction's period after aggregation, or `None`
  /// when no budget exists for that period.
  pub budget:      Option<Budget>,
  /// Alerts emitted because of this transaction.
  pub alerts:      Vec<AlertEvent>,
}

impl<S: LedgerStore> Engine<S> {
  // ── Budgets ───────────────────────────────────────────────────────────

  /// Create the budget for `period`, or replace the limits of the existing
  /// one while keeping what has been spent so far.
  #[instrument(skip(self, category_limits), fields(user = %user, period = %period))]
  pub async fn set_budget(
    &self,
    user: &UserId,
    period: PeriodKey,
    total_limit: Decimal,
    category_limits: Vec<CategoryLimit>,
  ) -> Result<Budget> {
    validate_limits(total_limit, &category_limits)?;
    let _guard = self.inner.budget_locks.lock((user.clone(), period)).await;

    match self.try_set_budget(user, period, total_limit, &category_limits).await {
      Err(EngineError::Conflict(detail)) => {
        tracing::warn!(%detail, "budget write conflicted, retrying with a fresh read");
        self.try_set_budget(user, period, total_limit, &category_limits).await
      }
      other => other,
    }
  }

  async fn try_set_budget(
    &self,
    user: &UserId,
    period: PeriodKey,
    total_limit: Decimal,
    category_limits: &[CategoryLimit],
  ) -> Result<Budget> {
    let now = self.clock().now();
    let (budget, expected) = match self.load_budget(user, period).await? {
      Some(mut existing) => {
        let expected = existing.version;
        existing.replace_limits(total_limit, category_limits.to_vec());
        existing.version += 1;
        existing.updated_at = now;
        (existing, Some(expected))
      }
      None => {
        let settings = self.settings_for(user);
        let mut fresh = Budget::new(
          user.clone(),
          period,
          total_limit,
          category_limits.to_vec(),
          &settings,
          now,
        );
        fresh.version = 1;
        (fresh, None)
      }
    };

    self
      .commit("set_budget", vec![WriteOp::PutBudget {
        budget:           budget.clone(),
        expected_version: expected,
      }])
      .await?;
    tracing::info!(version = budget.version, "budget saved");
    Ok(budget)
  }

  pub async fn get_budget(&self, user: &UserId, period: PeriodKey) -> Result<Option<Budget>> {
    self.load_budget(user, period).await
  }

  /// Ensure a budget exists for `period` by cloning the most recent earlier
  /// budget's limits with spend reset. Returns the existing budget untouched
  /// if one is already there.
  #[instrument(skip(self), fields(user = %user, period = %period))]
  pub async fn roll_over_budget(&self, user: &UserId, period: PeriodKey) -> Result<Budget> {
    let _guard = self.inner.budget_locks.lock((user.clone(), period)).await;

    match self.try_roll_over(user, period).await {
      Err(EngineError::Conflict(detail)) => {
        tracing::warn!(%detail, "rollover raced another writer, re-reading");
        self.try_roll_over(user, period).await
      }
      other => other,
    }
  }

  async fn try_roll_over(&self, user: &UserId, period: PeriodKey) -> Result<Budget> {
    if let Some(existing) = self.load_budget(user, period).await? {
      return Ok(existing);
    }

    let store = self.store();
    let mut earlier = self
      .retrying("list_budgets", move || store.list_budgets(user))
      .await?;
    earlier.retain(|b| b.period < period);
    let source = earlier
      .into_iter()
      .max_by_key(|b| b.period)
      .ok_or_else(|| EngineError::NotFound(format!("no budget before {period} for {user}")))?;

    let mut next = source.rolled_into(period, self.clock().now());
    next.version = 1;
    self
      .commit("roll_over_budget", vec![WriteOp::PutBudget {
        budget:           next.clone(),
        expected_version: None,
      }])
      .await?;
    tracing::info!(from = %source.period, "budget rolled over");
    Ok(next)
  }

  #[instrument(skip(self), fields(user = %user, period = %period))]
  pub async fn delete_budget(&self, user: &UserId, period: PeriodKey) -> Result<()> {
    let _guard = self.inner.budget_locks.lock((user.clone(), period)).await;
    let existing = self
      .load_budget(user, period)
      .await?
      .ok_or_else(|| EngineError::NotFound(format!("budget {period} for {user}")))?;

    self
      .commit("delete_budget", vec![WriteOp::DeleteBudget {
        user_id:          user.clone(),
        period,
        expected_version: existing.version,
      }])
      .await?;
    tracing::info!("budget deleted");
    Ok(())
  }

  // ── Transactions ──────────────────────────────────────────────────────

  /// Record a manual transaction and fold it into its period's budget.
  #[instrument(skip(self, input), fields(user = %input.user_id, date = %input.date))]
  pub async fn record_transaction(&self, input: NewTransaction) -> Result<RecordOutcome> {
    input.validate()?;
    let period = self.settings_for(&input.user_id).resolver().period_of(input.date);
    let tx = input.into_transaction(Origin::Manual, self.clock().now());

    let _guard = self.inner.budget_locks.lock((tx.user_id.clone(), period)).await;
    let ops = vec![WriteOp::InsertTransaction(tx.clone())];
    let update = match self
      .commit_with_budget("record_transaction", &tx, period, Sign::Apply, ops.clone())
      .await
    {
      Err(EngineError::Conflict(detail)) => {
        tracing::warn!(%detail, "budget write conflicted, retrying with a fresh read");
        self
          .commit_with_budget("record_transaction", &tx, period, Sign::Apply, ops)
          .await?
      }
      other => other?,
    };

    let alerts = match &update.budget {
      Some(b) => self.dispatch_alerts(b, &update.changes),
      None => Vec::new(),
    };
    tracing::info!(id = %tx.id, %period, alerts = alerts.len(), "transaction recorded");
    Ok(RecordOutcome { transaction: tx, budget: update.budget, alerts })
  }

  /// Delete a transaction and revert it from the budget of the period its
  /// own date falls in.
  #[instrument(skip(self), fields(user = %user, id = %id))]
  pub async fn delete_transaction(&self, user: &UserId, id: Uuid) -> Result<Option<Budget>> {
    let tx = self.load_owned_transaction(user, id).await?;
    let period = self.settings_for(user).resolver().period_of(tx.date);
    let _guard = self.inner.budget_locks.lock((user.clone(), period)).await;

    let update = match self.try_delete_transaction(user, id, period).await {
      Err(EngineError::Conflict(detail)) => {
        tracing::warn!(%detail, "delete conflicted, retrying with a fresh read");
        self.try_delete_transaction(user, id, period).await?
      }
      other => other?,
    };

    if let Some(b) = &update.budget {
      self.dispatch_alerts(b, &update.changes);
    }
    tracing::info!(%period, "transaction deleted");
    Ok(update.budget)
  }

  async fn try_delete_transaction(
    &self,
    user: &UserId,
    id: Uuid,
    period: PeriodKey,
  ) -> Result<crate::BudgetUpdate> {
    // Re-read under the lock; a concurrent delete may have won.
    let tx = self.load_owned_transaction(user, id).await?;
    self
      .commit_with_budget("delete_transaction", &tx, period, Sign::Revert, vec![
        WriteOp::DeleteTransaction(id),
      ])
      .await
  }

  async fn load_owned_transaction(&self, user: &UserId, id: Uuid) -> Result<Transaction> {
    let store = self.store();
    self
      .retrying("get_transaction", move || store.get_transaction(id))
      .await?
      .filter(|tx| &tx.user_id == user)
      .ok_or_else(|| EngineError::NotFound(format!("transaction {id}")))
  }

  /// Transactions of `user` dated inside `period`.
  pub async fn list_transactions(&self, user: &UserId, period: PeriodKey) -> Result<Vec<Transaction>> {
    let (from, until) = self.settings_for(user).resolver().bounds(period);
    let query = TransactionQuery {
      user_id: Some(user.clone()),
      from:    Some(from),
      until:   Some(until),
      limit:   None,
    };
    let store = self.store();
    let query = &query;
    self.retrying("list_transactions", move || store.list_transactions(query)).await
  }

  // ── Trust score ───────────────────────────────────────────────────────

  #[instrument(skip(self), fields(user = %user, period = %period))]
  pub async fn get_trust_score(&self, user: &UserId, period: PeriodKey) -> Result<TrustScore> {
    let window = self.settings_for(user).resolver().bounds(period);
    let budget = self.load_budget(user, period).await?;
    let transactions = self.list_transactions(user, period).await?;

    let store = self.store();
    let query = ObligationQuery { user_id: Some(user.clone()), active_only: false };
    let query = &query;
    let obligations: Vec<RecurringObligation> = self
      .retrying("list_obligations", move || store.list_obligations(query))
      .await?;

    let score = trust::compute(&TrustInputs {
      period,
      window,
      budget: budget.as_ref(),
      obligations: &obligations,
      transactions: &transactions,
    });
    tracing::debug!(score = score.score, "trust score computed");
    Ok(score)
  }
}
