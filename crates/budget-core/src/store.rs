//! The `LedgerStore` trait and supporting query/write types.
//!
//! The trait is implemented by storage backends (e.g. `budget-store-sqlite`).
//! The engine depends on this abstraction only. Reads are per-record or
//! query-by-field; every write goes through [`LedgerStore::run_atomic`], which
//! applies a batch all-or-nothing and checks the optimistic version of each
//! versioned document it touches.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  budget::Budget,
  obligation::RecurringObligation,
  period::PeriodKey,
  transaction::Transaction,
  user::UserId,
};

// ─── Error classification ────────────────────────────────────────────────────

/// Coarse classes of store failure the engine reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// The store could not be reached; retrying later may succeed.
  Unavailable,
  /// A version check in an atomic batch failed.
  Conflict,
  /// Anything else; not retried.
  Other,
}

/// Implemented by every backend's error type.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> StoreErrorKind;
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for [`LedgerStore::list_transactions`].
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
  pub user_id: Option<UserId>,
  /// Inclusive lower bound on `date`.
  pub from:    Option<NaiveDate>,
  /// Exclusive upper bound on `date`.
  pub until:   Option<NaiveDate>,
  pub limit:   Option<usize>,
}

/// Parameters for [`LedgerStore::list_obligations`].
#[derive(Debug, Clone, Default)]
pub struct ObligationQuery {
  pub user_id:     Option<UserId>,
  pub active_only: bool,
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// One write inside an atomic batch.
///
/// Versioned puts carry the version the caller read (`None` means "must not
/// exist yet"); the document itself carries the next version.
#[derive(Debug, Clone)]
pub enum WriteOp {
  PutBudget { budget: Budget, expected_version: Option<u64> },
  DeleteBudget { user_id: UserId, period: PeriodKey, expected_version: u64 },
  InsertTransaction(Transaction),
  DeleteTransaction(Uuid),
  PutObligation { obligation: RecurringObligation, expected_version: Option<u64> },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a ledger document store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait LedgerStore: Send + Sync {
  type Error: StoreError;

  // ── Budgets ───────────────────────────────────────────────────────────

  fn get_budget<'a>(
    &'a self,
    user_id: &'a UserId,
    period: PeriodKey,
  ) -> impl Future<Output = Result<Option<Budget>, Self::Error>> + Send + 'a;

  /// All budgets of a user, ordered by period.
  fn list_budgets<'a>(
    &'a self,
    user_id: &'a UserId,
  ) -> impl Future<Output = Result<Vec<Budget>, Self::Error>> + Send + 'a;

  // ── Transactions ──────────────────────────────────────────────────────

  fn get_transaction(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Transaction>, Self::Error>> + Send + '_;

  /// Transactions matching `query`, ordered by date then creation time.
  fn list_transactions<'a>(
    &'a self,
    query: &'a TransactionQuery,
  ) -> impl Future<Output = Result<Vec<Transaction>, Self::Error>> + Send + 'a;

  // ── Obligations ───────────────────────────────────────────────────────

  fn get_obligation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RecurringObligation>, Self::Error>> + Send + '_;

  fn list_obligations<'a>(
    &'a self,
    query: &'a ObligationQuery,
  ) -> impl Future<Output = Result<Vec<RecurringObligation>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Apply `ops` all-or-nothing. A failed version check fails the whole
  /// batch with an error of kind [`StoreErrorKind::Conflict`].
  fn run_atomic(
    &self,
    ops: Vec<WriteOp>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
