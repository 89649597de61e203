//! Ledger transactions: the concrete money movements budgets aggregate.
//!
//! Transactions are immutable once recorded. The only permitted change is
//! deletion, which the engine pairs with the inverse budget adjustment.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, user::UserId};

// ─── Category ────────────────────────────────────────────────────────────────

/// Spending/earning category. The string form is the lowercase variant name.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
  Market,
  Food,
  Transport,
  Housing,
  Bills,
  Health,
  Entertainment,
  Shopping,
  Education,
  Salary,
  Savings,
  Other,
}

// ─── Kind & origin ───────────────────────────────────────────────────────────

/// Direction of a money movement. Only expenses count against budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Income,
  Expense,
}

/// How a transaction entered the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
  /// Entered by the user.
  #[default]
  Manual,
  /// Materialized from a recurring obligation for its occurrence on `due`.
  Generated { obligation_id: Uuid, due: NaiveDate },
}

impl Origin {
  pub fn is_generated(&self) -> bool { matches!(self, Self::Generated { .. }) }
}

/// Prefix added to the note of every materialized transaction. Display only;
/// [`Origin`] is what distinguishes generated entries.
pub const GENERATED_NOTE_TAG: &str = "[recurring]";

// ─── Transaction ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  pub id:         Uuid,
  pub user_id:    UserId,
  pub amount:     Decimal,
  pub category:   Category,
  pub kind:       TransactionKind,
  pub date:       NaiveDate,
  pub note:       Option<String>,
  #[serde(default)]
  pub origin:     Origin,
  pub created_at: DateTime<Utc>,
}

impl Transaction {
  pub fn is_expense(&self) -> bool { self.kind == TransactionKind::Expense }
}

/// Caller-supplied fields for a new transaction; the engine assigns the id and
/// creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
  pub user_id:  UserId,
  pub amount:   Decimal,
  pub category: Category,
  pub kind:     TransactionKind,
  pub date:     NaiveDate,
  #[serde(default)]
  pub note:     Option<String>,
}

impl NewTransaction {
  pub fn new(
    user_id: UserId,
    amount: Decimal,
    category: Category,
    kind: TransactionKind,
    date: NaiveDate,
  ) -> Self {
    Self { user_id, amount, category, kind, date, note: None }
  }

  pub fn validate(&self) -> Result<()> { validate_amount(self.amount) }

  /// Build the persisted record. Call [`validate`](Self::validate) first.
  pub fn into_transaction(self, origin: Origin, created_at: DateTime<Utc>) -> Transaction {
    Transaction {
      id: Uuid::new_v4(),
      user_id: self.user_id,
      amount: self.amount,
      category: self.category,
      kind: self.kind,
      date: self.date,
      note: self.note,
      origin,
      created_at,
    }
  }
}

/// Largest amount or limit the ledger accepts (10^15).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Amounts must be strictly positive and at most [`MAX_AMOUNT`]; direction is
/// carried by the kind.
pub fn validate_amount(amount: Decimal) -> Result<()> {
  if amount <= Decimal::ZERO {
    return Err(Error::NonPositiveAmount(amount));
  }
  if amount > MAX_AMOUNT {
    return Err(Error::AmountTooLarge(amount));
  }
  Ok(())
}
