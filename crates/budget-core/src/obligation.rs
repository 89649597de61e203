//! Recurring obligations: templates (salary, rent, subscriptions) that
//! materialize into ledger transactions as their occurrences fall due.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  schedule::{Frequency, next_due},
  transaction::{
    Category, GENERATED_NOTE_TAG, Origin, Transaction, TransactionKind, validate_amount,
  },
  user::UserId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringObligation {
  pub id:              Uuid,
  pub user_id:         UserId,
  pub title:           String,
  pub template_amount: Decimal,
  pub category:        Category,
  pub kind:            TransactionKind,
  pub frequency:       Frequency,
  pub anchor_date:     NaiveDate,
  pub end_date:        Option<NaiveDate>,
  /// Date of the most recently materialized occurrence. Only moves forward.
  pub last_processed:  Option<NaiveDate>,
  pub is_active:       bool,
  /// Optimistic-concurrency counter; bumped on every successful write.
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
}

impl RecurringObligation {
  /// The next occurrence not yet materialized, or `None` once the series has
  /// run past its end date.
  pub fn next_due(&self) -> Option<NaiveDate> {
    next_due(self.frequency, self.anchor_date, self.last_processed, self.end_date)
  }

  /// The transaction representing this obligation's occurrence on `due`.
  pub fn occurrence(&self, due: NaiveDate, created_at: DateTime<Utc>) -> Transaction {
    Transaction {
      id: Uuid::new_v4(),
      user_id: self.user_id.clone(),
      amount: self.template_amount,
      category: self.category,
      kind: self.kind,
      date: due,
      note: Some(format!("{GENERATED_NOTE_TAG} {}", self.title)),
      origin: Origin::Generated { obligation_id: self.id, due },
      created_at,
    }
  }
}

/// Caller-supplied fields for a new obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObligation {
  pub user_id:         UserId,
  pub title:           String,
  pub template_amount: Decimal,
  pub category:        Category,
  pub kind:            TransactionKind,
  pub frequency:       Frequency,
  pub anchor_date:     NaiveDate,
  #[serde(default)]
  pub end_date:        Option<NaiveDate>,
}

impl NewObligation {
  pub fn validate(&self) -> Result<()> {
    validate_amount(self.template_amount)?;
    if let Some(end) = self.end_date
      && end < self.anchor_date
    {
      return Err(Error::EndBeforeAnchor { anchor: self.anchor_date, end });
    }
    Ok(())
  }

  pub fn into_obligation(self, created_at: DateTime<Utc>) -> RecurringObligation {
    RecurringObligation {
      id: Uuid::new_v4(),
      user_id: self.user_id,
      title: self.title,
      template_amount: self.template_amount,
      category: self.category,
      kind: self.kind,
      frequency: self.frequency,
      anchor_date: self.anchor_date,
      end_date: self.end_date,
      last_processed: None,
      is_active: true,
      version: 0,
      created_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use rust_decimal_macros::dec;

  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

  fn rent() -> NewObligation {
    NewObligation {
      user_id:         UserId::new("alice").unwrap(),
      title:           "Rent".into(),
      template_amount: dec!(950),
      category:        Category::Housing,
      kind:            TransactionKind::Expense,
      frequency:       Frequency::Monthly,
      anchor_date:     d(2024, 1, 1),
      end_date:        None,
    }
  }

  #[test]
  fn end_before_anchor_is_rejected() {
    let mut input = rent();
    input.end_date = Some(d(2023, 12, 31));
    assert!(matches!(input.validate(), Err(Error::EndBeforeAnchor { .. })));
  }

  #[test]
  fn occurrence_carries_template_fields_and_origin() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let ob = rent().into_obligation(now);
    let tx = ob.occurrence(d(2024, 1, 1), now);

    assert_eq!(tx.amount, dec!(950));
    assert_eq!(tx.category, Category::Housing);
    assert_eq!(tx.date, d(2024, 1, 1));
    assert_eq!(tx.origin, Origin::Generated { obligation_id: ob.id, due: d(2024, 1, 1) });
    assert!(tx.note.unwrap().starts_with(GENERATED_NOTE_TAG));
  }

  #[test]
  fn next_due_follows_cursor() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let mut ob = rent().into_obligation(now);
    assert_eq!(ob.next_due(), Some(d(2024, 1, 1)));
    ob.last_processed = Some(d(2024, 1, 1));
    assert_eq!(ob.next_due(), Some(d(2024, 2, 1)));
  }
}
