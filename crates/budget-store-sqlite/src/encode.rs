//! Encoding helpers between ledger types and the plain-text representations
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings and dates as
//! `YYYY-MM-DD`, so both sort lexicographically. UUIDs are stored as
//! hyphenated lowercase strings. Whole records are stored as compact JSON.

use budget_core::{
  budget::Budget,
  obligation::RecurringObligation,
  store::WriteOp,
  transaction::{Origin, Transaction},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::Result;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

/// SQLite integers are signed.
pub fn encode_version(v: u64) -> i64 { i64::try_from(v).unwrap_or(i64::MAX) }

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn encode_doc<T: Serialize>(value: &T) -> Result<String> { Ok(serde_json::to_string(value)?) }

pub fn decode_doc<T: DeserializeOwned>(s: &str) -> Result<T> { Ok(serde_json::from_str(s)?) }

// ─── Write ops ───────────────────────────────────────────────────────────────

/// A [`WriteOp`] with every column pre-encoded, ready to move onto the
/// database thread.
pub enum EncodedOp {
  InsertBudget {
    user_id:    String,
    period_key: String,
    version:    i64,
    doc:        String,
  },
  UpdateBudget {
    user_id:    String,
    period_key: String,
    version:    i64,
    expected:   i64,
    doc:        String,
  },
  DeleteBudget {
    user_id:    String,
    period_key: String,
    expected:   i64,
  },
  InsertTransaction {
    id:                String,
    user_id:           String,
    date:              String,
    created_at:        String,
    origin_obligation: Option<String>,
    origin_due:        Option<String>,
    doc:               String,
  },
  DeleteTransaction {
    id: String,
  },
  InsertObligation {
    id:         String,
    user_id:    String,
    is_active:  bool,
    version:    i64,
    created_at: String,
    doc:        String,
  },
  UpdateObligation {
    id:        String,
    is_active: bool,
    version:   i64,
    expected:  i64,
    doc:       String,
  },
}

impl EncodedOp {
  pub fn encode(op: WriteOp) -> Result<Self> {
    Ok(match op {
      WriteOp::PutBudget { budget, expected_version } => encode_budget(&budget, expected_version)?,
      WriteOp::DeleteBudget { user_id, period, expected_version } => Self::DeleteBudget {
        user_id:    user_id.as_str().to_owned(),
        period_key: period.to_string(),
        expected:   encode_version(expected_version),
      },
      WriteOp::InsertTransaction(tx) => encode_transaction(&tx)?,
      WriteOp::DeleteTransaction(id) => Self::DeleteTransaction { id: encode_uuid(id) },
      WriteOp::PutObligation { obligation, expected_version } => {
        encode_obligation(&obligation, expected_version)?
      }
    })
  }
}

fn encode_budget(budget: &Budget, expected: Option<u64>) -> Result<EncodedOp> {
  let user_id = budget.user_id.as_str().to_owned();
  let period_key = budget.period.to_string();
  let version = encode_version(budget.version);
  let doc = encode_doc(budget)?;
  Ok(match expected {
    None => EncodedOp::InsertBudget { user_id, period_key, version, doc },
    Some(v) => EncodedOp::UpdateBudget {
      user_id,
      period_key,
      version,
      expected: encode_version(v),
      doc,
    },
  })
}

fn encode_transaction(tx: &Transaction) -> Result<EncodedOp> {
  let (origin_obligation, origin_due) = match tx.origin {
    Origin::Manual => (None, None),
    Origin::Generated { obligation_id, due } => (Some(encode_uuid(obligation_id)), Some(encode_date(due))),
  };
  Ok(EncodedOp::InsertTransaction {
    id: encode_uuid(tx.id),
    user_id: tx.user_id.as_str().to_owned(),
    date: encode_date(tx.date),
    created_at: encode_dt(tx.created_at),
    origin_obligation,
    origin_due,
    doc: encode_doc(tx)?,
  })
}

fn encode_obligation(ob: &RecurringObligation, expected: Option<u64>) -> Result<EncodedOp> {
  let id = encode_uuid(ob.id);
  let version = encode_version(ob.version);
  let doc = encode_doc(ob)?;
  Ok(match expected {
    None => EncodedOp::InsertObligation {
      id,
      user_id: ob.user_id.as_str().to_owned(),
      is_active: ob.is_active,
      version,
      created_at: encode_dt(ob.created_at),
      doc,
    },
    Some(v) => EncodedOp::UpdateObligation {
      id,
      is_active: ob.is_active,
      version,
      expected: encode_version(v),
      doc,
    },
  })
}
