//! [`SqliteStore`]: the SQLite implementation of [`LedgerStore`].

use std::{path::Path, time::Duration};

use budget_core::{
  budget::Budget,
  obligation::RecurringObligation,
  period::PeriodKey,
  store::{LedgerStore, ObligationQuery, TransactionQuery, WriteOp},
  transaction::Transaction,
  user::UserId,
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{EncodedOp, decode_doc, encode_date, encode_uuid},
  schema::SCHEMA,
};

/// How long a writer waits on another process's lock before the call fails
/// as busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ledger store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn decode_all<T: DeserializeOwned>(docs: Vec<String>) -> Result<Vec<T>> {
  docs.iter().map(|d| decode_doc(d)).collect()
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = Error;

  // ── Budgets ───────────────────────────────────────────────────────────────

  async fn get_budget<'a>(&'a self, user_id: &'a UserId, period: PeriodKey) -> Result<Option<Budget>> {
    let user = user_id.as_str().to_owned();
    let key = period.to_string();

    let doc: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT doc FROM budgets WHERE user_id = ?1 AND period_key = ?2",
            rusqlite::params![user, key],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    doc.as_deref().map(decode_doc).transpose()
  }

  async fn list_budgets<'a>(&'a self, user_id: &'a UserId) -> Result<Vec<Budget>> {
    let user = user_id.as_str().to_owned();

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT doc FROM budgets WHERE user_id = ?1 ORDER BY period_key")?;
        let rows = stmt
          .query_map(rusqlite::params![user], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_all(docs)
  }

  // ── Transactions ──────────────────────────────────────────────────────────

  async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
    let id_str = encode_uuid(id);

    let doc: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT doc FROM transactions WHERE id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    doc.as_deref().map(decode_doc).transpose()
  }

  async fn list_transactions<'a>(&'a self, query: &'a TransactionQuery) -> Result<Vec<Transaction>> {
    let user = query.user_id.as_ref().map(|u| u.as_str().to_owned());
    let from = query.from.map(encode_date);
    let until = query.until.map(encode_date);
    // SQLite treats a negative LIMIT as "no limit".
    let limit: i64 = query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM transactions
           WHERE (?1 IS NULL OR user_id = ?1)
             AND (?2 IS NULL OR date >= ?2)
             AND (?3 IS NULL OR date <  ?3)
           ORDER BY date, created_at
           LIMIT ?4",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user, from, until, limit], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_all(docs)
  }

  // ── Obligations ───────────────────────────────────────────────────────────

  async fn get_obligation(&self, id: Uuid) -> Result<Option<RecurringObligation>> {
    let id_str = encode_uuid(id);

    let doc: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT doc FROM obligations WHERE id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    doc.as_deref().map(decode_doc).transpose()
  }

  async fn list_obligations<'a>(
    &'a self,
    query: &'a ObligationQuery,
  ) -> Result<Vec<RecurringObligation>> {
    let user = query.user_id.as_ref().map(|u| u.as_str().to_owned());
    let active_only = query.active_only;

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM obligations
           WHERE (?1 IS NULL OR user_id = ?1)
             AND (?2 = 0 OR is_active = 1)
           ORDER BY created_at, id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user, active_only], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_all(docs)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn run_atomic(&self, ops: Vec<WriteOp>) -> Result<()> {
    let encoded = ops.into_iter().map(EncodedOp::encode).collect::<Result<Vec<_>>>()?;

    let conflict: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for op in &encoded {
          if let Some(detail) = execute(&tx, op)? {
            // Dropping `tx` rolls back everything applied so far.
            return Ok(Some(detail));
          }
        }
        tx.commit()?;
        Ok(None)
      })
      .await?;

    match conflict {
      Some(detail) => Err(Error::Conflict(detail)),
      None => Ok(()),
    }
  }
}

// ─── Batch execution ─────────────────────────────────────────────────────────

/// Run one op inside the batch transaction. Returns a description of the
/// guard that failed when the op matched nothing.
fn execute(tx: &rusqlite::Transaction<'_>, op: &EncodedOp) -> rusqlite::Result<Option<String>> {
  let changed = match op {
    EncodedOp::InsertBudget { user_id, period_key, version, doc } => tx.execute(
      "INSERT INTO budgets (user_id, period_key, version, doc) VALUES (?1, ?2, ?3, ?4)
       ON CONFLICT DO NOTHING",
      rusqlite::params![user_id, period_key, version, doc],
    )?,
    EncodedOp::UpdateBudget { user_id, period_key, version, expected, doc } => tx.execute(
      "UPDATE budgets SET version = ?3, doc = ?4
       WHERE user_id = ?1 AND period_key = ?2 AND version = ?5",
      rusqlite::params![user_id, period_key, version, doc, expected],
    )?,
    EncodedOp::DeleteBudget { user_id, period_key, expected } => tx.execute(
      "DELETE FROM budgets WHERE user_id = ?1 AND period_key = ?2 AND version = ?3",
      rusqlite::params![user_id, period_key, expected],
    )?,
    EncodedOp::InsertTransaction {
      id,
      user_id,
      date,
      created_at,
      origin_obligation,
      origin_due,
      doc,
    } => tx.execute(
      "INSERT INTO transactions (
         id, user_id, date, created_at, origin_obligation, origin_due, doc
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
       ON CONFLICT DO NOTHING",
      rusqlite::params![id, user_id, date, created_at, origin_obligation, origin_due, doc],
    )?,
    EncodedOp::DeleteTransaction { id } => {
      tx.execute("DELETE FROM transactions WHERE id = ?1", rusqlite::params![id])?
    }
    EncodedOp::InsertObligation { id, user_id, is_active, version, created_at, doc } => tx.execute(
      "INSERT INTO obligations (id, user_id, is_active, version, created_at, doc)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
       ON CONFLICT DO NOTHING",
      rusqlite::params![id, user_id, is_active, version, created_at, doc],
    )?,
    EncodedOp::UpdateObligation { id, is_active, version, expected, doc } => tx.execute(
      "UPDATE obligations SET is_active = ?2, version = ?3, doc = ?4
       WHERE id = ?1 AND version = ?5",
      rusqlite::params![id, is_active, version, doc, expected],
    )?,
  };

  Ok((changed == 0).then(|| describe(op)))
}

fn describe(op: &EncodedOp) -> String {
  match op {
    EncodedOp::InsertBudget { user_id, period_key, .. } => {
      format!("budget {user_id}/{period_key} already exists")
    }
    EncodedOp::UpdateBudget { user_id, period_key, expected, .. }
    | EncodedOp::DeleteBudget { user_id, period_key, expected } => {
      format!("budget {user_id}/{period_key} is no longer at version {expected}")
    }
    EncodedOp::InsertTransaction { id, origin_obligation: Some(ob), origin_due: Some(due), .. } => {
      format!("transaction {id}: occurrence {due} of obligation {ob} already recorded")
    }
    EncodedOp::InsertTransaction { id, .. } => format!("transaction {id} already exists"),
    EncodedOp::DeleteTransaction { id } => format!("transaction {id} no longer exists"),
    EncodedOp::InsertObligation { id, .. } => format!("obligation {id} already exists"),
    EncodedOp::UpdateObligation { id, expected, .. } => {
      format!("obligation {id} is no longer at version {expected}")
    }
  }
}
