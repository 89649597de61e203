//! Handlers for `/transactions` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/transactions?period=YYYY-MM` | Ordered by date |
//! | `POST`   | `/transactions` | 201 with the transaction, budget and alerts |
//! | `DELETE` | `/transactions/:id` | Returns the reverted budget, or `null` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use budget_core::{
  budget::Budget,
  period::PeriodKey,
  store::LedgerStore,
  transaction::{Category, NewTransaction, Transaction, TransactionKind},
};
use budget_engine::Engine;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{CurrentUser, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub period: PeriodKey,
}

/// `GET /transactions?period=<YYYY-MM>`
pub async fn list<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Transaction>>, ApiError>
where
  S: LedgerStore + 'static,
{
  Ok(Json(engine.list_transactions(&user, params.period).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub amount:   Decimal,
  pub category: Category,
  pub kind:     TransactionKind,
  pub date:     NaiveDate,
  #[serde(default)]
  pub note:     Option<String>,
}

/// `POST /transactions`
pub async fn create<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore + 'static,
{
  let input = NewTransaction {
    note: body.note,
    ..NewTransaction::new(user, body.amount, body.category, body.kind, body.date)
  };
  let outcome = engine.record_transaction(input).await?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

/// `DELETE /transactions/:id`
pub async fn remove<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Option<Budget>>, ApiError>
where
  S: LedgerStore + 'static,
{
  Ok(Json(engine.delete_transaction(&user, id).await?))
}
