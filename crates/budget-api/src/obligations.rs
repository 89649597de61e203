//! Handlers for `/obligations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/obligations` | Optional `?active_only=true` |
//! | `POST` | `/obligations` | 201 with the new obligation |
//! | `POST` | `/obligations/:id/pause` | |
//! | `POST` | `/obligations/:id/resume` | 422 once the series has ended |
//! | `POST` | `/obligations/tick` | Materialize everything due for the caller |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use budget_core::{
  obligation::{NewObligation, RecurringObligation},
  schedule::Frequency,
  store::LedgerStore,
  transaction::{Category, TransactionKind},
};
use budget_engine::{Engine, TickReport};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{CurrentUser, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub active_only: bool,
}

/// `GET /obligations[?active_only=true]`
pub async fn list<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<RecurringObligation>>, ApiError>
where
  S: LedgerStore + 'static,
{
  Ok(Json(engine.list_obligations(&user, params.active_only).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:           String,
  pub template_amount: Decimal,
  pub category:        Category,
  pub kind:            TransactionKind,
  pub frequency:       Frequency,
  pub anchor_date:     NaiveDate,
  #[serde(default)]
  pub end_date:        Option<NaiveDate>,
}

/// `POST /obligations`
pub async fn create<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LedgerStore + 'static,
{
  let input = NewObligation {
    user_id:         user,
    title:           body.title,
    template_amount: body.template_amount,
    category:        body.category,
    kind:            body.kind,
    frequency:       body.frequency,
    anchor_date:     body.anchor_date,
    end_date:        body.end_date,
  };
  let obligation = engine.create_obligation(input).await?;
  Ok((StatusCode::CREATED, Json(obligation)))
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// `POST /obligations/:id/pause`
pub async fn pause<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<RecurringObligation>, ApiError>
where
  S: LedgerStore + 'static,
{
  Ok(Json(engine.pause_obligation(&user, id).await?))
}

/// `POST /obligations/:id/resume`
pub async fn resume<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<RecurringObligation>, ApiError>
where
  S: LedgerStore + 'static,
{
  Ok(Json(engine.resume_obligation(&user, id).await?))
}

/// `POST /obligations/tick`: as of the engine's clock.
pub async fn tick<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<TickReport>, ApiError>
where
  S: LedgerStore + 'static,
{
  let now = engine.clock().now();
  Ok(Json(engine.tick_recurring_obligations(&user, now).await?))
}
