//! Handlers for `/budgets` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/budgets/:period` | 404 if no budget |
//! | `PUT`    | `/budgets/:period` | Body: `{"total_limit":"1000","category_limits":[...]}` |
//! | `DELETE` | `/budgets/:period` | 204 on success |
//! | `POST`   | `/budgets/:period/rollover` | Clone the latest earlier budget |
//! | `GET`    | `/budgets/:period/trust-score` | |
//!
//! `:period` is `YYYY-MM`.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use budget_core::{
  budget::{Budget, CategoryLimit},
  period::PeriodKey,
  store::LedgerStore,
  trust::TrustScore,
};
use budget_engine::Engine;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{CurrentUser, error::ApiError};

/// `GET /budgets/:period`
pub async fn get_one<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(period): Path<PeriodKey>,
) -> Result<Json<Budget>, ApiError>
where
  S: LedgerStore + 'static,
{
  let budget = engine
    .get_budget(&user, period)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("no budget for {period}")))?;
  Ok(Json(budget))
}

// ─── Put ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PutBody {
  pub total_limit:     Decimal,
  #[serde(default)]
  pub category_limits: Vec<CategoryLimit>,
}

/// `PUT /budgets/:period`: create, or replace limits keeping spend.
pub async fn put<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(period): Path<PeriodKey>,
  Json(body): Json<PutBody>,
) -> Result<Json<Budget>, ApiError>
where
  S: LedgerStore + 'static,
{
  let budget = engine.set_budget(&user, period, body.total_limit, body.category_limits).await?;
  Ok(Json(budget))
}

/// `DELETE /budgets/:period`
pub async fn remove<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(period): Path<PeriodKey>,
) -> Result<StatusCode, ApiError>
where
  S: LedgerStore + 'static,
{
  engine.delete_budget(&user, period).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /budgets/:period/rollover`
pub async fn rollover<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(period): Path<PeriodKey>,
) -> Result<Json<Budget>, ApiError>
where
  S: LedgerStore + 'static,
{
  Ok(Json(engine.roll_over_budget(&user, period).await?))
}

/// `GET /budgets/:period/trust-score`
pub async fn trust_score<S>(
  State(engine): State<Engine<S>>,
  CurrentUser(user): CurrentUser,
  Path(period): Path<PeriodKey>,
) -> Result<Json<TrustScore>, ApiError>
where
  S: LedgerStore + 'static,
{
  Ok(Json(engine.get_trust_score(&user, period).await?))
}
