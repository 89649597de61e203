//! Router tests against an engine over an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use budget_core::{
  budget::Budget,
  clock::FixedClock,
  notify::NullSink,
  obligation::RecurringObligation,
  settings::StaticSettings,
  transaction::Transaction,
  trust::TrustScore,
};
use budget_engine::{Collaborators, Engine, EngineConfig, RetryPolicy};
use budget_store_sqlite::SqliteStore;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{api_router, auth::USER_HEADER};

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let collab = Collaborators {
    clock:    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap())),
    sink:     Arc::new(NullSink),
    settings: Arc::new(StaticSettings::default()),
  };
  let config = EngineConfig { retry: RetryPolicy::immediate(1), ..EngineConfig::default() };
  api_router(Engine::with_config(store, collab, config))
}

async fn call(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(user) = user {
    builder = builder.header(USER_HEADER, user);
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  app.clone().oneshot(req).await.unwrap()
}

async fn read<T: DeserializeOwned>(resp: Response) -> T {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn market_budget() -> Value {
  json!({
    "total_limit": "1000",
    "category_limits": [{ "category": "market", "limit": "300" }]
  })
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_or_blank_user_is_401() {
  let app = app().await;
  let resp = call(&app, "GET", "/budgets/2024-01", None, None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  let body: Value = read(resp).await;
  assert!(body["error"].as_str().unwrap().contains(USER_HEADER));

  let resp = call(&app, "GET", "/budgets/2024-01", Some("  "), None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ─── Budgets ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_then_get_budget() {
  let app = app().await;
  let resp = call(&app, "PUT", "/budgets/2024-01", Some("alice"), Some(market_budget())).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let put: Budget = read(resp).await;
  assert_eq!(put.total_limit, dec!(1000));

  let resp = call(&app, "GET", "/budgets/2024-01", Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let got: Budget = read(resp).await;
  assert_eq!(got, put);

  let resp = call(&app, "GET", "/budgets/2024-01", Some("bob"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn limits_over_total_are_422() {
  let app = app().await;
  let body = json!({
    "total_limit": "1000",
    "category_limits": [
      { "category": "market", "limit": "600" },
      { "category": "food", "limit": "500" }
    ]
  });
  let resp = call(&app, "PUT", "/budgets/2024-01", Some("alice"), Some(body)).await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_period_is_rejected() {
  let app = app().await;
  let resp = call(&app, "GET", "/budgets/2024-13", Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rollover_and_delete() {
  let app = app().await;
  call(&app, "PUT", "/budgets/2024-01", Some("alice"), Some(market_budget())).await;

  let resp = call(&app, "POST", "/budgets/2024-02/rollover", Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let feb: Budget = read(resp).await;
  assert_eq!(feb.period.to_string(), "2024-02");
  assert_eq!(feb.spent_total, dec!(0));

  let resp = call(&app, "DELETE", "/budgets/2024-02", Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);
  let resp = call(&app, "DELETE", "/budgets/2024-02", Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn recording_an_expense_updates_budget_and_alerts() {
  let app = app().await;
  call(&app, "PUT", "/budgets/2024-01", Some("alice"), Some(market_budget())).await;

  let body = json!({
    "amount": "250",
    "category": "market",
    "kind": "expense",
    "date": "2024-01-10",
    "note": "weekly shop"
  });
  let resp = call(&app, "POST", "/transactions", Some("alice"), Some(body)).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let outcome: Value = read(resp).await;
  assert_eq!(outcome["transaction"]["note"], "weekly shop");
  assert_eq!(outcome["alerts"].as_array().unwrap().len(), 1);
  assert_eq!(outcome["alerts"][0]["tier"], "halfWarning");

  let resp = call(&app, "GET", "/transactions?period=2024-01", Some("alice"), None).await;
  let listed: Vec<Transaction> = read(resp).await;
  assert_eq!(listed.len(), 1);

  let id = listed[0].id;
  let resp = call(&app, "DELETE", &format!("/transactions/{id}"), Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let reverted: Option<Budget> = read(resp).await;
  assert_eq!(reverted.unwrap().spent_total, dec!(0));
}

#[tokio::test]
async fn non_positive_amount_is_422() {
  let app = app().await;
  let body = json!({ "amount": "0", "category": "food", "kind": "expense", "date": "2024-01-10" });
  let resp = call(&app, "POST", "/transactions", Some("alice"), Some(body)).await;
  assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn deleting_an_unknown_transaction_is_404() {
  let app = app().await;
  let uri = format!("/transactions/{}", Uuid::new_v4());
  let resp = call(&app, "DELETE", &uri, Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── Obligations ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn obligation_lifecycle_and_tick() {
  let app = app().await;
  let body = json!({
    "title": "Rent",
    "template_amount": "950",
    "category": "housing",
    "kind": "expense",
    "frequency": "monthly",
    "anchor_date": "2024-01-01"
  });
  let resp = call(&app, "POST", "/obligations", Some("alice"), Some(body)).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let ob: RecurringObligation = read(resp).await;
  assert!(ob.is_active);

  let resp = call(&app, "POST", &format!("/obligations/{}/pause", ob.id), Some("alice"), None).await;
  let paused: RecurringObligation = read(resp).await;
  assert!(!paused.is_active);

  let resp = call(&app, "GET", "/obligations?active_only=true", Some("alice"), None).await;
  let active: Vec<RecurringObligation> = read(resp).await;
  assert!(active.is_empty());

  call(&app, "POST", &format!("/obligations/{}/resume", ob.id), Some("alice"), None).await;

  // The engine clock sits at 2024-01-15, so only the January rent is due.
  let resp = call(&app, "POST", "/obligations/tick", Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let report: Value = read(resp).await;
  assert_eq!(report["materialized"].as_array().unwrap().len(), 1);
  assert_eq!(report["materialized"][0]["date"], "2024-01-01");

  let resp = call(&app, "POST", "/obligations/tick", Some("alice"), None).await;
  let report: Value = read(resp).await;
  assert!(report["materialized"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn other_users_obligations_are_invisible() {
  let app = app().await;
  let body = json!({
    "title": "Gym",
    "template_amount": "30",
    "category": "health",
    "kind": "expense",
    "frequency": "monthly",
    "anchor_date": "2024-01-05"
  });
  let resp = call(&app, "POST", "/obligations", Some("alice"), Some(body)).await;
  let ob: RecurringObligation = read(resp).await;

  let resp = call(&app, "POST", &format!("/obligations/{}/pause", ob.id), Some("bob"), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trust_score_is_served() {
  let app = app().await;
  let resp = call(&app, "GET", "/budgets/2024-01/trust-score", Some("alice"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let score: TrustScore = read(resp).await;
  assert!((0.0..=100.0).contains(&score.score));
}
