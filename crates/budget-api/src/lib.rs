//! JSON REST API for the budget engine.
//!
//! Exposes an axum [`Router`] over an [`Engine`] backed by any
//! [`LedgerStore`]. The caller's identity arrives in the `x-user-id` header,
//! set by whatever authenticating proxy sits in front; TLS and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", budget_api::api_router(engine.clone()))
//! ```

pub mod auth;
pub mod budgets;
pub mod error;
pub mod obligations;
pub mod transactions;

use axum::{
  Router,
  routing::{delete, get, post},
};
use budget_core::store::LedgerStore;
use budget_engine::Engine;

pub use auth::CurrentUser;
pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Engine<S>) -> Router<()>
where
  S: LedgerStore + 'static,
{
  Router::new()
    // Budgets
    .route(
      "/budgets/{period}",
      get(budgets::get_one::<S>).put(budgets::put::<S>).delete(budgets::remove::<S>),
    )
    .route("/budgets/{period}/rollover", post(budgets::rollover::<S>))
    .route("/budgets/{period}/trust-score", get(budgets::trust_score::<S>))
    // Transactions
    .route("/transactions", get(transactions::list::<S>).post(transactions::create::<S>))
    .route("/transactions/{id}", delete(transactions::remove::<S>))
    // Obligations
    .route("/obligations", get(obligations::list::<S>).post(obligations::create::<S>))
    .route("/obligations/tick", post(obligations::tick::<S>))
    .route("/obligations/{id}/pause", post(obligations::pause::<S>))
    .route("/obligations/{id}/resume", post(obligations::resume::<S>))
    .with_state(engine)
}

#[cfg(test)]
mod tests;
