//! Core types and pure calculators for the budget engine.
//!
//! This crate is deliberately free of HTTP, database, and async-runtime
//! dependencies. It holds the domain model, the collaborator traits the engine
//! is wired with (store, clock, notification sink, settings), and every
//! calculation that can be expressed without I/O: period resolution, recurring
//! schedules, spend aggregation, alert evaluation, and trust scoring.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod alert;
pub mod budget;
pub mod clock;
pub mod error;
pub mod notify;
pub mod obligation;
pub mod period;
pub mod schedule;
pub mod settings;
pub mod store;
pub mod tier;
pub mod transaction;
pub mod trust;
pub mod user;

pub use error::{Error, Result};
