//! Notification sink: where alert events leave the engine.
//!
//! Delivery is fire-and-forget: a failed `emit` is reported back so it can be
//! logged, but never undoes the budget write that produced the event.

use thiserror::Error;

use crate::alert::AlertEvent;

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

pub trait NotificationSink: Send + Sync {
  fn emit(&self, event: AlertEvent) -> Result<(), NotifyError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
  fn emit(&self, _event: AlertEvent) -> Result<(), NotifyError> { Ok(()) }
}
