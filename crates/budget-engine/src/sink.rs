//! Notification sinks shipped with the engine.

use budget_core::{
  alert::AlertEvent,
  notify::{NotificationSink, NotifyError},
};
use tokio::sync::mpsc;

/// Writes every alert to the tracing log. Push transport lives elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
  fn emit(&self, event: AlertEvent) -> Result<(), NotifyError> {
    tracing::info!(
      user = %event.user_id,
      period = %event.period,
      category = ?event.category,
      tier = %event.tier,
      level = ?event.level,
      spent = %event.spent,
      limit = %event.limit,
      "budget alert"
    );
    Ok(())
  }
}

/// Forwards alerts to an async consumer over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
  tx: mpsc::UnboundedSender<AlertEvent>,
}

impl ChannelSink {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<AlertEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }
}

impl NotificationSink for ChannelSink {
  fn emit(&self, event: AlertEvent) -> Result<(), NotifyError> {
    self
      .tx
      .send(event)
      .map_err(|_| NotifyError("alert receiver dropped".into()))
  }
}
