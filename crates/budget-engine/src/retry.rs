//! Exponential backoff for store calls that fail because the store is
//! unreachable.

use std::{future::Future, time::Duration};

use budget_core::store::{StoreError, StoreErrorKind};
use serde::Deserialize;

use crate::error::{EngineError, Result};

/// How often, and how patiently, an unreachable store is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts, including the first.
  pub attempts:      u32,
  pub base_delay_ms: u64,
  pub multiplier:    u32,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { attempts: 3, base_delay_ms: 2_000, multiplier: 2 } }
}

impl RetryPolicy {
  /// No waiting between attempts.
  pub fn immediate(attempts: u32) -> Self { Self { attempts, base_delay_ms: 0, multiplier: 1 } }

  /// Delay before retry number `retry` (1-based).
  pub fn delay(&self, retry: u32) -> Duration {
    let factor = u64::from(self.multiplier.max(1)).saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
  }
}

/// Run `op` until it succeeds, fails with something other than
/// [`StoreErrorKind::Unavailable`], or runs out of attempts.
pub(crate) async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, name: &str, mut op: F) -> Result<T>
where
  E: StoreError,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let attempts = policy.attempts.max(1);
  let mut attempt = 1;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(err) if err.kind() == StoreErrorKind::Unavailable && attempt < attempts => {
        let delay = policy.delay(attempt);
        tracing::warn!(op = name, attempt, ?delay, error = %err, "store unavailable, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(err) => {
        if err.kind() == StoreErrorKind::Unavailable {
          tracing::error!(op = name, attempts, error = %err, "store unavailable, giving up");
        }
        return Err(EngineError::from_store(name, err));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use thiserror::Error;

  use super::*;
  use crate::error::ErrorKind;

  #[derive(Debug, Error)]
  #[error("{0:?}")]
  struct Flaky(StoreErrorKind);

  impl StoreError for Flaky {
    fn kind(&self) -> StoreErrorKind { self.0 }
  }

  #[test]
  fn delays_grow_geometrically() {
    let p = RetryPolicy::default();
    assert_eq!(p.delay(1), Duration::from_secs(2));
    assert_eq!(p.delay(2), Duration::from_secs(4));
    assert_eq!(p.delay(3), Duration::from_secs(8));
  }

  #[tokio::test]
  async fn recovers_before_attempts_run_out() {
    let calls = &AtomicU32::new(0);
    let out = with_retry(&RetryPolicy::immediate(3), "lookup", move || async move {
      if calls.fetch_add(1, Ordering::SeqCst) < 2 {
        Err(Flaky(StoreErrorKind::Unavailable))
      } else {
        Ok(7)
      }
    })
    .await
    .unwrap();
    assert_eq!(out, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn exhaustion_surfaces_not_connected() {
    let calls = &AtomicU32::new(0);
    let err = with_retry(&RetryPolicy::immediate(3), "lookup", move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<(), _>(Flaky(StoreErrorKind::Unavailable))
    })
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn other_failures_are_not_retried() {
    let calls = &AtomicU32::new(0);
    let err = with_retry(&RetryPolicy::immediate(3), "lookup", move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<(), _>(Flaky(StoreErrorKind::Conflict))
    })
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
