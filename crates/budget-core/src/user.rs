//! User identity: the owner key every ledger record is partitioned by.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An opaque, non-empty user identifier issued by the surrounding auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
  /// Wrap a raw identifier. Blank identifiers are rejected; they mean the
  /// caller has no authenticated identity.
  pub fn new(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    if raw.trim().is_empty() {
      return Err(Error::EmptyUserId);
    }
    Ok(Self(raw))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for UserId {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::new(raw) }
}

impl From<UserId> for String {
  fn from(id: UserId) -> Self { id.0 }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
