//! Caller identity extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use budget_core::user::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_HEADER: &str = "x-user-id";

/// The user a request acts on behalf of. Rejects with 401 when the header is
/// missing, not UTF-8, or blank.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<St: Send + Sync> FromRequestParts<St> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    let raw = parts
      .headers
      .get(USER_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_HEADER} header")))?;
    let user = UserId::new(raw).map_err(|e| ApiError::Unauthenticated(e.to_string()))?;
    Ok(Self(user))
  }
}
