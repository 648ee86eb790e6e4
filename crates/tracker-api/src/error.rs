//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error renders as `{"error": <message>, "code": <reason code>}`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracker_auth::AuthError;
use tracker_core::{ReasonCode, policy::DenyReason};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// No session, or the session is expired or revoked.
  #[error("authentication required")]
  Unauthenticated,

  #[error("access denied")]
  Denied(DenyReason),

  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error(transparent)]
  Core(#[from] tracker_core::Error),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("name already in use: {0}")]
  NameTaken(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub fn code(&self) -> ReasonCode {
    match self {
      Self::Unauthenticated => ReasonCode::SessionExpired,
      Self::Denied(reason) => reason.code(),
      Self::Auth(e) => e.code(),
      Self::Core(e) => e.code(),
      Self::NotFound(_) => ReasonCode::NotFound,
      Self::BadRequest(_) => ReasonCode::BadRequest,
      Self::NameTaken(_) => ReasonCode::DuplicateName,
      Self::Store(_) => ReasonCode::Internal,
    }
  }

  fn status(&self) -> StatusCode {
    match self.code() {
      ReasonCode::InvalidCredentials | ReasonCode::SessionExpired => {
        StatusCode::UNAUTHORIZED
      }
      ReasonCode::Forbidden => StatusCode::FORBIDDEN,
      ReasonCode::NotFound => StatusCode::NOT_FOUND,
      ReasonCode::DuplicateUsername
      | ReasonCode::DuplicateName
      | ReasonCode::LastAdminProtected => StatusCode::CONFLICT,
      ReasonCode::WeakPassword
      | ReasonCode::SelfDeletion
      | ReasonCode::InvalidResetToken
      | ReasonCode::InvalidRoleSubgroup
      | ReasonCode::BadRequest => StatusCode::BAD_REQUEST,
      ReasonCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<DenyReason> for ApiError {
  fn from(reason: DenyReason) -> Self { Self::Denied(reason) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      // Infrastructure detail stays in the log.
      ApiError::Store(e) | ApiError::Auth(AuthError::Store(e)) => {
        tracing::error!(error = %e, "store failure");
        "internal error".to_owned()
      }
      ApiError::Auth(AuthError::Hash(e)) => {
        tracing::error!(error = %e, "password hashing failure");
        "internal error".to_owned()
      }
      ApiError::Denied(reason) => {
        tracing::warn!(reason = reason.as_ref(), "request denied");
        self.to_string()
      }
      other => other.to_string(),
    };
    let code = self.code();
    (status, Json(json!({ "error": message, "code": code }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn denials_share_one_code() {
    for reason in [
      DenyReason::ReadOnlyRole,
      DenyReason::OutsideSubgroup,
      DenyReason::NotOwner,
      DenyReason::AdministratorOnly,
      DenyReason::Unscoped,
    ] {
      let err = ApiError::Denied(reason);
      assert_eq!(err.code(), ReasonCode::Forbidden);
      assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
    assert_eq!(
      ApiError::Denied(DenyReason::LastAdminProtected).status(),
      StatusCode::CONFLICT
    );
  }

  #[test]
  fn auth_errors_map_to_statuses() {
    assert_eq!(
      ApiError::from(AuthError::InvalidCredentials).status(),
      StatusCode::UNAUTHORIZED
    );
    assert_eq!(ApiError::from(AuthError::WeakPassword).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(AuthError::DuplicateUsername).status(), StatusCode::CONFLICT);
    assert_eq!(ApiError::Unauthenticated.code(), ReasonCode::SessionExpired);
  }

  #[test]
  fn taken_names_conflict() {
    let err = ApiError::NameTaken("Hotel Sol".into());
    assert_eq!(err.code(), ReasonCode::DuplicateName);
    assert_eq!(err.status(), StatusCode::CONFLICT);
  }
}
