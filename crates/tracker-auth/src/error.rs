//! Error type for `tracker-auth`.

use thiserror::Error;
use tracker_core::ReasonCode;

use crate::MIN_PASSWORD_LEN;

#[derive(Debug, Error)]
pub enum AuthError {
  /// Unknown user, inactive user and wrong password are indistinguishable.
  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("username already taken")]
  DuplicateUsername,

  #[error("password must be at least {min} characters", min = MIN_PASSWORD_LEN)]
  WeakPassword,

  #[error("reset token is invalid, expired or already used")]
  InvalidResetToken,

  #[error("password hashing failed: {0}")]
  Hash(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
  pub(crate) fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub fn code(&self) -> ReasonCode {
    match self {
      Self::InvalidCredentials => ReasonCode::InvalidCredentials,
      Self::DuplicateUsername => ReasonCode::DuplicateUsername,
      Self::WeakPassword => ReasonCode::WeakPassword,
      Self::InvalidResetToken => ReasonCode::InvalidResetToken,
      Self::Hash(_) | Self::Store(_) => ReasonCode::Internal,
    }
  }
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;
