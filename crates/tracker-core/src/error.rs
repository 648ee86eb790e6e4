//! Error types and stable reason codes for `tracker-core`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{Role, Subgroup};

#[derive(Debug, Error)]
pub enum Error {
  #[error("role {role} cannot be combined with subgroup {subgroup:?}")]
  InvalidRoleSubgroup {
    role:     Role,
    subgroup: Option<Subgroup>,
  },

  #[error("role {0:?} is not assignable")]
  UnassignableRole(Role),

  #[error("unknown {what} value: {value:?}")]
  UnknownValue { what: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Stable, machine-readable tag attached to every error that crosses the
/// boundary to the presentation layer. The presentation layer owns the mapping
/// from code to user-facing text.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  strum::AsRefStr, strum::Display,
)]
pub enum ReasonCode {
  InvalidCredentials,
  DuplicateUsername,
  DuplicateName,
  WeakPassword,
  SelfDeletion,
  LastAdminProtected,
  Forbidden,
  SessionExpired,
  InvalidResetToken,
  InvalidRoleSubgroup,
  NotFound,
  BadRequest,
  Internal,
}

impl Error {
  pub fn code(&self) -> ReasonCode {
    match self {
      Self::InvalidRoleSubgroup { .. } | Self::UnassignableRole(_) => {
        ReasonCode::InvalidRoleSubgroup
      }
      Self::UnknownValue { .. } => ReasonCode::BadRequest,
    }
  }
}
