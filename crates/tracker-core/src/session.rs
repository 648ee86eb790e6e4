//! Session and password-reset records.
//!
//! Both are keyed by the hex SHA-256 digest of an opaque token. The token
//! itself is only ever held by the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default absolute session lifetime, in days.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Lifetime of a password-reset ticket, in minutes.
pub const RESET_TTL_MINUTES: i64 = 60;

/// A fixed-window binding of a token digest to an account. Never updated in
/// place; a new login issues a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub token_digest: String,
  pub account_id:   Uuid,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

impl Session {
  /// A session is live iff `now < expires_at`.
  pub fn is_live_at(&self, now: DateTime<Utc>) -> bool { now < self.expires_at }
}

/// A single-use password-reset grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
  pub token_digest: String,
  pub account_id:   Uuid,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}
