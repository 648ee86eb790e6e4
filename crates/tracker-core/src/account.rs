//! Accounts, roles, subgroups and rep profiles.
//!
//! An [`Account`] carries the authentication concerns (credentials, role,
//! subgroup, active flag). The business-facing contact data of the person lives
//! in a separate [`RepProfile`] keyed by the same id; both are created and
//! removed together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Role ────────────────────────────────────────────────────────────────────

/// The single role an account holds. Determines its visibility predicate.
///
/// `Unrecognized` is what a stored role string that no longer parses decodes
/// to. It can never be assigned and every policy arm treats it as "no access".
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  strum::AsRefStr, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  Administrador,
  Jefe,
  JefeGrupo,
  Comercial,
  #[serde(skip_deserializing)]
  Unrecognized,
}

impl Role {
  /// Decode a stored role string, failing closed on anything unknown.
  pub fn from_stored(s: &str) -> Self {
    match s.parse() {
      Ok(role) => role,
      Err(_) => {
        tracing::warn!(value = %s, "unrecognised role in storage; treating as no access");
        Self::Unrecognized
      }
    }
  }

  /// Whether accounts with this role are scoped to a subgroup.
  pub fn requires_subgroup(self) -> bool {
    matches!(self, Self::JefeGrupo | Self::Comercial)
  }
}

// ─── Subgroup ────────────────────────────────────────────────────────────────

/// Partition tag scoping `jefe_grupo` and `comercial` visibility.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  strum::AsRefStr, strum::Display, strum::EnumString,
)]
pub enum Subgroup {
  A,
  B,
}

/// Enforce the role/subgroup pairing rule.
///
/// `jefe_grupo` and `comercial` need a subgroup; `administrador` and `jefe`
/// must not have one.
pub fn check_role_subgroup(role: Role, subgroup: Option<Subgroup>) -> Result<()> {
  match (role, subgroup) {
    (Role::Unrecognized, _) => Err(Error::UnassignableRole(role)),
    (Role::Administrador | Role::Jefe, None) => Ok(()),
    (Role::JefeGrupo | Role::Comercial, Some(_)) => Ok(()),
    _ => Err(Error::InvalidRoleSubgroup { role, subgroup }),
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// The live snapshot of an account that authorization decisions are made on.
/// Always re-read from storage per request; never embedded in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub account_id: Uuid,
  pub username:   String,
  pub role:       Role,
  pub subgroup:   Option<Subgroup>,
  pub active:     bool,
}

impl Identity {
  pub fn is_active_admin(&self) -> bool {
    self.active && self.role == Role::Administrador
  }
}

// ─── Rep profile ─────────────────────────────────────────────────────────────

/// Contact data of the person behind an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepProfile {
  pub first_name: String,
  pub last_name:  Option<String>,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  /// Sales territory, e.g. "Norte".
  pub zone:       Option<String>,
}

/// Partial update of a [`RepProfile`]; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub zone:       Option<String>,
}

impl ProfilePatch {
  pub fn is_empty(&self) -> bool {
    self.first_name.is_none()
      && self.last_name.is_none()
      && self.email.is_none()
      && self.phone.is_none()
      && self.zone.is_none()
  }
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// An account as returned to administrators. The credential hash is never part
/// of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  #[serde(flatten)]
  pub identity:   Identity,
  pub created_at: DateTime<Utc>,
  pub profile:    RepProfile,
}

/// Identity plus stored credential hash; only used by the authenticator.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub identity:        Identity,
  pub credential_hash: String,
}

/// Input to [`crate::store::TrackerStore::create_account`].
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub username:        String,
  pub credential_hash: String,
  pub role:            Role,
  pub subgroup:        Option<Subgroup>,
  pub active:          bool,
  pub profile:         RepProfile,
}

/// Administrator-driven change to an account. `None` fields are unchanged;
/// `subgroup: Some(None)` clears the subgroup.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
  pub role:            Option<Role>,
  pub subgroup:        Option<Option<Subgroup>>,
  pub active:          Option<bool>,
  pub credential_hash: Option<String>,
  pub profile:         ProfilePatch,
}

impl AccountPatch {
  /// Whether the patch touches role or subgroup and therefore needs the
  /// pairing rule re-checked.
  pub fn changes_scope(&self) -> bool {
    self.role.is_some() || self.subgroup.is_some()
  }

  /// The identity as it would look after applying this patch.
  pub fn preview(&self, current: &Identity) -> Identity {
    Identity {
      account_id: current.account_id,
      username:   current.username.clone(),
      role:       self.role.unwrap_or(current.role),
      subgroup:   self.subgroup.unwrap_or(current.subgroup),
      active:     self.active.unwrap_or(current.active),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.role.is_none()
      && self.subgroup.is_none()
      && self.active.is_none()
      && self.credential_hash.is_none()
      && self.profile.is_empty()
  }
}

/// Filters for the administrator account listing.
#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
  /// Free-text filter over username, names, email and zone.
  pub text:   Option<String>,
  pub role:   Option<Role>,
  pub zone:   Option<String>,
  pub active: Option<bool>,
}

/// An account row in the administrator listing, with its activity counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
  #[serde(flatten)]
  pub account:            Account,
  pub activities:         u64,
  pub pending_activities: u64,
}

/// Outcome of a guarded account update.
#[derive(Debug, Clone)]
pub enum AccountUpdate {
  Updated(Account),
  NotFound,
  /// Refused: the patch would demote or deactivate the last active
  /// administrador.
  LastAdmin,
}

impl AccountUpdate {
  pub fn updated(self) -> Option<Account> {
    match self {
      Self::Updated(account) => Some(account),
      Self::NotFound | Self::LastAdmin => None,
    }
  }
}

/// Outcome of a guarded account deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
  Deleted,
  NotFound,
  /// Refused: the target is the last active administrador.
  LastAdmin,
}
