//! The access policy engine.
//!
//! Every function here is a pure function of its arguments: the caller passes
//! the freshly-resolved [`Identity`] of the actor and, for single-record
//! decisions, the [`OwnerRef`] of the target record. Nothing is read from
//! ambient state and nothing touches storage.
//!
//! | Role            | list predicate                 | read  | write / delete |
//! |-----------------|--------------------------------|-------|----------------|
//! | `administrador` | unrestricted                   | allow | allow          |
//! | `jefe`          | unrestricted                   | allow | deny           |
//! | `jefe_grupo`    | owner subgroup = own subgroup  | same  | same           |
//! | `comercial`     | owner = self                   | same  | same           |
//!
//! Anything the table does not cover (unrecognised role, missing subgroup,
//! inactive actor) fails closed: no rows, deny.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
  account::{Identity, Role, Subgroup},
  error::ReasonCode,
  record::OwnerRef,
};

// ─── Operations ──────────────────────────────────────────────────────────────

/// Record collections governed by the role table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Business,
  Activity,
  Incident,
}

/// Single-record actions. Creating a record is a `Write` against its
/// prospective owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
  Read,
  Write,
  Delete,
}

/// Operations on the account-management sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AccountOp {
  List,
  Read,
  Create,
  Update,
  Delete,
}

// ─── Predicate ───────────────────────────────────────────────────────────────

/// Which rows of an owned collection an actor may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
  Unrestricted,
  /// Rows whose owner currently belongs to this subgroup.
  Subgroup(Subgroup),
  /// Rows owned by this account.
  Owner(Uuid),
  /// No rows at all.
  Nothing,
}

impl Visibility {
  /// Whether a single row with the given ownership falls inside the predicate.
  pub fn admits(&self, owner: &OwnerRef) -> bool {
    match self {
      Self::Unrestricted => true,
      Self::Subgroup(s) => owner.owner_subgroup == Some(*s),
      Self::Owner(id) => owner.owner_id == *id,
      Self::Nothing => false,
    }
  }

  /// Attach caller-supplied filters. The result is always the conjunction of
  /// the predicate and the filters.
  pub fn and<F>(self, filters: F) -> Scoped<F> {
    Scoped { visibility: self, filters }
  }
}

/// A visibility predicate together with the filters it is ANDed with.
///
/// Only constructible through [`Visibility::and`] or [`scope`], so a query can
/// never carry filters without a predicate.
#[derive(Debug, Clone)]
pub struct Scoped<F> {
  visibility: Visibility,
  filters:    F,
}

impl<F> Scoped<F> {
  pub fn visibility(&self) -> Visibility { self.visibility }

  pub fn filters(&self) -> &F { &self.filters }
}

// ─── Verdict ─────────────────────────────────────────────────────────────────

/// Why a single-record or account operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DenyReason {
  /// `jefe` may look but not touch.
  ReadOnlyRole,
  OutsideSubgroup,
  NotOwner,
  AdministratorOnly,
  /// The actor has no usable scope (unrecognised role, missing subgroup,
  /// inactive account).
  Unscoped,
  SelfDeletion,
  LastAdminProtected,
}

impl DenyReason {
  /// Authorization denials collapse into `Forbidden`; invariant violations keep
  /// their own code.
  pub fn code(self) -> ReasonCode {
    match self {
      Self::SelfDeletion => ReasonCode::SelfDeletion,
      Self::LastAdminProtected => ReasonCode::LastAdminProtected,
      Self::ReadOnlyRole
      | Self::OutsideSubgroup
      | Self::NotOwner
      | Self::AdministratorOnly
      | Self::Unscoped => ReasonCode::Forbidden,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Allow,
  Deny(DenyReason),
}

impl Verdict {
  pub fn is_allowed(self) -> bool { matches!(self, Self::Allow) }

  pub fn into_result(self) -> Result<(), DenyReason> {
    match self {
      Self::Allow => Ok(()),
      Self::Deny(reason) => Err(reason),
    }
  }
}

// ─── Owned collections ───────────────────────────────────────────────────────

/// The list predicate for `actor`. Identical for every [`EntityKind`].
pub fn visibility(actor: &Identity) -> Visibility {
  if !actor.active {
    warn!(account = %actor.account_id, "inactive actor reached the policy engine");
    return Visibility::Nothing;
  }
  match actor.role {
    Role::Administrador | Role::Jefe => Visibility::Unrestricted,
    Role::JefeGrupo => match actor.subgroup {
      Some(subgroup) => Visibility::Subgroup(subgroup),
      None => {
        warn!(account = %actor.account_id, "jefe_grupo without subgroup; no rows visible");
        Visibility::Nothing
      }
    },
    Role::Comercial => Visibility::Owner(actor.account_id),
    Role::Unrecognized => {
      warn!(account = %actor.account_id, "unrecognised role; no rows visible");
      Visibility::Nothing
    }
  }
}

/// Shorthand for `visibility(actor).and(filters)`.
pub fn scope<F>(actor: &Identity, filters: F) -> Scoped<F> {
  visibility(actor).and(filters)
}

/// Decide a single-record operation on a record of `kind` owned by `target`.
pub fn authorize(
  actor: &Identity,
  action: Action,
  kind: EntityKind,
  target: &OwnerRef,
) -> Verdict {
  let verdict = match visibility(actor) {
    Visibility::Nothing => Verdict::Deny(DenyReason::Unscoped),
    Visibility::Unrestricted => match (actor.role, action) {
      (Role::Jefe, Action::Write | Action::Delete) => {
        Verdict::Deny(DenyReason::ReadOnlyRole)
      }
      _ => Verdict::Allow,
    },
    v @ Visibility::Subgroup(_) => {
      if v.admits(target) {
        Verdict::Allow
      } else {
        Verdict::Deny(DenyReason::OutsideSubgroup)
      }
    }
    v @ Visibility::Owner(_) => {
      if v.admits(target) {
        Verdict::Allow
      } else {
        Verdict::Deny(DenyReason::NotOwner)
      }
    }
  };

  if let Verdict::Deny(reason) = verdict {
    tracing::debug!(
      account = %actor.account_id,
      role = %actor.role,
      action = action.as_ref(),
      kind = kind.as_ref(),
      owner = %target.owner_id,
      reason = reason.as_ref(),
      "record access denied"
    );
  }
  verdict
}

// ─── Account management ──────────────────────────────────────────────────────

/// Account management is administrador-only, listing included.
pub fn authorize_accounts(actor: &Identity, op: AccountOp) -> Verdict {
  if actor.is_active_admin() {
    Verdict::Allow
  } else {
    tracing::debug!(
      account = %actor.account_id,
      role = %actor.role,
      op = op.as_ref(),
      "account management denied"
    );
    Verdict::Deny(DenyReason::AdministratorOnly)
  }
}

/// Decide whether `actor` may delete `target`, given how many active
/// administradores exist right now.
///
/// The last active administrador is protected before anything else, so the
/// sole administrador deleting themselves reports `LastAdminProtected`.
pub fn check_account_removal(
  actor: &Identity,
  target: &Identity,
  active_admins: u64,
) -> Verdict {
  if let Verdict::Deny(reason) = authorize_accounts(actor, AccountOp::Delete) {
    return Verdict::Deny(reason);
  }
  if target.is_active_admin() && active_admins <= 1 {
    return Verdict::Deny(DenyReason::LastAdminProtected);
  }
  if actor.account_id == target.account_id {
    return Verdict::Deny(DenyReason::SelfDeletion);
  }
  Verdict::Allow
}

/// Decide whether `actor` may turn `current` into `next`. Role and subgroup
/// changes are free except that the last active administrador cannot be
/// demoted or deactivated.
pub fn check_account_change(
  actor: &Identity,
  current: &Identity,
  next: &Identity,
  active_admins: u64,
) -> Verdict {
  if let Verdict::Deny(reason) = authorize_accounts(actor, AccountOp::Update) {
    return Verdict::Deny(reason);
  }
  if current.is_active_admin() && !next.is_active_admin() && active_admins <= 1 {
    return Verdict::Deny(DenyReason::LastAdminProtected);
  }
  Verdict::Allow
}
