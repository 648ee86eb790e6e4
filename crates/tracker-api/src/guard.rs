//! Shared authorization steps used by the record handlers.

use tracker_core::{
  account::Identity,
  policy::{Action, DenyReason, EntityKind, Visibility, authorize, visibility},
  record::{Business, OwnerRef},
  store::TrackerStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// Ask the policy engine for a verdict and turn a denial into an error.
pub fn require(
  actor: &Identity,
  action: Action,
  kind: EntityKind,
  owner: &OwnerRef,
) -> Result<(), ApiError> {
  Ok(authorize(actor, action, kind, owner).into_result()?)
}

/// The denial an actor confined to its own records (or to none) gets in place
/// of a lookup that would reveal whether someone else's id exists.
fn confined(actor: &Identity) -> Option<DenyReason> {
  match visibility(actor) {
    Visibility::Owner(_) => Some(DenyReason::NotOwner),
    Visibility::Nothing => Some(DenyReason::Unscoped),
    Visibility::Unrestricted | Visibility::Subgroup(_) => None,
  }
}

/// Ownership of a record about to be created on behalf of `owner_id`, or of the
/// actor when none is given. Creation is a write against this owner.
pub async fn prospective_owner<S: TrackerStore>(
  store: &S,
  actor: &Identity,
  owner_id: Option<Uuid>,
) -> Result<OwnerRef, ApiError> {
  match owner_id {
    None => Ok(OwnerRef { owner_id: actor.account_id, owner_subgroup: actor.subgroup }),
    Some(id) if id == actor.account_id => {
      Ok(OwnerRef { owner_id: id, owner_subgroup: actor.subgroup })
    }
    Some(id) => {
      if let Some(reason) = confined(actor) {
        return Err(reason.into());
      }
      let owner = store
        .get_identity(id)
        .await
        .map_err(ApiError::store)?
        .ok_or_else(|| ApiError::BadRequest(format!("unknown owner {id}")))?;
      Ok(OwnerRef { owner_id: owner.account_id, owner_subgroup: owner.subgroup })
    }
  }
}

/// A business the actor may read, for linking an activity or incident to it.
pub async fn readable_business<S: TrackerStore>(
  store: &S,
  actor: &Identity,
  business_id: Uuid,
) -> Result<Business, ApiError> {
  let restricted = confined(actor);
  if let Some(reason @ DenyReason::Unscoped) = restricted {
    return Err(reason.into());
  }
  let Some(business) = store.get_business(business_id).await.map_err(ApiError::store)? else {
    return Err(match restricted {
      Some(reason) => reason.into(),
      None => ApiError::NotFound(format!("business {business_id}")),
    });
  };
  require(actor, Action::Read, EntityKind::Business, &business.owner)?;
  Ok(business)
}

/// Reject blank required text fields.
pub fn non_blank(field: &str, value: &str) -> Result<(), ApiError> {
  if value.trim().is_empty() {
    return Err(ApiError::BadRequest(format!("{field} must not be empty")));
  }
  Ok(())
}
