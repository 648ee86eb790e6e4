//! Handlers for `/accounts` endpoints. Administrador only.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/accounts` | `?q=&role=&zone=&active=`; carries activity counts |
//! | `POST`   | `/accounts` | Role and subgroup must pair up |
//! | `GET`    | `/accounts/{id}` | |
//! | `PUT`    | `/accounts/{id}` | Partial; `"subgroup": null` clears it |
//! | `DELETE` | `/accounts/{id}` | Not self, not the last administrador |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Deserializer};
use tracker_auth::{check_strength, hash_password};
use tracker_core::{
  account::{
    Account, AccountPatch, AccountQuery, AccountSummary, AccountUpdate,
    NewAccount, ProfilePatch, RepProfile, Removal, Role, Subgroup,
    check_role_subgroup,
  },
  policy::{
    AccountOp, DenyReason, authorize_accounts, check_account_change,
    check_account_removal,
  },
  store::TrackerStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, guard::non_blank, session::CurrentUser};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

fn default_active() -> bool { true }

async fn fetch<S: TrackerStore>(store: &S, id: Uuid) -> Result<Account, ApiError> {
  store
    .get_account(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("account {id}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:      Option<String>,
  pub role:   Option<Role>,
  pub zone:   Option<String>,
  pub active: Option<bool>,
}

/// `GET /accounts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AccountSummary>>, ApiError>
where
  S: TrackerStore + 'static,
{
  authorize_accounts(&actor, AccountOp::List).into_result()?;
  let accounts = state
    .store
    .list_accounts(&AccountQuery {
      text:   params.q,
      role:   params.role,
      zone:   params.zone,
      active: params.active,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(accounts))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub username: String,
  pub password: String,
  pub role:     Role,
  pub subgroup: Option<Subgroup>,
  #[serde(default = "default_active")]
  pub active:   bool,
  #[serde(flatten)]
  pub profile:  RepProfile,
}

/// `POST /accounts`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  authorize_accounts(&actor, AccountOp::Create).into_result()?;
  non_blank("username", &body.username)?;
  non_blank("first_name", &body.profile.first_name)?;
  check_role_subgroup(body.role, body.subgroup)?;
  check_strength(&body.password)?;

  let account = state
    .store
    .create_account(NewAccount {
      username:        body.username,
      credential_hash: hash_password(&body.password)?,
      role:            body.role,
      subgroup:        body.subgroup,
      active:          body.active,
      profile:         body.profile,
    })
    .await
    .map_err(ApiError::store)?
    .ok_or(tracker_auth::AuthError::DuplicateUsername)?;

  tracing::info!(
    actor = %actor.account_id,
    account = %account.identity.account_id,
    role = %account.identity.role,
    "account created"
  );
  Ok((StatusCode::CREATED, Json(account)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /accounts/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Account>, ApiError>
where
  S: TrackerStore + 'static,
{
  authorize_accounts(&actor, AccountOp::Read).into_result()?;
  Ok(Json(fetch(&*state.store, id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
  pub role:     Option<Role>,
  #[serde(default, deserialize_with = "double_option")]
  pub subgroup: Option<Option<Subgroup>>,
  pub active:   Option<bool>,
  pub password: Option<String>,
  #[serde(flatten)]
  pub profile:  ProfilePatch,
}

/// `PUT /accounts/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Account>, ApiError>
where
  S: TrackerStore + 'static,
{
  authorize_accounts(&actor, AccountOp::Update).into_result()?;
  let current = fetch(&*state.store, id).await?.identity;

  let credential_hash = match &body.password {
    Some(password) => {
      check_strength(password)?;
      Some(hash_password(password)?)
    }
    None => None,
  };
  let patch = AccountPatch {
    role: body.role,
    subgroup: body.subgroup,
    active: body.active,
    credential_hash,
    profile: body.profile,
  };

  let next = patch.preview(&current);
  if patch.changes_scope() {
    check_role_subgroup(next.role, next.subgroup)?;
  }
  let active_admins = state.store.count_active_admins().await.map_err(ApiError::store)?;
  check_account_change(&actor, &current, &next, active_admins).into_result()?;

  // The store re-checks the last-admin rule atomically; this read only
  // answers early.
  let revoke = patch.credential_hash.is_some() || (current.active && !next.active);
  let account = match state.store.update_account(id, patch).await.map_err(ApiError::store)? {
    AccountUpdate::Updated(account) => account,
    AccountUpdate::NotFound => return Err(ApiError::NotFound(format!("account {id}"))),
    AccountUpdate::LastAdmin => return Err(DenyReason::LastAdminProtected.into()),
  };

  if revoke {
    state.auth.sessions().destroy_all(id).await?;
  }
  tracing::info!(actor = %actor.account_id, account = %id, "account updated");
  Ok(Json(account))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /accounts/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore + 'static,
{
  authorize_accounts(&actor, AccountOp::Delete).into_result()?;
  let target = fetch(&*state.store, id).await?.identity;
  let active_admins = state.store.count_active_admins().await.map_err(ApiError::store)?;
  check_account_removal(&actor, &target, active_admins).into_result()?;

  match state.store.delete_account(id).await.map_err(ApiError::store)? {
    Removal::Deleted => {
      tracing::info!(actor = %actor.account_id, account = %id, "account deleted");
      Ok(StatusCode::NO_CONTENT)
    }
    Removal::NotFound => Err(ApiError::NotFound(format!("account {id}"))),
    Removal::LastAdmin => Err(DenyReason::LastAdminProtected.into()),
  }
}
