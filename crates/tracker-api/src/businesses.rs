//! Handlers for `/businesses` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/businesses` | `?q=&sector=&owner_id=&subgroup=` |
//! | `POST`   | `/businesses` | Optional `owner_id`, defaults to the caller |
//! | `GET`    | `/businesses/{id}` | |
//! | `PUT`    | `/businesses/{id}` | Partial |
//! | `DELETE` | `/businesses/{id}` | Removes its incidents and unlinks its activities; needs rights over each |
//! | `GET`    | `/businesses/{id}/incidents` | |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tracker_core::{
  account::Subgroup,
  policy::{Action, EntityKind, Visibility, scope},
  record::{
    ActivityFilter, Business, BusinessFilter, BusinessPatch, BusinessUpdate,
    Incident, IncidentFilter, NewBusiness,
  },
  store::TrackerStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  guard::{non_blank, prospective_owner, readable_business, require},
  session::CurrentUser,
};

async fn fetch<S: TrackerStore>(store: &S, id: Uuid) -> Result<Business, ApiError> {
  store
    .get_business(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("business {id}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:        Option<String>,
  pub sector:   Option<String>,
  pub owner_id: Option<Uuid>,
  pub subgroup: Option<Subgroup>,
}

/// `GET /businesses`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Business>>, ApiError>
where
  S: TrackerStore + 'static,
{
  let query = scope(&actor, BusinessFilter {
    text:           params.q,
    sector:         params.sector,
    owner_id:       params.owner_id,
    owner_subgroup: params.subgroup,
  });
  let businesses = state.store.list_businesses(&query).await.map_err(ApiError::store)?;
  Ok(Json(businesses))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner_id: Option<Uuid>,
  #[serde(flatten)]
  pub business: NewBusiness,
}

/// `POST /businesses`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  non_blank("name", &body.business.name)?;
  let owner = prospective_owner(&*state.store, &actor, body.owner_id).await?;
  require(&actor, Action::Write, EntityKind::Business, &owner)?;

  let name = body.business.name.clone();
  let business = state
    .store
    .create_business(owner.owner_id, body.business)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::NameTaken(name))?;
  tracing::info!(
    actor = %actor.account_id,
    business = %business.business_id,
    owner = %owner.owner_id,
    "business created"
  );
  Ok((StatusCode::CREATED, Json(business)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /businesses/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Business>, ApiError>
where
  S: TrackerStore + 'static,
{
  Ok(Json(readable_business(&*state.store, &actor, id).await?))
}

/// `GET /businesses/{id}/incidents`
pub async fn incidents<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Incident>>, ApiError>
where
  S: TrackerStore + 'static,
{
  readable_business(&*state.store, &actor, id).await?;
  let query = scope(&actor, IncidentFilter { business_id: Some(id), ..Default::default() });
  let incidents = state.store.list_incidents(&query).await.map_err(ApiError::store)?;
  Ok(Json(incidents))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /businesses/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
  Json(patch): Json<BusinessPatch>,
) -> Result<Json<Business>, ApiError>
where
  S: TrackerStore + 'static,
{
  let current = fetch(&*state.store, id).await?;
  require(&actor, Action::Write, EntityKind::Business, &current.owner)?;
  if let Some(name) = &patch.name {
    non_blank("name", name)?;
  }

  let name = patch.name.clone().unwrap_or_default();
  match state.store.update_business(id, patch).await.map_err(ApiError::store)? {
    BusinessUpdate::Updated(business) => Ok(Json(business)),
    BusinessUpdate::NotFound => Err(ApiError::NotFound(format!("business {id}"))),
    BusinessUpdate::NameTaken => Err(ApiError::NameTaken(name)),
  }
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /businesses/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore + 'static,
{
  let current = fetch(&*state.store, id).await?;
  require(&actor, Action::Delete, EntityKind::Business, &current.owner)?;

  // Deleting cascades to every incident on the business and unlinks every
  // activity, whoever owns them.
  let incidents = Visibility::Unrestricted.and(IncidentFilter {
    business_id: Some(id),
    ..Default::default()
  });
  for incident in state.store.list_incidents(&incidents).await.map_err(ApiError::store)? {
    require(&actor, Action::Delete, EntityKind::Incident, &incident.owner)?;
  }
  let activities = Visibility::Unrestricted.and(ActivityFilter {
    business_id: Some(id),
    ..Default::default()
  });
  for activity in state.store.list_activities(&activities).await.map_err(ApiError::store)? {
    require(&actor, Action::Write, EntityKind::Activity, &activity.owner)?;
  }

  if !state.store.delete_business(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("business {id}")));
  }
  tracing::info!(actor = %actor.account_id, business = %id, "business deleted");
  Ok(StatusCode::NO_CONTENT)
}
