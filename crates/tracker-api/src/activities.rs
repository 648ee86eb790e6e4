//! Handlers for `/activities` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/activities` | `?q=&owner_id=&subgroup=&business_id=&kind=&status=&from=&until=` |
//! | `POST`   | `/activities` | Optional `owner_id`, defaults to the caller |
//! | `GET`    | `/activities/{id}` | |
//! | `PUT`    | `/activities/{id}` | Partial |
//! | `DELETE` | `/activities/{id}` | |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracker_core::{
  account::Subgroup,
  policy::{Action, EntityKind, scope},
  record::{
    Activity, ActivityFilter, ActivityKind, ActivityPatch, ActivityStatus,
    NewActivity,
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

async fn fetch<S: TrackerStore>(store: &S, id: Uuid) -> Result<Activity, ApiError> {
  store
    .get_activity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("activity {id}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:           Option<String>,
  pub owner_id:    Option<Uuid>,
  pub subgroup:    Option<Subgroup>,
  pub business_id: Option<Uuid>,
  pub kind:        Option<ActivityKind>,
  pub status:      Option<ActivityStatus>,
  pub from:        Option<NaiveDate>,
  pub until:       Option<NaiveDate>,
}

/// `GET /activities`, newest first.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Activity>>, ApiError>
where
  S: TrackerStore + 'static,
{
  if let (Some(from), Some(until)) = (params.from, params.until) {
    if from > until {
      return Err(ApiError::BadRequest("from is after until".into()));
    }
  }
  let query = scope(&actor, ActivityFilter {
    text:           params.q,
    owner_id:       params.owner_id,
    owner_subgroup: params.subgroup,
    business_id:    params.business_id,
    kind:           params.kind,
    status:         params.status,
    from:           params.from,
    until:          params.until,
  });
  let activities = state.store.list_activities(&query).await.map_err(ApiError::store)?;
  Ok(Json(activities))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner_id: Option<Uuid>,
  #[serde(flatten)]
  pub activity: NewActivity,
}

/// `POST /activities`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  non_blank("title", &body.activity.title)?;
  let owner = prospective_owner(&*state.store, &actor, body.owner_id).await?;
  require(&actor, Action::Write, EntityKind::Activity, &owner)?;
  if let Some(business_id) = body.activity.business_id {
    readable_business(&*state.store, &actor, business_id).await?;
  }

  let activity = state
    .store
    .create_activity(owner.owner_id, body.activity)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    actor = %actor.account_id,
    activity = %activity.activity_id,
    owner = %owner.owner_id,
    "activity created"
  );
  Ok((StatusCode::CREATED, Json(activity)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /activities/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Activity>, ApiError>
where
  S: TrackerStore + 'static,
{
  let activity = fetch(&*state.store, id).await?;
  require(&actor, Action::Read, EntityKind::Activity, &activity.owner)?;
  Ok(Json(activity))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /activities/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
  Json(patch): Json<ActivityPatch>,
) -> Result<Json<Activity>, ApiError>
where
  S: TrackerStore + 'static,
{
  let current = fetch(&*state.store, id).await?;
  require(&actor, Action::Write, EntityKind::Activity, &current.owner)?;
  if let Some(title) = &patch.title {
    non_blank("title", title)?;
  }
  if let Some(business_id) = patch.business_id {
    readable_business(&*state.store, &actor, business_id).await?;
  }

  let activity = state
    .store
    .update_activity(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("activity {id}")))?;
  Ok(Json(activity))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /activities/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore + 'static,
{
  let current = fetch(&*state.store, id).await?;
  require(&actor, Action::Delete, EntityKind::Activity, &current.owner)?;
  if !state.store.delete_activity(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("activity {id}")));
  }
  tracing::info!(actor = %actor.account_id, activity = %id, "activity deleted");
  Ok(StatusCode::NO_CONTENT)
}
