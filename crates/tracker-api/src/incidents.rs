//! Handlers for `/incidents` endpoints and their comments.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/incidents` | `?q=&owner_id=&subgroup=&business_id=&status=&priority=&category=` |
//! | `POST`   | `/incidents` | Optional `owner_id`, defaults to the caller |
//! | `GET`    | `/incidents/{id}` | |
//! | `PUT`    | `/incidents/{id}` | Partial |
//! | `DELETE` | `/incidents/{id}` | Removes its comments too |
//! | `GET`    | `/incidents/{id}/comments` | Oldest first |
//! | `POST`   | `/incidents/{id}/comments` | Body: `{"body": "..."}` |
//! | `DELETE` | `/comments/{id}` | |
//!
//! Comments carry no owner of their own; every comment operation is decided
//! against the owning incident.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tracker_core::{
  account::Subgroup,
  policy::{Action, EntityKind, scope},
  record::{
    Comment, Incident, IncidentFilter, IncidentPatch, IncidentStatus,
    NewIncident, Priority,
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

async fn fetch<S: TrackerStore>(store: &S, id: Uuid) -> Result<Incident, ApiError> {
  store
    .get_incident(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("incident {id}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:           Option<String>,
  pub owner_id:    Option<Uuid>,
  pub subgroup:    Option<Subgroup>,
  pub business_id: Option<Uuid>,
  pub status:      Option<IncidentStatus>,
  pub priority:    Option<Priority>,
  pub category:    Option<String>,
}

/// `GET /incidents`, most urgent first.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Incident>>, ApiError>
where
  S: TrackerStore + 'static,
{
  let query = scope(&actor, IncidentFilter {
    text:           params.q,
    owner_id:       params.owner_id,
    owner_subgroup: params.subgroup,
    business_id:    params.business_id,
    status:         params.status,
    priority:       params.priority,
    category:       params.category,
  });
  let incidents = state.store.list_incidents(&query).await.map_err(ApiError::store)?;
  Ok(Json(incidents))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub owner_id: Option<Uuid>,
  #[serde(flatten)]
  pub incident: NewIncident,
}

/// `POST /incidents`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  non_blank("title", &body.incident.title)?;
  let owner = prospective_owner(&*state.store, &actor, body.owner_id).await?;
  require(&actor, Action::Write, EntityKind::Incident, &owner)?;
  readable_business(&*state.store, &actor, body.incident.business_id).await?;

  let incident = state
    .store
    .create_incident(owner.owner_id, body.incident)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(
    actor = %actor.account_id,
    incident = %incident.incident_id,
    owner = %owner.owner_id,
    priority = incident.priority.as_ref(),
    "incident created"
  );
  Ok((StatusCode::CREATED, Json(incident)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /incidents/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Incident>, ApiError>
where
  S: TrackerStore + 'static,
{
  let incident = fetch(&*state.store, id).await?;
  require(&actor, Action::Read, EntityKind::Incident, &incident.owner)?;
  Ok(Json(incident))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /incidents/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
  Json(patch): Json<IncidentPatch>,
) -> Result<Json<Incident>, ApiError>
where
  S: TrackerStore + 'static,
{
  let current = fetch(&*state.store, id).await?;
  require(&actor, Action::Write, EntityKind::Incident, &current.owner)?;
  if let Some(title) = &patch.title {
    non_blank("title", title)?;
  }

  let incident = state
    .store
    .update_incident(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("incident {id}")))?;
  if incident.status != current.status {
    tracing::info!(
      actor = %actor.account_id,
      incident = %id,
      status = incident.status.as_ref(),
      "incident status changed"
    );
  }
  Ok(Json(incident))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /incidents/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore + 'static,
{
  let current = fetch(&*state.store, id).await?;
  require(&actor, Action::Delete, EntityKind::Incident, &current.owner)?;
  if !state.store.delete_incident(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("incident {id}")));
  }
  tracing::info!(actor = %actor.account_id, incident = %id, "incident deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Comments ─────────────────────────────────────────────────────────────────

/// `GET /incidents/{id}/comments`
pub async fn list_comments<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, ApiError>
where
  S: TrackerStore + 'static,
{
  let incident = fetch(&*state.store, id).await?;
  require(&actor, Action::Read, EntityKind::Incident, &incident.owner)?;
  let comments = state.store.list_comments(id).await.map_err(ApiError::store)?;
  Ok(Json(comments))
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
  pub body: String,
}

/// `POST /incidents/{id}/comments`
pub async fn add_comment<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
  Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  non_blank("body", &body.body)?;
  let incident = fetch(&*state.store, id).await?;
  require(&actor, Action::Write, EntityKind::Incident, &incident.owner)?;

  let comment = state
    .store
    .add_comment(id, actor.username.clone(), body.body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(comment)))
}

/// `DELETE /comments/{id}`
pub async fn delete_comment<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: TrackerStore + 'static,
{
  let comment = state
    .store
    .get_comment(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("comment {id}")))?;
  let incident = fetch(&*state.store, comment.incident_id).await?;
  require(&actor, Action::Delete, EntityKind::Incident, &incident.owner)?;

  if !state.store.delete_comment(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("comment {id}")));
  }
  Ok(StatusCode::NO_CONTENT)
}
