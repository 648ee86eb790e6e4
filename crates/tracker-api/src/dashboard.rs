//! `GET /health`, `GET /stats` and the filter suggestion lists
//! (`/sectors`, `/zones`, `/incident-categories`).

use axum::{Json, extract::State};
use chrono::Utc;
use serde_json::{Value, json};
use tracker_core::{
  account::Identity,
  policy::visibility,
  record::{Lookup, Stats},
  store::TrackerStore,
};

use crate::{AppState, error::ApiError, session::CurrentUser};

/// `GET /health`: unauthenticated liveness check.
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

/// `GET /stats`: dashboard counts limited to what the caller can see.
pub async fn stats<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
) -> Result<Json<Stats>, ApiError>
where
  S: TrackerStore + 'static,
{
  let stats = state
    .store
    .stats(visibility(&actor), Utc::now().date_naive())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(stats))
}

async fn lookup<S: TrackerStore>(
  state: &AppState<S>,
  actor: &Identity,
  lookup: Lookup,
) -> Result<Json<Vec<String>>, ApiError> {
  let values = state
    .store
    .lookup(visibility(actor), lookup)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(values))
}

/// `GET /sectors`
pub async fn sectors<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: TrackerStore + 'static,
{
  lookup(&state, &actor, Lookup::Sectors).await
}

/// `GET /zones`
pub async fn zones<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: TrackerStore + 'static,
{
  lookup(&state, &actor, Lookup::Zones).await
}

/// `GET /incident-categories`
pub async fn incident_categories<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: TrackerStore + 'static,
{
  lookup(&state, &actor, Lookup::IncidentCategories).await
}
