//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | New unassigned `comercial`; 201 |
//! | `POST` | `/auth/login` | Sets the session cookie |
//! | `POST` | `/auth/logout` | Clears the cookie; idempotent |
//! | `GET`  | `/auth/me` | Account of the current session |
//! | `POST` | `/auth/forgot-password` | Always 202 |
//! | `POST` | `/auth/reset-password` | Body: `{"token", "password"}` |

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracker_auth::Registration;
use tracker_core::{account::Identity, store::TrackerStore};

use crate::{
  AppState,
  error::ApiError,
  guard::non_blank,
  session::{CurrentUser, cleared_cookie, session_cookie, session_token},
};

// ─── Register ────────────────────────────────────────────────────────────────

/// `POST /auth/register`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Registration>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  non_blank("username", &body.username)?;
  non_blank("first_name", &body.profile.first_name)?;
  let identity = state.auth.register(body).await?;
  Ok((StatusCode::CREATED, Json(identity)))
}

// ─── Login / logout ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  #[serde(flatten)]
  pub identity:   Identity,
  pub expires_at: DateTime<Utc>,
}

/// `POST /auth/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  let session = state.auth.login(&body.username, &body.password).await?;
  let cookie = session_cookie(&session.token, state.auth.sessions().ttl())?;
  Ok((
    [(header::SET_COOKIE, cookie)],
    Json(LoginResponse { identity: session.identity, expires_at: session.expires_at }),
  ))
}

/// `POST /auth/logout`
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  if let Some(token) = session_token(&headers) {
    state.auth.sessions().destroy(token).await?;
  }
  Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cleared_cookie())]))
}

/// `GET /auth/me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  CurrentUser(actor): CurrentUser,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  let account = state
    .store
    .get_account(actor.account_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthenticated)?;
  Ok(Json(account))
}

// ─── Password reset ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ForgotBody {
  pub email: String,
}

/// `POST /auth/forgot-password`: the response never reveals whether the
/// address is known.
pub async fn forgot_password<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ForgotBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  if let Some(ticket) = state.auth.request_password_reset(&body.email).await? {
    if let Some(hook) = &state.reset_hook {
      hook(&ticket);
    }
  }
  Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

#[derive(Debug, Deserialize)]
pub struct ResetBody {
  pub token:    String,
  pub password: String,
}

/// `POST /auth/reset-password`
pub async fn reset_password<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ResetBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackerStore + 'static,
{
  state.auth.reset_password(&body.token, &body.password).await?;
  Ok(StatusCode::NO_CONTENT)
}
