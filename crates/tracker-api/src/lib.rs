//! JSON REST API for the tracker.
//!
//! Exposes an axum [`Router`] backed by any [`TrackerStore`]. Every handler
//! except login, registration and password reset requires a live session
//! cookie; access decisions are made by [`tracker_core::policy`] on the
//! identity re-read from storage for each request.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tracker_api::api_router(state))
//! ```

pub mod accounts;
pub mod activities;
pub mod auth;
pub mod businesses;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod incidents;
pub mod session;


use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;
use tracker_auth::{Authenticator, ResetTicket, SessionManager};
use tracker_core::store::TrackerStore;

pub use error::ApiError;

/// Out-of-band delivery of password-reset tickets (mail, log, ...).
pub type ResetHook = Arc<dyn Fn(&ResetTicket) + Send + Sync>;

/// Shared handler state.
pub struct AppState<S> {
  pub store:      Arc<S>,
  pub auth:       Authenticator<S>,
  pub reset_hook: Option<ResetHook>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      auth:       self.auth.clone(),
      reset_hook: self.reset_hook.clone(),
    }
  }
}

impl<S: TrackerStore> AppState<S> {
  /// State whose sessions last `session_ttl` from login.
  pub fn new(store: Arc<S>, session_ttl: chrono::Duration) -> Self {
    let sessions = SessionManager::new(Arc::clone(&store)).with_ttl(session_ttl);
    Self { store, auth: Authenticator::new(sessions), reset_hook: None }
  }

  pub fn with_reset_hook(mut self, hook: ResetHook) -> Self {
    self.reset_hook = Some(hook);
    self
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: TrackerStore + 'static,
{
  Router::new()
    // Auth
    .route("/auth/register", post(auth::register::<S>))
    .route("/auth/login", post(auth::login::<S>))
    .route("/auth/logout", post(auth::logout::<S>))
    .route("/auth/me", get(auth::me::<S>))
    .route("/auth/forgot-password", post(auth::forgot_password::<S>))
    .route("/auth/reset-password", post(auth::reset_password::<S>))
    // Accounts
    .route("/accounts", get(accounts::list::<S>).post(accounts::create::<S>))
    .route(
      "/accounts/{id}",
      get(accounts::get_one::<S>)
        .put(accounts::update::<S>)
        .delete(accounts::delete::<S>),
    )
    // Businesses
    .route("/businesses", get(businesses::list::<S>).post(businesses::create::<S>))
    .route(
      "/businesses/{id}",
      get(businesses::get_one::<S>)
        .put(businesses::update::<S>)
        .delete(businesses::delete::<S>),
    )
    .route("/businesses/{id}/incidents", get(businesses::incidents::<S>))
    // Activities
    .route("/activities", get(activities::list::<S>).post(activities::create::<S>))
    .route(
      "/activities/{id}",
      get(activities::get_one::<S>)
        .put(activities::update::<S>)
        .delete(activities::delete::<S>),
    )
    // Incidents
    .route("/incidents", get(incidents::list::<S>).post(incidents::create::<S>))
    .route(
      "/incidents/{id}",
      get(incidents::get_one::<S>)
        .put(incidents::update::<S>)
        .delete(incidents::delete::<S>),
    )
    .route(
      "/incidents/{id}/comments",
      get(incidents::list_comments::<S>).post(incidents::add_comment::<S>),
    )
    .route("/comments/{id}", delete(incidents::delete_comment::<S>))
    // Dashboard
    .route("/health", get(dashboard::health))
    .route("/stats", get(dashboard::stats::<S>))
    .route("/sectors", get(dashboard::sectors::<S>))
    .route("/zones", get(dashboard::zones::<S>))
    .route("/incident-categories", get(dashboard::incident_categories::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
