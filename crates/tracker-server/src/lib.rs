//! Wiring for the tracker server binary: configuration, first-run bootstrap,
//! the session sweeper and the top-level router.

pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration as StdDuration};

use axum::Router;
use serde::Deserialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracker_api::{AppState, ResetHook, api_router};
use tracker_auth::{ResetTicket, SessionManager};
use tracker_core::{
  account::{AccountQuery, Identity, NewAccount, RepProfile, Role},
  session::SESSION_TTL_DAYS,
  store::TrackerStore,
};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_session_ttl_days() -> i64 { SESSION_TTL_DAYS }

fn default_sweep_interval_secs() -> u64 { 3600 }

/// Ten years; also keeps `chrono::Duration::days` far from its limits.
const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// Runtime server configuration, deserialised from `config.toml` and
/// `TRACKER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                          String,
  pub port:                          u16,
  pub store_path:                    PathBuf,
  #[serde(default = "default_session_ttl_days")]
  pub session_ttl_days:              i64,
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs:           u64,
  /// Seeded as an administrador when the store holds no accounts.
  pub bootstrap_admin_username:      Option<String>,
  /// Argon2 PHC string, as printed by `server --hash-password`.
  pub bootstrap_admin_password_hash: Option<String>,
}

impl ServerConfig {
  /// Deserialise and validate the merged configuration sources.
  pub fn from_settings(settings: config::Config) -> Result<Self, Error> {
    let cfg: Self = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> Result<(), Error> {
    if !(1..=MAX_SESSION_TTL_DAYS).contains(&self.session_ttl_days) {
      return Err(Error::InvalidConfig(format!(
        "session_ttl_days must be between 1 and {MAX_SESSION_TTL_DAYS}, got {}",
        self.session_ttl_days
      )));
    }
    if self.sweep_interval_secs == 0 {
      return Err(Error::InvalidConfig("sweep_interval_secs must be positive".into()));
    }
    Ok(())
  }

  pub fn session_ttl(&self) -> chrono::Duration {
    chrono::Duration::days(self.session_ttl_days)
  }

  pub fn sweep_interval(&self) -> StdDuration { StdDuration::from_secs(self.sweep_interval_secs) }
}

// ─── Bootstrap ────────────────────────────────────────────────────────────────

/// Seed the configured administrador if the store has no accounts at all.
/// Returns the created identity, or `None` when nothing was done.
pub async fn bootstrap_admin<S: TrackerStore>(
  store: &S,
  config: &ServerConfig,
) -> Result<Option<Identity>, Error> {
  let existing = store
    .list_accounts(&AccountQuery::default())
    .await
    .map_err(Error::store)?;
  if !existing.is_empty() {
    return Ok(None);
  }

  let (Some(username), Some(hash)) = (
    config.bootstrap_admin_username.as_deref(),
    config.bootstrap_admin_password_hash.as_deref(),
  ) else {
    warn!("no accounts exist and no bootstrap administrador is configured");
    return Ok(None);
  };
  argon2::PasswordHash::new(hash)
    .map_err(|e| Error::Bootstrap(format!("invalid password hash: {e}")))?;

  let account = store
    .create_account(NewAccount {
      username:        username.to_owned(),
      credential_hash: hash.to_owned(),
      role:            Role::Administrador,
      subgroup:        None,
      active:          true,
      profile:         RepProfile { first_name: username.to_owned(), ..Default::default() },
    })
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::Bootstrap(format!("username {username} is taken")))?;

  info!(account = %account.identity.account_id, %username, "bootstrap administrador created");
  Ok(Some(account.identity))
}

// ─── Background tasks ─────────────────────────────────────────────────────────

/// Purge expired sessions every `every`, forever. Failures are logged and the
/// next tick tries again.
pub fn spawn_sweeper<S>(sessions: SessionManager<S>, every: StdDuration) -> JoinHandle<()>
where
  S: TrackerStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      if let Err(e) = sessions.sweep().await {
        error!(error = %e, "session sweep failed");
      }
    }
  })
}

/// Reset delivery for deployments without mail: the ticket goes to the log.
pub fn log_reset_hook() -> ResetHook {
  Arc::new(|ticket: &ResetTicket| {
    info!(
      account = %ticket.account_id,
      expires_at = %ticket.expires_at,
      "password reset issued"
    );
    debug!(account = %ticket.account_id, token = %ticket.token, "password reset token");
  })
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API mounted under `/api`.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: TrackerStore + 'static,
{
  Router::new().nest("/api", api_router(state))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
