//! Password login, self registration and password reset.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;
use tracker_core::{
  account::{AccountPatch, Identity, NewAccount, RepProfile, Role},
  session::{PasswordReset, RESET_TTL_MINUTES},
  store::TrackerStore,
};
use uuid::Uuid;

use crate::{
  password::{check_strength, hash_password, verify_dummy, verify_password},
  session::SessionManager,
  token, AuthError, Result,
};

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginSession {
  pub identity:   Identity,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

/// Self-registration request. Carries no role or subgroup: every registered
/// account starts as an unassigned `comercial`.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
  pub username: String,
  pub password: String,
  #[serde(flatten)]
  pub profile:  RepProfile,
}

/// A password-reset grant, to be delivered out of band.
#[derive(Debug, Clone)]
pub struct ResetTicket {
  pub account_id: Uuid,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

pub struct Authenticator<S> {
  store:    Arc<S>,
  sessions: SessionManager<S>,
}

impl<S> Clone for Authenticator<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), sessions: self.sessions.clone() }
  }
}

impl<S: TrackerStore> Authenticator<S> {
  pub fn new(sessions: SessionManager<S>) -> Self {
    Self { store: Arc::clone(sessions.store()), sessions }
  }

  pub fn sessions(&self) -> &SessionManager<S> { &self.sessions }

  /// Check credentials and open a session. Every failure is the same
  /// [`AuthError::InvalidCredentials`].
  pub async fn login(&self, username: &str, password: &str) -> Result<LoginSession> {
    let credentials = self
      .store
      .find_credentials(username)
      .await
      .map_err(AuthError::store)?;

    let Some(credentials) = credentials else {
      verify_dummy(password);
      info!("login failed");
      return Err(AuthError::InvalidCredentials);
    };

    let matches = verify_password(password, &credentials.credential_hash);
    if !matches || !credentials.identity.active {
      info!("login failed");
      return Err(AuthError::InvalidCredentials);
    }

    let identity = credentials.identity;
    let issued = self.sessions.create_session(identity.account_id).await?;
    info!(account = %identity.account_id, role = %identity.role, "login");
    Ok(LoginSession { identity, token: issued.token, expires_at: issued.expires_at })
  }

  /// Create a new active `comercial` with no subgroup.
  pub async fn register(&self, registration: Registration) -> Result<Identity> {
    check_strength(&registration.password)?;
    let credential_hash = hash_password(&registration.password)?;

    let created = self
      .store
      .create_account(NewAccount {
        username: registration.username,
        credential_hash,
        role: Role::Comercial,
        subgroup: None,
        active: true,
        profile: registration.profile,
      })
      .await
      .map_err(AuthError::store)?
      .ok_or(AuthError::DuplicateUsername)?;

    info!(account = %created.identity.account_id, "account registered");
    Ok(created.identity)
  }

  /// Issue a reset ticket for the active account registered under `email`.
  /// Returns `None` for unknown or inactive accounts.
  pub async fn request_password_reset(&self, email: &str) -> Result<Option<ResetTicket>> {
    self.request_password_reset_at(email, Utc::now()).await
  }

  pub async fn request_password_reset_at(
    &self,
    email: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<ResetTicket>> {
    let identity = self.store.find_by_email(email).await.map_err(AuthError::store)?;
    let Some(identity) = identity.filter(|i| i.active) else {
      info!("password reset requested for unknown address");
      return Ok(None);
    };

    let token = token::generate();
    let expires_at = now + Duration::minutes(RESET_TTL_MINUTES);
    self
      .store
      .insert_reset(PasswordReset {
        token_digest: token::digest(&token),
        account_id: identity.account_id,
        created_at: now,
        expires_at,
      })
      .await
      .map_err(AuthError::store)?;

    info!(account = %identity.account_id, "password reset issued");
    Ok(Some(ResetTicket { account_id: identity.account_id, token, expires_at }))
  }

  /// Set a new password using a reset token, then revoke every session of the
  /// account.
  pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
    self.reset_password_at(token, new_password, Utc::now()).await
  }

  pub async fn reset_password_at(
    &self,
    token: &str,
    new_password: &str,
    now: DateTime<Utc>,
  ) -> Result<()> {
    check_strength(new_password)?;
    let credential_hash = hash_password(new_password)?;

    let account_id = self
      .store
      .consume_reset(&token::digest(token), now)
      .await
      .map_err(AuthError::store)?
      .ok_or(AuthError::InvalidResetToken)?;

    self
      .store
      .update_account(account_id, AccountPatch {
        credential_hash: Some(credential_hash),
        ..Default::default()
      })
      .await
      .map_err(AuthError::store)?
      .updated()
      .ok_or(AuthError::InvalidResetToken)?;

    let revoked = self.sessions.destroy_all(account_id).await?;
    info!(account = %account_id, revoked, "password reset");
    Ok(())
  }
}
