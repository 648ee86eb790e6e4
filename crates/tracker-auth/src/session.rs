//! The session manager: issues, resolves and expires opaque session tokens.
//!
//! Sessions use a fixed window from issuance; they are never extended. A token
//! is valid iff its digest is stored and `now < expires_at`. Expired rows are
//! removed lazily by [`SessionManager::resolve`] and in bulk by
//! [`SessionManager::sweep`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use tracker_core::{
  account::Identity,
  session::{Session, SESSION_TTL_DAYS},
  store::TrackerStore,
};
use uuid::Uuid;

use crate::{token, AuthError, Result};

/// A freshly minted token. The clear-text token exists only here and in the
/// client's cookie.
#[derive(Debug, Clone)]
pub struct IssuedToken {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

pub struct SessionManager<S> {
  store: Arc<S>,
  ttl:   Duration,
}

impl<S> Clone for SessionManager<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store), ttl: self.ttl } }
}

impl<S: TrackerStore> SessionManager<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, ttl: Duration::days(SESSION_TTL_DAYS) }
  }

  /// Override the absolute session lifetime.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn ttl(&self) -> Duration { self.ttl }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub async fn create_session(&self, account_id: Uuid) -> Result<IssuedToken> {
    self.create_session_at(account_id, Utc::now()).await
  }

  pub async fn create_session_at(
    &self,
    account_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<IssuedToken> {
    let token = token::generate();
    let expires_at = now + self.ttl;
    self
      .store
      .insert_session(Session {
        token_digest: token::digest(&token),
        account_id,
        created_at: now,
        expires_at,
      })
      .await
      .map_err(AuthError::store)?;
    debug!(account = %account_id, %expires_at, "session created");
    Ok(IssuedToken { token, expires_at })
  }

  /// The live identity bound to `token`, or `None` when the token is unknown,
  /// expired, or bound to a missing or inactive account.
  pub async fn resolve(&self, token: &str) -> Result<Option<Identity>> {
    self.resolve_at(token, Utc::now()).await
  }

  pub async fn resolve_at(
    &self,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<Identity>> {
    if token.is_empty() {
      return Ok(None);
    }
    let digest = token::digest(token);

    let Some(session) =
      self.store.get_session(&digest).await.map_err(AuthError::store)?
    else {
      debug!("unknown session token");
      return Ok(None);
    };

    if !session.is_live_at(now) {
      self.store.delete_session(&digest).await.map_err(AuthError::store)?;
      debug!(account = %session.account_id, "expired session removed");
      return Ok(None);
    }

    let identity = self
      .store
      .get_identity(session.account_id)
      .await
      .map_err(AuthError::store)?;

    match identity {
      Some(identity) if identity.active => Ok(Some(identity)),
      Some(identity) => {
        debug!(account = %identity.account_id, "session of inactive account");
        Ok(None)
      }
      None => {
        debug!(account = %session.account_id, "session of missing account");
        Ok(None)
      }
    }
  }

  /// Idempotent: destroying an unknown token is not an error.
  pub async fn destroy(&self, token: &str) -> Result<()> {
    let removed = self
      .store
      .delete_session(&token::digest(token))
      .await
      .map_err(AuthError::store)?;
    if removed {
      info!("session destroyed");
    }
    Ok(())
  }

  /// Revoke every session of `account_id`; returns how many were removed.
  pub async fn destroy_all(&self, account_id: Uuid) -> Result<u64> {
    let n = self
      .store
      .delete_sessions_for(account_id)
      .await
      .map_err(AuthError::store)?;
    debug!(account = %account_id, count = n, "sessions revoked");
    Ok(n)
  }

  /// Purge every expired session regardless of access.
  pub async fn sweep(&self) -> Result<u64> { self.sweep_at(Utc::now()).await }

  pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<u64> {
    let n = self
      .store
      .purge_expired_sessions(now)
      .await
      .map_err(AuthError::store)?;
    if n > 0 {
      info!(count = n, "expired sessions swept");
    }
    Ok(n)
  }
}
