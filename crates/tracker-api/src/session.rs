//! Session cookie handling and the [`CurrentUser`] extractor.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, HeaderValue, header, request::Parts},
};
use chrono::Duration;
use tracker_core::{account::Identity, store::TrackerStore};

use crate::{AppState, error::ApiError};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// The live identity behind the request's session cookie. Present in a
/// handler means the request was authenticated.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

/// Pull the session token out of the `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(name, _)| *name == SESSION_COOKIE)
    .map(|(_, value)| value)
    .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value installing `token` for `ttl`.
pub fn session_cookie(token: &str, ttl: Duration) -> Result<HeaderValue, ApiError> {
  HeaderValue::from_str(&format!(
    "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
    ttl.num_seconds()
  ))
  .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// `Set-Cookie` value removing the session cookie.
pub fn cleared_cookie() -> HeaderValue {
  HeaderValue::from_static("session_id=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: TrackerStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = session_token(&parts.headers).ok_or(ApiError::Unauthenticated)?;
    let identity = state
      .auth
      .sessions()
      .resolve(token)
      .await?
      .ok_or(ApiError::Unauthenticated)?;
    Ok(CurrentUser(identity))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn headers(cookies: &[&str]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for c in cookies {
      map.append(header::COOKIE, HeaderValue::from_str(c).unwrap());
    }
    map
  }

  #[test]
  fn finds_session_among_other_cookies() {
    let map = headers(&["theme=dark; session_id=abc123; lang=es"]);
    assert_eq!(session_token(&map), Some("abc123"));
  }

  #[test]
  fn scans_every_cookie_header() {
    let map = headers(&["theme=dark", "session_id=xyz"]);
    assert_eq!(session_token(&map), Some("xyz"));
  }

  #[test]
  fn missing_or_empty_session_is_none() {
    assert_eq!(session_token(&headers(&["theme=dark"])), None);
    assert_eq!(session_token(&headers(&["session_id="])), None);
    assert_eq!(session_token(&HeaderMap::new()), None);
  }

  #[test]
  fn cookie_attributes() {
    let value = session_cookie("tok", Duration::days(7)).unwrap();
    let text = value.to_str().unwrap();
    assert!(text.starts_with("session_id=tok;"));
    assert!(text.contains("HttpOnly"));
    assert!(text.contains("SameSite=Lax"));
    assert!(text.contains("Max-Age=604800"));
  }
}
