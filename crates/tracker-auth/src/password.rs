//! Password hashing with argon2 (PHC string format).

use std::sync::OnceLock;

use argon2::{
  password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use rand_core::OsRng;

use crate::{AuthError, Result};

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`] characters.
pub fn check_strength(password: &str) -> Result<()> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(AuthError::WeakPassword);
  }
  Ok(())
}

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Whether `password` matches the stored PHC string. A malformed hash never
/// matches.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    tracing::warn!("stored credential hash is not a valid PHC string");
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// Burn a verification against a throwaway hash so that a login for an
/// unknown user costs about as much as one with a wrong password.
pub(crate) fn verify_dummy(password: &str) {
  static DUMMY: OnceLock<Option<String>> = OnceLock::new();
  if let Some(phc) = DUMMY.get_or_init(|| hash_password("not-a-real-password").ok()) {
    let _ = verify_password(password, phc);
  }
}
