//! Opaque bearer tokens.
//!
//! A token is 32 bytes from the OS RNG, rendered as unpadded URL-safe base64.
//! Storage only ever sees the lowercase hex SHA-256 of the token text.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};

const TOKEN_BYTES: usize = 32;

pub fn generate() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

pub fn digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }
