//! Authentication for Tracker: session tokens, password login, self
//! registration and password reset.
//!
//! Everything here is generic over [`TrackerStore`](tracker_core::store::TrackerStore);
//! the only state kept is what the store persists. Tokens are never stored in
//! clear, only their SHA-256 digest.

mod authenticator;
mod error;
mod password;
mod session;
mod token;

pub use authenticator::{Authenticator, LoginSession, Registration, ResetTicket};
pub use error::{AuthError, Result};
pub use password::{check_strength, hash_password, verify_password, MIN_PASSWORD_LEN};
pub use session::{IssuedToken, SessionManager};
