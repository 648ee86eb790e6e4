//! SQLite backend for the tracker store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Visibility predicates from the policy
//! engine are rendered into the `WHERE` clause of every list query, so a
//! filtered listing can never widen what the caller is allowed to see.

mod clause;
mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
