//! Startup errors of the server library.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration: {0}")]
  Config(#[from] config::ConfigError),
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
  #[error("bootstrap administrador: {0}")]
  Bootstrap(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}
