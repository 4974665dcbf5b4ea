//! Error type for `tirek-notify`.
//!
//! Backend errors are boxed so the engine stays generic over the storage
//! traits. None of these are fatal to the service loops.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The event log could not be read; the poll is skipped.
  #[error("event log unavailable: {0}")]
  LogUnavailable(#[source] BoxError),

  #[error("registry read failed: {0}")]
  RegistryRead(#[source] BoxError),

  /// A subscription commit failed and was rolled back.
  #[error("registry write failed: {0}")]
  RegistryWrite(#[source] BoxError),

  #[error("directory lookup failed: {0}")]
  Directory(#[source] BoxError),

  #[error("schema catalog unavailable: {0}")]
  CatalogUnavailable(#[source] BoxError),

  /// A selection token was malformed, stale, or named an unknown entity.
  #[error("unknown reference token: {0:?}")]
  UnknownReferenceToken(String),
}

impl Error {
  pub(crate) fn log(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::LogUnavailable(Box::new(e))
  }

  pub(crate) fn registry_read(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::RegistryRead(Box::new(e))
  }

  pub(crate) fn registry_write(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::RegistryWrite(Box::new(e))
  }

  pub(crate) fn directory(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Directory(Box::new(e))
  }

  pub(crate) fn catalog(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::CatalogUnavailable(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
