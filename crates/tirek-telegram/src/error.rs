use std::path::PathBuf;

use thiserror::Error;
use tirek_core::delivery::DeliveryError;

#[derive(Debug, Error)]
pub enum Error {
  /// Connection, TLS or decoding failure. The URL is stripped so the bot
  /// token never reaches a log line.
  #[error("http error: {0}")]
  Http(#[source] reqwest::Error),

  #[error("telegram api error {code}: {description}")]
  Api { code: i64, description: String },

  #[error("cannot read attachment {path:?}: {source}")]
  Attachment {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self { Error::Http(e.without_url()) }
}

impl From<Error> for DeliveryError {
  fn from(e: Error) -> Self {
    match e {
      Error::Api { .. } => DeliveryError::Rejected(e.to_string()),
      Error::Http(_) => DeliveryError::Transport(e.to_string()),
      Error::Attachment { .. } => DeliveryError::Attachment(e.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
