//! Outbound transport traits.
//!
//! Implemented by chat transports (e.g. `tirek-telegram`). Every error is
//! treated by callers as a failure for that one recipient only.

use std::{future::Future, path::Path, time::Duration};

use thiserror::Error;

use crate::{interaction::Reply, subscription::RecipientId};

#[derive(Debug, Error)]
pub enum DeliveryError {
  /// The transport answered but refused the request.
  #[error("rejected by transport: {0}")]
  Rejected(String),

  /// The request never got a usable answer.
  #[error("transport error: {0}")]
  Transport(String),

  #[error("no response within {0:?}")]
  Timeout(Duration),

  #[error("attachment error: {0}")]
  Attachment(String),
}

/// Sends notifications to recipients.
pub trait DeliverySink: Send + Sync {
  fn send_text<'a>(
    &'a self,
    recipient: RecipientId,
    text: &'a str,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a;

  /// Send an image file with `caption` underneath.
  fn send_photo<'a>(
    &'a self,
    recipient: RecipientId,
    image: &'a Path,
    caption: &'a str,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a;
}

/// Renders interactive replies (text plus selection buttons).
pub trait ReplySink: Send + Sync {
  fn reply<'a>(
    &'a self,
    recipient: RecipientId,
    reply: &'a Reply,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a;

  /// Acknowledge a button press so the client stops its spinner.
  fn acknowledge<'a>(
    &'a self,
    callback_id: &'a str,
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a;
}
